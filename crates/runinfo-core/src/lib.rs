//! runinfo-core: wire protocol, form rules, endpoints, and configuration for
//! the run info job client.
//!
//! This crate has no networking. It defines what a request and a response
//! look like on the socket, which form inputs produce a valid request, and
//! where the socket and download endpoints live relative to a run page.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod form;
pub mod logging;
pub mod odb;
pub mod protocol;

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "runinfo-core"
}
