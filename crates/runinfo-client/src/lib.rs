//! runinfo-client: job request/response multiplexer for the run info service.
//!
//! One socket carries every job. Each submitted job gets its own output tab,
//! and the tab's output id travels with the request as its `context`; every
//! response frame is routed back to a tab by that id alone.
//!
//! - [`multiplexer::Multiplexer`]: tab allocation and frame dispatch
//! - [`session`]: the task that owns the multiplexer and the socket
//! - [`transport`]: frame sink/source seams and the WebSocket implementation
//! - [`download`]: what happens when a download token arrives
//! - [`mock`]: in-memory transport and download doubles for tests

pub mod connection;
pub mod download;
pub mod error;
pub mod event;
pub mod mock;
pub mod multiplexer;
pub mod session;
pub mod tabs;
pub mod transport;

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "runinfo-client"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "runinfo-client");
    }
}
