//! Error types shared by the core modules.
//!
//! Form and ODB errors live next to the code that produces them; these are
//! the ones that cross crate boundaries.

use thiserror::Error;

/// Failure to encode or decode a socket frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode client message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode server message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Failure to derive an endpoint from a page URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("invalid page url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unsupported page scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("page url has no host")]
    MissingHost,

    #[error("page url cannot be a base for relative paths")]
    CannotBeBase,

    #[error("invalid download token {0:?}")]
    InvalidToken(String),
}

/// Failure to load or validate configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to resolve HOME for {0:?}")]
    Home(String),

    #[error("{0}")]
    Invalid(String),
}
