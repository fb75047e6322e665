//! Client error type.

use runinfo_core::error::{EndpointError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("timed out connecting to {url}")]
    ConnectTimeout { url: String },

    #[error("failed to send frame: {0}")]
    Send(String),

    #[error("failed to receive frame: {0}")]
    Receive(String),

    /// The socket is gone; nothing more can be submitted.
    #[error("connection to the server is closed")]
    Closed,

    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl ClientError {
    /// Whether the connection itself is unusable after this error.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::Send(_) | Self::Receive(_) | Self::Connect { .. }
        )
    }
}
