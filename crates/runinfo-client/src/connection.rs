//! Connection lifecycle.
//!
//! Submitting is only possible while the socket is open. When the socket
//! closes on its own the user is told the connection was lost and asked to
//! reload; when it closes because the session is being torn down, nothing
//! is reported.

/// Shown when the socket closes while the session is still in use.
pub const CONNECTION_LOST: &str = "Connection to the server was lost. Please reload the page.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Closed during unload; say nothing.
    Silent,
    /// Closed unexpectedly; tell the user and offer a reload.
    PromptReload,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
    unloading: bool,
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            unloading: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn on_open(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Open;
        }
    }

    /// Mark the session as going away. A close after this is expected.
    pub fn begin_unload(&mut self) {
        self.unloading = true;
    }

    /// Record the socket closing. Only the first close produces an outcome.
    pub fn on_close(&mut self) -> Option<CloseOutcome> {
        if self.state == ConnectionState::Closed {
            return None;
        }
        self.state = ConnectionState::Closed;
        Some(if self.unloading {
            CloseOutcome::Silent
        } else {
            CloseOutcome::PromptReload
        })
    }

    pub fn submit_enabled(&self) -> bool {
        self.state == ConnectionState::Open && !self.unloading
    }
}
