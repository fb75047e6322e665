//! Session events.
//!
//! Everything the page would show the user (new tab, new output line,
//! download started, connection lost) is emitted as a [`SessionEvent`] so a
//! front end can render it however it likes.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::tabs::TabId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// Socket open; submitting is enabled.
    Connected,
    TabOpened,
    TabClosed,
    /// One line appended to a tab's output.
    Output,
    /// The server reported an error for the tab's job.
    JobFailed,
    /// Response for a tab that is no longer open.
    FrameDropped,
    /// Frame for another service, or not a valid envelope.
    FrameIgnored,
    DownloadStarted,
    DownloadCompleted,
    DownloadFailed,
    /// Socket closed while the session was live. The user should reload.
    ConnectionLost,
    /// Socket closed because the session is unloading.
    Disconnected,
}

impl std::fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::TabOpened => "tab_opened",
            Self::TabClosed => "tab_closed",
            Self::Output => "output",
            Self::JobFailed => "job_failed",
            Self::FrameDropped => "frame_dropped",
            Self::FrameIgnored => "frame_ignored",
            Self::DownloadStarted => "download_started",
            Self::DownloadCompleted => "download_completed",
            Self::DownloadFailed => "download_failed",
            Self::ConnectionLost => "connection_lost",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub timestamp: DateTime<Utc>,
    pub tab: Option<TabId>,
    pub kind: SessionEventKind,
    pub detail: String,
}

impl SessionEvent {
    pub fn new(tab: Option<TabId>, kind: SessionEventKind, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            tab,
            kind,
            detail: detail.into(),
        }
    }
}

/// Receiver of session events.
pub trait SessionEventSink: Send + Sync {
    fn record(&self, event: SessionEvent);
}

/// In-memory event sink for testing.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: std::sync::Mutex<Vec<SessionEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        match self.events.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Events of one kind, in order.
    pub fn of_kind(&self, kind: SessionEventKind) -> Vec<SessionEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }
}

impl SessionEventSink for InMemoryEventSink {
    fn record(&self, event: SessionEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards events to an async consumer. Events are dropped once the
/// receiver is gone.
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionEventSink for ChannelEventSink {
    fn record(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

/// No-op event sink that discards all events.
pub struct NullEventSink;

impl SessionEventSink for NullEventSink {
    fn record(&self, _event: SessionEvent) {}
}
