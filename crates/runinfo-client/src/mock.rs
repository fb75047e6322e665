//! In-memory transport and download doubles for testing.
//!
//! The doubles are cheap to clone and share their state, so a test can hand
//! one copy to the multiplexer or session and inspect the other.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::download::{DownloadHandler, DownloadHint};
use crate::error::ClientError;
use crate::transport::{FrameSink, FrameSource};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Default)]
struct SinkState {
    sent: Vec<String>,
    send_error: Option<ClientError>,
    closed: bool,
}

/// Records every frame sent through it.
#[derive(Clone, Default)]
pub struct MockFrameSink {
    state: Arc<Mutex<SinkState>>,
}

impl MockFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send fail with `err`.
    pub fn fail_next_send(&self, err: ClientError) {
        lock(&self.state).send_error = Some(err);
    }

    pub fn sent(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

#[async_trait]
impl FrameSink for MockFrameSink {
    async fn send_text(&mut self, frame: String) -> Result<(), ClientError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.send_error.take() {
            return Err(err);
        }
        if state.closed {
            return Err(ClientError::Closed);
        }
        state.sent.push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

/// Frame source fed from a test through a [`FrameFeeder`].
///
/// Dropping or closing the feeder ends the stream, which looks like the
/// server closing the socket.
pub struct ChannelFrameSource {
    rx: mpsc::UnboundedReceiver<Result<String, ClientError>>,
}

pub struct FrameFeeder {
    tx: mpsc::UnboundedSender<Result<String, ClientError>>,
}

impl ChannelFrameSource {
    pub fn new() -> (FrameFeeder, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FrameFeeder { tx }, Self { rx })
    }
}

impl FrameFeeder {
    /// Queue one text frame. Returns false if the source is gone.
    pub fn push(&self, frame: impl Into<String>) -> bool {
        self.tx.send(Ok(frame.into())).is_ok()
    }

    /// Queue a receive error.
    pub fn fail(&self, err: ClientError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    /// End the stream.
    pub fn close(self) {}
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn next_frame(&mut self) -> Option<Result<String, ClientError>> {
        self.rx.recv().await
    }
}

/// Records downloads instead of performing them.
#[derive(Clone, Default)]
pub struct RecordingDownloader {
    started: Arc<Mutex<Vec<(Url, DownloadHint)>>>,
}

impl RecordingDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<(Url, DownloadHint)> {
        lock(&self.started).clone()
    }
}

impl DownloadHandler for RecordingDownloader {
    fn start(&mut self, url: Url, hint: DownloadHint) -> Result<(), ClientError> {
        lock(&self.started).push((url, hint));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_sink_fails_once_then_records() {
        let mut sink = MockFrameSink::new();
        let probe = sink.clone();
        sink.fail_next_send(ClientError::Send("boom".into()));
        assert!(sink.send_text("a".into()).await.is_err());
        sink.send_text("b".into()).await.unwrap();
        assert_eq!(probe.sent(), vec!["b".to_string()]);
        sink.close().await.unwrap();
        assert!(probe.is_closed());
        assert!(matches!(sink.send_text("c".into()).await, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn channel_source_ends_when_feeder_closes() {
        let (feeder, mut source) = ChannelFrameSource::new();
        assert!(feeder.push("one"));
        feeder.close();
        assert_eq!(source.next_frame().await.unwrap().unwrap(), "one");
        assert!(source.next_frame().await.is_none());
    }
}
