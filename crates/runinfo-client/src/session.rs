//! Session task.
//!
//! A single task owns the [`Multiplexer`] and both socket halves. User
//! commands and inbound frames are processed in one loop, so the tab
//! registry has exactly one writer and needs no locking. Callers talk to the
//! task through a cloneable [`SessionHandle`].

use std::sync::Arc;

use runinfo_core::config::ConnectionConfig;
use runinfo_core::endpoint::websocket_url;
use runinfo_core::protocol::ClientRequest;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::connection::{CloseOutcome, ConnectionLifecycle, ConnectionState, CONNECTION_LOST};
use crate::download::DownloadHandler;
use crate::error::ClientError;
use crate::event::{SessionEvent, SessionEventKind, SessionEventSink};
use crate::multiplexer::Multiplexer;
use crate::tabs::{Tab, TabId};
use crate::transport::{self, FrameSink, FrameSource};

const COMMAND_BUFFER: usize = 32;

enum Command {
    Submit {
        request: ClientRequest,
        reply: oneshot::Sender<Result<TabId, ClientError>>,
    },
    CloseTab {
        id: TabId,
        reply: oneshot::Sender<bool>,
    },
    Tab {
        id: TabId,
        reply: oneshot::Sender<Option<Tab>>,
    },
    Tabs {
        reply: oneshot::Sender<(Vec<Tab>, Option<TabId>)>,
    },
    Unload,
}

/// Connection state as seen from outside the session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub connection: ConnectionState,
    /// Set once the socket has closed.
    pub outcome: Option<CloseOutcome>,
}

impl SessionState {
    pub fn submit_enabled(&self) -> bool {
        self.connection == ConnectionState::Open
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Submit a job. Fails with [`ClientError::Closed`] once the socket is
    /// gone.
    pub async fn submit(&self, request: ClientRequest) -> Result<TabId, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit { request, reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    pub async fn close_tab(&self, id: TabId) -> Result<bool, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CloseTab { id, reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Snapshot of one tab.
    pub async fn tab(&self, id: TabId) -> Result<Option<Tab>, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Tab { id, reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Snapshot of every open tab and the active one.
    pub async fn tabs(&self) -> Result<(Vec<Tab>, Option<TabId>), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Tabs { reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Tear the session down. The close that follows is not reported as a
    /// lost connection.
    pub async fn unload(&self) {
        if self.commands.send(Command::Unload).await.is_err() {
            // Task already gone; make sure it is not waiting on anything.
            self.cancel.cancel();
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait for the socket to close and report how it closed.
    pub async fn wait_closed(&self) -> CloseOutcome {
        let mut state = self.state.clone();
        let outcome = state
            .wait_for(|s| s.outcome.is_some())
            .await
            .map(|s| s.outcome);
        outcome.ok().flatten().unwrap_or(CloseOutcome::PromptReload)
    }

    async fn send(&self, cmd: Command) -> Result<(), ClientError> {
        self.commands.send(cmd).await.map_err(|_| ClientError::Closed)
    }
}

/// Connect to the socket for `page_url` and start a session on it.
pub async fn connect<D>(
    page_url: Url,
    config: &ConnectionConfig,
    downloader: D,
    events: Arc<dyn SessionEventSink>,
) -> Result<SessionHandle, ClientError>
where
    D: DownloadHandler + 'static,
{
    let ws_url = websocket_url(&page_url)?;
    tracing::info!(url = %ws_url, "connecting");
    let (sink, source) = transport::connect(&ws_url, config.connect_timeout).await?;
    Ok(spawn_session(sink, source, downloader, page_url, events))
}

/// Start the session task on an already open connection.
pub fn spawn_session<S, R, D>(
    sink: S,
    source: R,
    downloader: D,
    page_url: Url,
    events: Arc<dyn SessionEventSink>,
) -> SessionHandle
where
    S: FrameSink + 'static,
    R: FrameSource + 'static,
    D: DownloadHandler + 'static,
{
    let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
    let cancel = CancellationToken::new();
    let (state_tx, state) = watch::channel(SessionState {
        connection: ConnectionState::Open,
        outcome: None,
    });

    events.record(SessionEvent::new(
        None,
        SessionEventKind::Connected,
        page_url.as_str(),
    ));
    let mux = Multiplexer::new(sink, downloader, page_url, Arc::clone(&events));
    let task = SessionTask {
        mux,
        source,
        commands: rx,
        cancel: cancel.clone(),
        state: state_tx,
        lifecycle: ConnectionLifecycle::new(),
        events,
    };
    tokio::spawn(task.run());

    SessionHandle {
        commands,
        cancel,
        state,
    }
}

struct SessionTask<S, R, D> {
    mux: Multiplexer<S, D>,
    source: R,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
    lifecycle: ConnectionLifecycle,
    events: Arc<dyn SessionEventSink>,
}

impl<S: FrameSink, R: FrameSource, D: DownloadHandler> SessionTask<S, R, D> {
    async fn run(mut self) {
        self.lifecycle.on_open();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.lifecycle.begin_unload();
                    break;
                }
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        // Every handle is gone; nobody can observe the close.
                        self.lifecycle.begin_unload();
                        break;
                    };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                frame = self.source.next_frame() => match frame {
                    Some(Ok(text)) => {
                        self.mux.handle_frame(&text);
                    }
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "socket receive failed");
                        break;
                    }
                    None => break,
                },
            }
        }
        self.finish().await;
    }

    /// Returns false when the session should end.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Submit { request, reply } => {
                let result = if self.lifecycle.submit_enabled() {
                    self.mux.submit(&request).await
                } else {
                    Err(ClientError::Closed)
                };
                let lost = matches!(&result, Err(err) if err.is_connection_loss());
                let _ = reply.send(result);
                !lost
            }
            Command::CloseTab { id, reply } => {
                let _ = reply.send(self.mux.close_tab(id));
                true
            }
            Command::Tab { id, reply } => {
                let _ = reply.send(self.mux.tab(id).cloned());
                true
            }
            Command::Tabs { reply } => {
                let _ = reply.send((self.mux.tabs().to_vec(), self.mux.active_tab()));
                true
            }
            Command::Unload => {
                self.lifecycle.begin_unload();
                false
            }
        }
    }

    async fn finish(mut self) {
        if let Err(err) = self.mux.shutdown().await {
            tracing::debug!(error = %err, "socket close failed");
        }
        let outcome = self.lifecycle.on_close().unwrap_or(CloseOutcome::Silent);
        match outcome {
            CloseOutcome::PromptReload => {
                tracing::warn!("{CONNECTION_LOST}");
                self.events.record(SessionEvent::new(
                    None,
                    SessionEventKind::ConnectionLost,
                    CONNECTION_LOST,
                ));
            }
            CloseOutcome::Silent => {
                tracing::debug!("session unloaded");
                self.events
                    .record(SessionEvent::new(None, SessionEventKind::Disconnected, ""));
            }
        }
        self.state.send_replace(SessionState {
            connection: ConnectionState::Closed,
            outcome: Some(outcome),
        });
        // Pending and later commands see a dropped reply and map it to Closed.
        self.commands.close();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::event::InMemoryEventSink;
    use crate::mock::{ChannelFrameSource, MockFrameSink, RecordingDownloader};

    fn page() -> Url {
        Url::parse("http://daq.local/runs/11084").unwrap()
    }

    #[tokio::test]
    async fn server_close_prompts_reload() {
        let (feeder, source) = ChannelFrameSource::new();
        let events = Arc::new(InMemoryEventSink::new());
        let handle = spawn_session(
            MockFrameSink::new(),
            source,
            RecordingDownloader::new(),
            page(),
            events.clone(),
        );
        assert!(handle.state().submit_enabled());
        feeder.close();
        assert_eq!(handle.wait_closed().await, CloseOutcome::PromptReload);
        assert!(!handle.state().submit_enabled());
        assert_eq!(events.of_kind(SessionEventKind::ConnectionLost).len(), 1);
        let err = handle
            .submit(ClientRequest::VerticesCsv { run_number: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }

    #[tokio::test]
    async fn unload_closes_silently() {
        let (_feeder, source) = ChannelFrameSource::new();
        let sink = MockFrameSink::new();
        let events = Arc::new(InMemoryEventSink::new());
        let handle = spawn_session(
            sink.clone(),
            source,
            RecordingDownloader::new(),
            page(),
            events.clone(),
        );
        handle.unload().await;
        assert_eq!(handle.wait_closed().await, CloseOutcome::Silent);
        assert!(sink.is_closed());
        assert!(events.of_kind(SessionEventKind::ConnectionLost).is_empty());
        assert_eq!(events.of_kind(SessionEventKind::Disconnected).len(), 1);
    }

    #[tokio::test]
    async fn receive_error_counts_as_lost_connection() {
        let (feeder, source) = ChannelFrameSource::new();
        let handle = spawn_session(
            MockFrameSink::new(),
            source,
            RecordingDownloader::new(),
            page(),
            Arc::new(InMemoryEventSink::new()),
        );
        feeder.fail(ClientError::Receive("reset by peer".into()));
        assert_eq!(handle.wait_closed().await, CloseOutcome::PromptReload);
    }
}
