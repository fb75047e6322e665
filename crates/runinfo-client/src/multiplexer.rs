//! Request/response multiplexer.
//!
//! Every job shares one socket. A job is identified on the wire only by the
//! output id of the tab it was submitted from, so routing a response is a
//! lookup by `context` and nothing else: no request ids, no sequence
//! numbers, no per-job state beyond the tab itself.

use std::collections::HashMap;
use std::sync::Arc;

use runinfo_core::endpoint::download_url;
use runinfo_core::logging::redact_token;
use runinfo_core::protocol::{decode_server_message, encode_request, ClientRequest, Service, ServerResponse};
use url::Url;

use crate::download::{DownloadHandler, DownloadHint};
use crate::error::ClientError;
use crate::event::{SessionEvent, SessionEventKind, SessionEventSink};
use crate::tabs::{Tab, TabId, TabRegistry, TabStatus};
use crate::transport::FrameSink;

/// Line appended once a download has been started.
pub const DONE_LINE: &str = "Done";

/// What [`Multiplexer::handle_frame`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A `Text` or `Error` line was appended to the tab.
    Appended(TabId),
    /// A download was started for the tab.
    Downloaded(TabId),
    /// The addressed tab is not open.
    Dropped,
    /// Another service, an empty payload, or not a frame at all.
    Ignored,
}

pub struct Multiplexer<S, D> {
    sink: S,
    downloader: D,
    page_url: Url,
    tabs: TabRegistry,
    filenames: HashMap<TabId, String>,
    events: Arc<dyn SessionEventSink>,
}

impl<S: FrameSink, D: DownloadHandler> Multiplexer<S, D> {
    pub fn new(sink: S, downloader: D, page_url: Url, events: Arc<dyn SessionEventSink>) -> Self {
        Self {
            sink,
            downloader,
            page_url,
            tabs: TabRegistry::new(),
            filenames: HashMap::new(),
            events,
        }
    }

    /// Open a tab for `request`, send the request tagged with the tab's
    /// output id, and show the tab.
    ///
    /// If the frame cannot be sent the tab is removed again and the error
    /// returned. Its number is not handed out a second time.
    pub async fn submit(&mut self, request: &ClientRequest) -> Result<TabId, ClientError> {
        let id = self.tabs.open(request.label());
        let context = id.output_id();
        let sent = match encode_request(&context, request) {
            Ok(frame) => self.sink.send_text(frame).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = sent {
            tracing::warn!(tab = %id, error = %err, "submit failed");
            self.tabs.close(id);
            return Err(err);
        }

        self.filenames.insert(id, request.default_filename());
        self.tabs.show(id);
        tracing::debug!(tab = %id, job = %request.label(), "request sent");
        self.emit(Some(id), SessionEventKind::TabOpened, request.label());
        Ok(id)
    }

    /// Route one inbound text frame.
    pub fn handle_frame(&mut self, raw: &str) -> Dispatch {
        let msg = match decode_server_message(raw) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed frame");
                self.emit(None, SessionEventKind::FrameIgnored, err.to_string());
                return Dispatch::Ignored;
            }
        };
        if msg.service != Service::Download {
            tracing::debug!(context = %msg.context, "ignoring frame for unknown service");
            self.emit(None, SessionEventKind::FrameIgnored, msg.context);
            return Dispatch::Ignored;
        }

        let context = msg.context;
        if msg.response.payload().is_empty() {
            tracing::debug!(context = %context, "ignoring empty payload");
            self.emit(None, SessionEventKind::FrameIgnored, context);
            return Dispatch::Ignored;
        }
        match msg.response {
            ServerResponse::Text(line) => self.append(&context, &line, None),
            ServerResponse::Error(line) => self.append(&context, &line, Some(TabStatus::Failed)),
            ServerResponse::DownloadJwt(token) => self.download(&context, &token),
        }
    }

    fn append(&mut self, context: &str, line: &str, status: Option<TabStatus>) -> Dispatch {
        let Some(id) = self.tabs.append(context, line) else {
            return self.dropped(context);
        };
        self.emit(Some(id), SessionEventKind::Output, line);
        if let Some(status) = status {
            self.tabs.set_status(id, status);
            if status == TabStatus::Failed {
                self.emit(Some(id), SessionEventKind::JobFailed, line);
            }
        }
        Dispatch::Appended(id)
    }

    fn download(&mut self, context: &str, token: &str) -> Dispatch {
        let Some(id) = self.tabs.by_context_mut(context).map(|t| t.id) else {
            return self.dropped(context);
        };
        tracing::info!(tab = %id, token = %redact_token(token), "download token received");

        let started = download_url(&self.page_url, token)
            .map_err(ClientError::from)
            .and_then(|url| {
                let hint = DownloadHint {
                    tab: id,
                    suggested_name: self.filenames.get(&id).cloned().unwrap_or_default(),
                };
                self.downloader.start(url, hint)
            });
        if let Err(err) = started {
            let line = format!("Download failed: {err}");
            self.tabs.append(context, &line);
            self.tabs.set_status(id, TabStatus::Failed);
            self.emit(Some(id), SessionEventKind::DownloadFailed, err.to_string());
            self.emit(Some(id), SessionEventKind::Output, line);
            return Dispatch::Appended(id);
        }

        self.tabs.append(context, DONE_LINE);
        self.tabs.set_status(id, TabStatus::Done);
        self.emit(Some(id), SessionEventKind::Output, DONE_LINE);
        Dispatch::Downloaded(id)
    }

    fn dropped(&self, context: &str) -> Dispatch {
        tracing::debug!(context, "dropping frame for closed tab");
        self.emit(None, SessionEventKind::FrameDropped, context);
        Dispatch::Dropped
    }

    /// Close a tab locally. The server is not told; later frames for it are
    /// dropped.
    pub fn close_tab(&mut self, id: TabId) -> bool {
        if !self.tabs.close(id) {
            return false;
        }
        self.filenames.remove(&id);
        self.emit(Some(id), SessionEventKind::TabClosed, "");
        true
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.get(id)
    }

    pub fn tabs(&self) -> &[Tab] {
        self.tabs.tabs()
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.tabs.active()
    }

    /// Close the outgoing half of the socket.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.sink.close().await
    }

    fn emit(&self, tab: Option<TabId>, kind: SessionEventKind, detail: impl Into<String>) {
        self.events.record(SessionEvent::new(tab, kind, detail));
    }
}
