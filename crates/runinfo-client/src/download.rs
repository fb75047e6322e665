//! Download handling.
//!
//! A download token must never hold up the socket: [`DownloadHandler::start`]
//! only kicks the transfer off and returns. Progress and the final outcome
//! are reported through the session's event sink.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use runinfo_core::logging::redact_token;
use url::Url;

use crate::error::ClientError;
use crate::event::{SessionEvent, SessionEventKind, SessionEventSink};
use crate::tabs::TabId;

/// What the multiplexer knows about a download when it starts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadHint {
    pub tab: TabId,
    /// Name to save under if the server does not provide one.
    pub suggested_name: String,
}

pub trait DownloadHandler: Send {
    /// Begin fetching `url`. Must not wait for the transfer.
    fn start(&mut self, url: Url, hint: DownloadHint) -> Result<(), ClientError>;
}

/// Fetches downloads over HTTP into a directory.
pub struct HttpDownloader {
    client: reqwest::Client,
    dir: PathBuf,
    events: Arc<dyn SessionEventSink>,
}

impl HttpDownloader {
    pub fn new(dir: impl Into<PathBuf>, events: Arc<dyn SessionEventSink>) -> Self {
        Self {
            client: reqwest::Client::new(),
            dir: dir.into(),
            events,
        }
    }
}

impl DownloadHandler for HttpDownloader {
    fn start(&mut self, url: Url, hint: DownloadHint) -> Result<(), ClientError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| ClientError::Download {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let client = self.client.clone();
        let dir = self.dir.clone();
        let events = Arc::clone(&self.events);
        let shown = display_url(&url);

        events.record(SessionEvent::new(
            Some(hint.tab),
            SessionEventKind::DownloadStarted,
            shown.clone(),
        ));
        runtime.spawn(async move {
            match fetch(&client, &url, &dir, &hint).await {
                Ok(path) => {
                    tracing::info!(tab = %hint.tab, path = %path.display(), "download saved");
                    events.record(SessionEvent::new(
                        Some(hint.tab),
                        SessionEventKind::DownloadCompleted,
                        path.display().to_string(),
                    ));
                }
                Err(err) => {
                    tracing::warn!(tab = %hint.tab, url = %shown, error = %err, "download failed");
                    events.record(SessionEvent::new(
                        Some(hint.tab),
                        SessionEventKind::DownloadFailed,
                        err.to_string(),
                    ));
                }
            }
        });
        Ok(())
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &Url,
    dir: &Path,
    hint: &DownloadHint,
) -> Result<PathBuf, ClientError> {
    let failed = |message: String| ClientError::Download {
        url: display_url(url),
        message,
    };
    let response = client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| failed(err.without_url().to_string()))?;

    let name = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(disposition_filename)
        .or_else(|| safe_filename(&hint.suggested_name))
        .unwrap_or_else(|| format!("download-{}", hint.tab));

    let body = response
        .bytes()
        .await
        .map_err(|err| failed(err.without_url().to_string()))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| failed(format!("create {}: {err}", dir.display())))?;
    let path = dir.join(name);
    tokio::fs::write(&path, &body)
        .await
        .map_err(|err| failed(format!("write {}: {err}", path.display())))?;
    Ok(path)
}

/// The URL with its token shortened, for logs and events.
fn display_url(url: &Url) -> String {
    let Some(token) = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|t| !t.is_empty())
    else {
        return url.to_string();
    };
    let prefix = url.as_str().trim_end_matches(token);
    format!("{prefix}{}", redact_token(token))
}

/// `filename` parameter of a `Content-Disposition` header.
fn disposition_filename(header: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        safe_filename(value.trim().trim_matches('"'))
    })
}

/// Reduce a server-supplied name to a plain file name.
fn safe_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn disposition_filename_is_extracted() {
        assert_eq!(
            disposition_filename("attachment; filename=\"R11084_vertices.csv\""),
            Some("R11084_vertices.csv".to_string())
        );
        assert_eq!(
            disposition_filename("attachment; FILENAME=plot.pdf"),
            Some("plot.pdf".to_string())
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn path_components_are_stripped() {
        assert_eq!(safe_filename("../../etc/passwd"), Some("passwd".to_string()));
        assert_eq!(safe_filename("a\\b.csv"), Some("b.csv".to_string()));
        assert_eq!(safe_filename(".."), None);
        assert_eq!(safe_filename("dir/"), None);
    }

    #[test]
    fn tokens_are_redacted_in_display_url() {
        let url = Url::parse("http://daq.local/runs/download/eyJhbGciOiJIUzI1NiJ9.payload.sig").unwrap();
        let shown = display_url(&url);
        assert!(shown.starts_with("http://daq.local/runs/download/eyJhbGci"));
        assert!(shown.ends_with("[REDACTED]"));
        assert!(!shown.contains("payload"));
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let sink: Arc<dyn SessionEventSink> = Arc::new(crate::event::NullEventSink);
        let mut downloader = HttpDownloader::new(std::env::temp_dir(), sink);
        let err = downloader
            .start(
                Url::parse("http://127.0.0.1:9/download/tok").unwrap(),
                DownloadHint {
                    tab: TabId::new(1),
                    suggested_name: "x.csv".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::Download { .. }));
    }
}
