//! Backend that talks to a real data handler.

use std::sync::Arc;

use runinfo_client::download::HttpDownloader;
use runinfo_client::error::ClientError;
use runinfo_client::event::{ChannelEventSink, SessionEvent, SessionEventKind, SessionEventSink};
use runinfo_client::session;
use runinfo_client::tabs::TabId;
use runinfo_core::config::{load_config, Config, ConnectionConfig};
use runinfo_core::logging::init_logging;
use tokio::sync::mpsc;

use crate::{JobOutcome, JobReport, JobSpec, RunInfoBackend};

pub struct SessionBackend;

fn block_on<F: std::future::Future<Output = T>, T>(future: F) -> Result<T, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("failed to create tokio runtime: {err}"))?;
    Ok(runtime.block_on(future))
}

impl RunInfoBackend for SessionBackend {
    fn load_config(&self, config_file: Option<&str>) -> Result<Config, String> {
        let (config, used) = load_config(config_file).map_err(|e| e.to_string())?;
        init_logging(&config.logging).map_err(|e| e.to_string())?;
        if let Some(path) = used {
            tracing::debug!(path = %path.display(), "loaded config");
        }
        Ok(config)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, String> {
        std::fs::read(path).map_err(|e| format!("open {path}: {e}"))
    }

    fn run_job(&self, job: &JobSpec) -> Result<JobReport, String> {
        block_on(run_job(job.clone()))?.map_err(|e| e.to_string())
    }
}

async fn run_job(job: JobSpec) -> Result<JobReport, ClientError> {
    let (sink, events) = ChannelEventSink::new();
    let sink: Arc<dyn SessionEventSink> = Arc::new(sink);
    let downloader = HttpDownloader::new(job.download_dir.clone(), Arc::clone(&sink));
    let config = ConnectionConfig {
        connect_timeout: job.connect_timeout,
    };

    let handle = session::connect(job.page_url.clone(), &config, downloader, sink).await?;
    let tab = handle.submit(job.request.clone()).await?;
    let report = follow_tab(tab, events).await;
    handle.unload().await;
    handle.wait_closed().await;
    Ok(report)
}

/// Collect the tab's log until its job reaches a terminal state.
async fn follow_tab(tab: TabId, mut events: mpsc::UnboundedReceiver<SessionEvent>) -> JobReport {
    let mut lines = Vec::new();
    while let Some(event) = events.recv().await {
        if event.kind == SessionEventKind::ConnectionLost {
            return JobReport {
                lines,
                outcome: JobOutcome::ConnectionLost,
            };
        }
        if event.tab != Some(tab) {
            continue;
        }
        match event.kind {
            SessionEventKind::Output => {
                tracing::info!(tab = %tab, "{}", event.detail);
                lines.push(event.detail);
            }
            SessionEventKind::JobFailed | SessionEventKind::DownloadFailed => {
                return JobReport {
                    lines,
                    outcome: JobOutcome::Failed(event.detail),
                };
            }
            SessionEventKind::DownloadCompleted => {
                return JobReport {
                    lines,
                    outcome: JobOutcome::Saved(event.detail.into()),
                };
            }
            _ => {}
        }
    }
    JobReport {
        lines,
        outcome: JobOutcome::ConnectionLost,
    }
}
