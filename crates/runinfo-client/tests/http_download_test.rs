#![allow(clippy::expect_used, clippy::unwrap_used)]

//! `HttpDownloader` against a minimal local HTTP responder.

use std::sync::Arc;
use std::time::Duration;

use runinfo_client::download::{DownloadHandler, DownloadHint, HttpDownloader};
use runinfo_client::event::{InMemoryEventSink, SessionEventKind};
use runinfo_client::tabs::TabId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// Serve a single HTTP response and return the request path.
async fn respond_once(listener: TcpListener, status: &'static str, headers: &'static str, body: &'static str) -> String {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    let request = String::from_utf8_lossy(&buf[..n]).to_string();
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    let response = format!(
        "HTTP/1.1 {status}\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
    path
}

async fn wait_for(events: &InMemoryEventSink, kind: SessionEventKind) -> String {
    for _ in 0..400 {
        if let Some(event) = events.of_kind(kind).into_iter().next() {
            return event.detail;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no {kind} event");
}

fn hint(name: &str) -> DownloadHint {
    DownloadHint {
        tab: TabId::new(1),
        suggested_name: name.to_string(),
    }
}

#[tokio::test]
async fn saves_under_content_disposition_name() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(respond_once(
        listener,
        "200 OK",
        "Content-Disposition: attachment; filename=\"R11084_vertices.csv\"\r\n",
        "x,y,z\n1,2,3\n",
    ));

    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(InMemoryEventSink::new());
    let mut downloader = HttpDownloader::new(dir.path().join("out"), events.clone());
    let url = Url::parse(&format!("http://127.0.0.1:{port}/runs/download/abc.def")).unwrap();
    downloader.start(url, hint("fallback.csv")).unwrap();

    let saved = wait_for(&events, SessionEventKind::DownloadCompleted).await;
    assert!(saved.ends_with("R11084_vertices.csv"), "saved={saved}");
    let contents = std::fs::read_to_string(dir.path().join("out/R11084_vertices.csv")).unwrap();
    assert_eq!(contents, "x,y,z\n1,2,3\n");
    assert_eq!(server.await.unwrap(), "/runs/download/abc.def");
    assert_eq!(events.of_kind(SessionEventKind::DownloadStarted).len(), 1);
}

#[tokio::test]
async fn falls_back_to_suggested_name() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(respond_once(listener, "200 OK", "", "%PDF"));

    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(InMemoryEventSink::new());
    let mut downloader = HttpDownloader::new(dir.path(), events.clone());
    let url = Url::parse(&format!("http://127.0.0.1:{port}/download/tok")).unwrap();
    downloader.start(url, hint("R7_trg_scalers_plot.pdf")).unwrap();

    wait_for(&events, SessionEventKind::DownloadCompleted).await;
    let contents = std::fs::read_to_string(dir.path().join("R7_trg_scalers_plot.pdf")).unwrap();
    assert_eq!(contents, "%PDF");
    server.await.unwrap();
}

#[tokio::test]
async fn error_status_is_reported_as_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(respond_once(listener, "401 Unauthorized", "", "expired"));

    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(InMemoryEventSink::new());
    let mut downloader = HttpDownloader::new(dir.path(), events.clone());
    let url = Url::parse(&format!("http://127.0.0.1:{port}/download/secrettoken123")).unwrap();
    downloader.start(url, hint("x.csv")).unwrap();

    let detail = wait_for(&events, SessionEventKind::DownloadFailed).await;
    assert!(detail.contains("401"), "detail={detail}");
    assert!(!detail.contains("secrettoken123"));
    assert!(!dir.path().join("x.csv").exists());
    server.await.unwrap();
}
