#![allow(clippy::expect_used, clippy::unwrap_used)]

//! `runinfo csv` end to end against a local data handler stand-in that
//! speaks the socket protocol and serves the download.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use runinfo_cli::{run_cli_for_test, SessionBackend};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

const CSV_BODY: &str = "event,t\n1,0.25\n2,0.50\n";

#[derive(Clone, Copy)]
enum Reply {
    Download,
    ServerError,
}

/// Start the stand-in on its own thread and return its port.
fn start_server(reply: Reply) -> u16 {
    let (port_tx, port_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            port_tx.send(listener.local_addr().unwrap().port()).unwrap();
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(handle(stream, reply));
            }
        });
    });
    port_rx.recv_timeout(Duration::from_secs(5)).unwrap()
}

async fn handle(stream: TcpStream, reply: Reply) {
    let mut peek = [0u8; 2048];
    let mut head = String::new();
    for _ in 0..50 {
        let n = stream.peek(&mut peek).await.unwrap_or(0);
        head = String::from_utf8_lossy(&peek[..n]).to_ascii_lowercase();
        if head.contains("\r\n\r\n") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    if head.contains("upgrade: websocket") {
        serve_socket(stream, reply).await;
    } else {
        serve_download(stream).await;
    }
}

async fn serve_socket(stream: TcpStream, reply: Reply) {
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let request: Value = serde_json::from_str(text.as_str()).unwrap();
        let context = request["context"].as_str().unwrap().to_string();
        let run = request["request"]["SequencerEvents"]["run_number"].as_u64().unwrap();
        let responses = match reply {
            Reply::Download => vec![
                json!({"Text": format!("Exporting sequencer events for run {run}")}),
                json!({"DownloadJWT": "eyJhbGciOiJIUzI1NiJ9.e30.sig"}),
            ],
            Reply::ServerError => vec![json!({"Error": format!("run {run} has no sequencer data")})],
        };
        for response in responses {
            let frame = json!({"service": "Download", "context": context, "response": response});
            ws.send(Message::text(frame.to_string())).await.unwrap();
        }
    }
}

async fn serve_download(mut stream: TcpStream) {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    let request = String::from_utf8_lossy(&buf[..n]).to_string();
    let ok = request.starts_with("GET /download/eyJhbGciOiJIUzI1NiJ9.e30.sig ");
    let response = if ok {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Disposition: attachment; filename=\"R11084_sequencer_events.csv\"\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{CSV_BODY}",
            CSV_BODY.len()
        )
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    };
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn write_config(dir: &std::path::Path, port: u16) -> String {
    let path = dir.join("config.yaml");
    std::fs::write(
        &path,
        format!(
            "server:\n  url: http://127.0.0.1:{port}/\nconnection:\n  connect_timeout_ms: 5000\nlogging:\n  level: warn\n"
        ),
    )
    .unwrap();
    path.display().to_string()
}

#[test]
fn csv_job_downloads_into_download_dir() {
    let port = start_server(Reply::Download);
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), port);
    let downloads = tmp.path().join("downloads");
    let downloads_arg = downloads.display().to_string();

    let out = run_cli_for_test(
        &[
            "--config",
            &config,
            "--download-dir",
            &downloads_arg,
            "csv",
            "sequencer",
            "11084",
        ],
        &SessionBackend,
    );

    assert_eq!(out.exit_code, 0, "stderr: {}", out.stderr);
    let saved = downloads.join("R11084_sequencer_events.csv");
    assert_eq!(
        out.stdout,
        format!(
            "Exporting sequencer events for run 11084\nDone\nSaved {}\n",
            saved.display()
        )
    );
    assert_eq!(std::fs::read_to_string(saved).unwrap(), CSV_BODY);
}

#[test]
fn server_error_exits_1() {
    let port = start_server(Reply::ServerError);
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), port);

    let out = run_cli_for_test(
        &["--config", &config, "csv", "sequencer", "7"],
        &SessionBackend,
    );

    assert_eq!(out.exit_code, 1);
    assert_eq!(out.stdout, "run 7 has no sequencer data\n");
    assert_eq!(out.stderr, "Error: run 7 has no sequencer data\n");
}

#[test]
fn unreachable_server_exits_1() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), port);

    let out = run_cli_for_test(
        &["--config", &config, "csv", "vertices", "1"],
        &SessionBackend,
    );

    assert_eq!(out.exit_code, 1);
    assert!(out.stderr.starts_with("Error: failed to connect to ws://127.0.0.1:"), "{}", out.stderr);
    assert!(out.stdout.is_empty());
}
