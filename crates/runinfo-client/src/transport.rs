//! Frame transport.
//!
//! The multiplexer only needs to push text frames out and pull text frames
//! in. [`FrameSink`] and [`FrameSource`] are those two halves; the
//! WebSocket implementation lives here and in-memory doubles live in
//! [`crate::mock`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outgoing half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, frame: String) -> Result<(), ClientError>;

    /// Start a clean close. Safe to call more than once.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Incoming half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame, or `None` once the peer has closed.
    async fn next_frame(&mut self) -> Option<Result<String, ClientError>>;
}

pub struct WsSink {
    inner: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, frame: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        self.inner
            .send(Message::text(frame))
            .await
            .map_err(|err| ClientError::Send(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner
            .close()
            .await
            .map_err(|err| ClientError::Send(err.to_string()))
    }
}

pub struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_string())),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite; binary frames are not
                // part of the protocol.
                Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    continue
                }
                Err(err) => return Some(Err(ClientError::Receive(err.to_string()))),
            }
        }
    }
}

/// Open a WebSocket to `url`, giving up after `timeout`.
pub async fn connect(url: &Url, timeout: Duration) -> Result<(WsSink, WsSource), ClientError> {
    let attempt = tokio_tungstenite::connect_async(url.as_str());
    let (stream, _response) = match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(err)) => {
            return Err(ClientError::Connect {
                url: url.to_string(),
                message: err.to_string(),
            })
        }
        Err(_) => {
            return Err(ClientError::ConnectTimeout {
                url: url.to_string(),
            })
        }
    };
    tracing::debug!(url = %url, "websocket connected");
    let (sink, source) = stream.split();
    Ok((
        WsSink {
            inner: sink,
            closed: false,
        },
        WsSource { inner: source },
    ))
}
