//! WebSocket transport on `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries frames as WebSocket text messages over
//! `ws://` or `wss://`. [`WebSocketConnector`] dials a fixed URL and sends
//! the auth frame before handing the transport to the session.
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (on by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), punchline_client::SyncError> {
//! use std::sync::Arc;
//! use punchline_client::{GameSession, MemoryStore, SessionConfig, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new("ws://localhost:5000/realtime");
//! let (session, snapshots) = GameSession::start(
//!     SessionConfig::new("12345"),
//!     connector,
//!     Arc::new(MemoryStore::new()),
//! );
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::SyncError;
use crate::protocol::{ClientFrame, Handshake};
use crate::transport::{Connector, Transport};

/// The underlying WebSocket stream type.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] over one WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: the stream only yields a
/// message once it is fully read.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the URL is invalid or the server cannot
    /// be reached. I/O error kinds are preserved.
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        tracing::debug!(url = %url, "connecting to realtime server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            SyncError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "realtime connection established");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-open stream (custom TLS, proxies, extra headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), SyncError> {
        if self.closed {
            return Err(SyncError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| SyncError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, SyncError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Some(Err(SyncError::TransportReceive(e.to_string()))),
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "server closed the realtime connection");
                    return None;
                }
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(bytes) => {
                    tracing::warn!(len = bytes.len(), "skipping binary frame");
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| SyncError::TransportSend(e.to_string()))
    }
}

/// Dials a fixed WebSocket URL and authenticates with the auth frame.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Transport>, SyncError> {
        let mut transport = WebSocketTransport::connect(&self.url)
            .await
            .map_err(|e| SyncError::ConnectFailed(e.to_string()))?;
        let auth = serde_json::to_string(&ClientFrame::auth(handshake)?)?;
        transport.send(auth).await?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_connector_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
        assert_send::<WebSocketConnector>();
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connect_failure() {
        let connector = WebSocketConnector::new("ws://127.0.0.1:1/realtime");
        let handshake = Handshake {
            game_code: "12345".into(),
            player_id: "p1".into(),
            token: "t1".into(),
        };
        let result = connector.connect(&handshake).await;
        assert!(matches!(result, Err(SyncError::ConnectFailed(_))));
    }

    #[tokio::test]
    async fn invalid_url_is_an_io_error() {
        let result = WebSocketTransport::connect("not a url").await;
        assert!(matches!(result, Err(SyncError::Io(_))));
    }
}
