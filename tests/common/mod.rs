#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Punchline client integration tests.
//!
//! Provides a channel-based [`MockTransport`] driven through a
//! [`ServerHandle`], a scriptable [`MockConnector`], a scriptable
//! [`MockBackend`] for the HTTP endpoints, and snapshot helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use punchline_client::api::{HttpBackend, HttpReply};
use punchline_client::protocol::{ClientFrame, Handshake, ServerEvent};
use punchline_client::{Connector, GameSnapshot, SyncError, Transport};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

// ── MockTransport ───────────────────────────────────────────────────

type Incoming = Option<Result<String, SyncError>>;

/// A transport fed by a [`ServerHandle`].
///
/// Frames pushed through the handle are yielded by `recv()` in order. Once
/// the handle is dropped, `recv()` hangs so the session stays connected
/// until shutdown.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

/// The server side of a [`MockTransport`].
#[derive(Clone)]
pub struct ServerHandle {
    tx: mpsc::UnboundedSender<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (Self, ServerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, ServerHandle { tx, sent, closed })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), SyncError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(SyncError::TransportClosed);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, SyncError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl ServerHandle {
    /// Push a raw text frame.
    pub fn push_text(&self, text: impl Into<String>) {
        self.tx.send(Some(Ok(text.into()))).unwrap();
    }

    /// Push a typed server event.
    pub fn push(&self, event: ServerEvent) {
        self.push_text(event.to_json().unwrap());
    }

    /// Push a transport-level receive error.
    pub fn push_error(&self, message: &str) {
        self.tx
            .send(Some(Err(SyncError::TransportReceive(message.into()))))
            .unwrap();
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        self.tx.send(None).unwrap();
    }

    /// Every frame the client sent, parsed.
    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).expect("client frame"))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// A connector with scripted outcomes, consumed one per attempt.
///
/// Accepted connections send the auth frame first, like the WebSocket
/// connector. Attempts beyond the script are refused.
#[derive(Clone, Default)]
pub struct MockConnector {
    outcomes: Arc<StdMutex<VecDeque<Result<MockTransport, SyncError>>>>,
    handshakes: Arc<StdMutex<Vec<Handshake>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an accepted connection and return its server side.
    pub fn accept(&self) -> ServerHandle {
        let (transport, server) = MockTransport::new();
        self.outcomes.lock().unwrap().push_back(Ok(transport));
        server
    }

    /// Script a refused connection.
    pub fn refuse(&self, reason: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(SyncError::ConnectFailed(reason.into())));
    }

    /// Handshakes presented so far, one per attempt.
    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.handshakes.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Transport>, SyncError> {
        self.handshakes.lock().unwrap().push(handshake.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::ConnectFailed("no scripted server".into())));
        let mut transport = outcome?;
        let auth = serde_json::to_string(&ClientFrame::auth(handshake)?)?;
        transport.send(auth).await?;
        Ok(Box::new(transport))
    }
}

// ── MockBackend ─────────────────────────────────────────────────────

/// One request as seen by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
}

/// An HTTP backend with scripted replies, consumed one per request.
///
/// Requests beyond the script fail with no response.
#[derive(Clone, Default)]
pub struct MockBackend {
    replies: Arc<StdMutex<VecDeque<Result<HttpReply, SyncError>>>>,
    calls: Arc<StdMutex<Vec<RecordedCall>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, status: u16, body: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(HttpReply {
            status,
            body: body.into(),
        }));
        self
    }

    /// Script a request that gets no response (network failure).
    pub fn fail(&self) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(SyncError::Request("connection reset".into())));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, path: &str, query: &[(&str, &str)]) -> Result<HttpReply, SyncError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.into(),
            query: query
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Request("no scripted reply".into())))
    }
}

#[async_trait]
impl HttpBackend for MockBackend {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<HttpReply, SyncError> {
        self.record("GET", path, query)
    }

    async fn post(&self, path: &str, query: &[(&str, &str)]) -> Result<HttpReply, SyncError> {
        self.record("POST", path, query)
    }
}

// ── Snapshot helpers ────────────────────────────────────────────────

/// Wait (up to one second) for a snapshot matching `predicate`.
pub async fn wait_for(
    snapshots: &mut watch::Receiver<Arc<GameSnapshot>>,
    predicate: impl FnMut(&Arc<GameSnapshot>) -> bool,
) -> Arc<GameSnapshot> {
    let snapshot = tokio::time::timeout(Duration::from_secs(1), snapshots.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("session loop dropped the snapshot channel");
    Arc::clone(&snapshot)
}

/// Give the session loop time to drain queued frames and commands.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// A player with no points who is not host.
pub fn player(id: &str, nickname: &str) -> punchline_client::Player {
    punchline_client::Player::new(id, nickname)
}

/// Raw frame text for an event name and payload.
pub fn frame_json(event: &str, data: Value) -> String {
    serde_json::json!({ "event": event, "data": data }).to_string()
}
