//! The game session: one realtime connection and the state it drives.
//!
//! [`GameSession`] is a thin handle over a background session loop. The loop
//! is the only owner of [`GameState`], the connection's [`Listeners`] and the
//! live [`Transport`]; everything else talks to it through a command channel
//! and reads immutable [`GameSnapshot`]s from a `watch` channel.
//!
//! Frames are applied one at a time, in the order the transport yields them.
//! A snapshot is published only after a frame has been fully applied, so a
//! reader never sees half of an event (e.g. a round winner without the point).
//!
//! # Example
//!
//! ```rust,ignore
//! let api = GameApi::new(ReqwestBackend::new("http://localhost:5000"));
//! let (session, mut snapshots) = GameSession::start(
//!     SessionConfig::new("12345"),
//!     WebSocketConnector::new("ws://localhost:5000/realtime"),
//!     Arc::new(JsonFileStore::open("punchline.json")?),
//! );
//!
//! if !session.enter(&api).await?.is_success() {
//!     return Ok(()); // no such game
//! }
//! session.submit_nickname(&api, "Alice").await?;
//!
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow_and_update().clone();
//!     render(&snapshot);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::api::{ApiResponse, GameApi, HttpBackend};
use crate::dispatcher::{self, Delivery, Dispatcher, Listeners};
use crate::error::{Result, SyncError};
use crate::identity::{may_connect, Identity, IdentityStore};
use crate::protocol::{ClientFrame, EventFrame, EventKind, Handshake};
use crate::state::{ConnectionStatus, GameSnapshot, GameState, Settings};
use crate::storage::KeyValueStore;
use crate::transport::{Connector, Transport};

/// Default bound on a single connect attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GameSession`].
///
/// # Example
///
/// ```
/// use punchline_client::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("12345")
///     .with_connect_timeout(Duration::from_secs(3));
/// assert_eq!(config.game_code, "12345");
/// assert_eq!(config.initial_settings.round_limit, 69);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Code of the game to join.
    pub game_code: String,
    /// Settings shown until the server pushes `settings:initial`.
    pub initial_settings: Settings,
    /// Bound on one connect attempt. Expiry counts as a connection error.
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Time given to the session loop to close the transport on
    /// [`GameSession::shutdown`] before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl SessionConfig {
    pub fn new(game_code: impl Into<String>) -> Self {
        Self {
            game_code: game_code.into(),
            initial_settings: Settings::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_initial_settings(mut self, settings: Settings) -> Self {
        self.initial_settings = settings;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Commands ────────────────────────────────────────────────────────

enum Command {
    /// The game code passed validation; connect if credentials allow.
    GameCodeValidated,
    /// Persist new credentials, then connect if the game code allows.
    SetIdentity(Identity, oneshot::Sender<Result<()>>),
    /// Local back-navigation.
    Back,
    /// Send a frame over the live transport.
    Emit(ClientFrame),
    /// Rebind the handler table (a no-op diff while mounted).
    Remount,
}

// ── Session handle ──────────────────────────────────────────────────

/// Handle to a running game session.
///
/// Created by [`GameSession::start`]. Dropping the handle aborts the session
/// loop; call [`shutdown`](GameSession::shutdown) to close the connection
/// gracefully first.
pub struct GameSession {
    game_code: String,
    cmd_tx: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Arc<GameSnapshot>>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl GameSession {
    /// Spawn the session loop and return the handle plus a snapshot receiver.
    ///
    /// Nothing connects yet: a connection is only attempted once the game
    /// code has been validated (see [`enter`](Self::enter)) and complete
    /// credentials are stored.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use = "the snapshot receiver is how state changes are observed"]
    pub fn start(
        config: SessionConfig,
        connector: impl Connector,
        store: Arc<dyn KeyValueStore>,
    ) -> (Self, watch::Receiver<Arc<GameSnapshot>>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state = GameState::new(config.initial_settings, IdentityStore::new(store));
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(state.snapshot()));

        let session_loop = SessionLoop {
            game_code: config.game_code.clone(),
            connect_timeout: config.connect_timeout,
            connector,
            state,
            listeners: Listeners::new(),
            dispatcher: Dispatcher::default(),
            transport: None,
            game_code_validated: false,
            snapshot_tx,
        };
        let task = tokio::spawn(session_loop.run(cmd_rx, shutdown_rx));

        let session = Self {
            game_code: config.game_code,
            cmd_tx,
            snapshots: snapshot_rx.clone(),
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };
        (session, snapshot_rx)
    }

    /// Validate the game code and, on success, allow the session to connect.
    ///
    /// A failed validation is returned as-is; the caller is expected to
    /// leave the game.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] if the session loop has stopped.
    pub async fn enter<B: HttpBackend>(&self, api: &GameApi<B>) -> Result<ApiResponse<()>> {
        let response = api.validate_game(&self.game_code).await;
        if response.is_success() {
            self.send(Command::GameCodeValidated)?;
        } else {
            info!(game_code = %self.game_code, status = response.status(), "game code rejected");
        }
        Ok(response)
    }

    /// Create a player with `nickname` and store the returned credentials.
    ///
    /// Storing credentials triggers a connection attempt if the game code is
    /// already validated. This never navigates: the server moves the client
    /// to the lobby once it has joined. A rejected nickname is returned as a
    /// [`ApiResponse::Failure`] and leaves stored credentials untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] if the session loop has stopped,
    /// or the storage error if the credentials could not be persisted.
    pub async fn submit_nickname<B: HttpBackend>(
        &self,
        api: &GameApi<B>,
        nickname: &str,
    ) -> Result<ApiResponse<Identity>> {
        let response = api.create_player(&self.game_code, nickname).await;
        if let ApiResponse::Success { data, .. } = &response {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.send(Command::SetIdentity(data.clone(), ack_tx))?;
            ack_rx.await.map_err(|_| SyncError::NotConnected)??;
        }
        Ok(response)
    }

    /// Go back one page in the local history.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] if the session loop has stopped.
    pub fn back(&self) -> Result<()> {
        self.send(Command::Back)
    }

    /// Send a page action to the server.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] unless the realtime connection is
    /// up.
    pub fn emit(&self, event: impl Into<String>, data: Value) -> Result<()> {
        if self.snapshots.borrow().connection != ConnectionStatus::Connected {
            return Err(SyncError::NotConnected);
        }
        self.send(Command::Emit(ClientFrame::new(event, data)))
    }

    /// Rebind event handlers, e.g. after the view tree was rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] if the session loop has stopped.
    pub fn remount(&self) -> Result<()> {
        self.send(Command::Remount)
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<GameSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn game_code(&self) -> &str {
        &self.game_code
    }

    /// Stop the session: unbind every handler, close the transport and wait
    /// for the loop to exit.
    pub async fn shutdown(&mut self) {
        debug!("GameSession: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| SyncError::NotConnected)
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("game_code", &self.game_code)
            .field("connection", &self.snapshots.borrow().connection)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        // No executor to drive a graceful close from here; abort instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

struct SessionLoop<C> {
    game_code: String,
    connect_timeout: Duration,
    connector: C,
    state: GameState,
    listeners: Listeners,
    dispatcher: Dispatcher,
    transport: Option<Box<dyn Transport>>,
    game_code_validated: bool,
    snapshot_tx: watch::Sender<Arc<GameSnapshot>>,
}

/// Next frame from the live transport; pending forever while disconnected.
async fn recv_next(transport: &mut Option<Box<dyn Transport>>) -> Option<Result<String>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

impl<C: Connector> SessionLoop<C> {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        debug!(game_code = %self.game_code, "session loop started");
        self.dispatcher.mount(&mut self.listeners);

        let fatal = loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if let Err(e) = self.handle_command(cmd).await {
                                break Some(e);
                            }
                        }
                        // Every handle dropped.
                        None => {
                            debug!("command channel closed, stopping session loop");
                            break None;
                        }
                    }
                }

                _ = &mut shutdown_rx => {
                    debug!("shutdown signal received");
                    break None;
                }

                incoming = recv_next(&mut self.transport) => {
                    match incoming {
                        Some(Ok(text)) => {
                            if let Err(e) = self.handle_text(&text).await {
                                break Some(e);
                            }
                        }
                        Some(Err(e)) => {
                            error!("transport receive error: {e}");
                            self.drop_transport(Some(format!("transport receive error: {e}"))).await;
                        }
                        None => {
                            debug!("transport closed by server");
                            self.drop_transport(None).await;
                        }
                    }
                }
            }
        };

        self.teardown(fatal).await;
        debug!("session loop exited");
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.state.snapshot()));
    }

    async fn handle_command(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::GameCodeValidated => {
                self.game_code_validated = true;
                self.try_connect().await?;
            }
            Command::SetIdentity(identity, ack) => {
                let stored = self.state.identity.set(&identity);
                let ok = stored.is_ok();
                self.publish();
                let _ = ack.send(stored);
                if ok {
                    self.try_connect().await?;
                }
            }
            Command::Back => {
                if self.state.navigator.back() {
                    self.publish();
                }
            }
            Command::Emit(frame) => self.emit(frame).await?,
            Command::Remount => {
                self.dispatcher.mount(&mut self.listeners);
            }
        }
        Ok(())
    }

    async fn emit(&mut self, frame: ClientFrame) -> Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            warn!(event = %frame.event, "dropping frame, not connected");
            return Ok(());
        };
        let json = serde_json::to_string(&frame)?;
        if let Err(e) = transport.send(json).await {
            error!("transport send error: {e}");
            self.drop_transport(Some(format!("transport send error: {e}"))).await;
        }
        Ok(())
    }

    /// Connect if credentials and the game code allow it.
    async fn try_connect(&mut self) -> Result<()> {
        if self.transport.is_some() {
            debug!("already connected");
            return Ok(());
        }
        let identity = self.state.identity.current();
        if !may_connect(&identity, &self.game_code, self.game_code_validated) {
            debug!(
                validated = self.game_code_validated,
                has_credentials = identity.is_complete(),
                "not connecting yet"
            );
            return Ok(());
        }

        let handshake = Handshake {
            game_code: self.game_code.clone(),
            player_id: identity.player_id,
            token: identity.token,
        };
        info!(game_code = %handshake.game_code, player_id = %handshake.player_id, "connecting");
        self.state.connection = ConnectionStatus::Connecting;
        self.publish();

        let attempt = tokio::time::timeout(self.connect_timeout, self.connector.connect(&handshake));
        match attempt.await {
            Ok(Ok(transport)) => {
                info!("connected");
                self.transport = Some(transport);
                self.state.connection = ConnectionStatus::Connected;
                self.publish();
                Ok(())
            }
            Ok(Err(e)) => self.connection_error(e.to_string()),
            Err(_) => self.connection_error(SyncError::Timeout.to_string()),
        }
    }

    /// Route a local connect failure through the `connect_error` handler.
    fn connection_error(&mut self, reason: String) -> Result<()> {
        warn!("connect failed: {reason}");
        let frame = EventFrame::new(EventKind::ConnectError, Value::String(reason));
        self.apply(frame).map(|_| ())
    }

    /// Apply one frame to a copy of the state and commit it only on success.
    fn apply(&mut self, frame: EventFrame) -> Result<Delivery> {
        let mut next = self.state.clone();
        let delivery = dispatcher::deliver(&self.listeners, frame, &mut next)?;
        if let Delivery::Applied { .. } = delivery {
            self.state = next;
            self.publish();
        }
        Ok(delivery)
    }

    async fn handle_text(&mut self, text: &str) -> Result<()> {
        let frame = EventFrame::parse(text)?;
        let delivery = self.apply(frame)?;
        if let Delivery::Applied {
            kind: EventKind::ConnectError,
            ..
        } = delivery
        {
            // The server rejected the session; the handler already cleared
            // the credentials and recorded the reason.
            if let Some(mut transport) = self.transport.take() {
                let _ = transport.close().await;
            }
        }
        Ok(())
    }

    async fn drop_transport(&mut self, reason: Option<String>) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.state.connection = ConnectionStatus::Disconnected { reason };
        self.publish();
    }

    async fn teardown(&mut self, fatal: Option<SyncError>) {
        self.dispatcher.unmount(&mut self.listeners);
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.state.connection = match fatal {
            Some(e) => {
                error!("session stopped: {e}");
                ConnectionStatus::Failed {
                    reason: e.to_string(),
                }
            }
            None => match &self.state.connection {
                ConnectionStatus::Connected | ConnectionStatus::Connecting => {
                    ConnectionStatus::Disconnected {
                        reason: Some("session shut down".into()),
                    }
                }
                other => other.clone(),
            },
        };
        self.publish();
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
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connector that always refuses.
    struct Refusing {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for Refusing {
        async fn connect(&self, _handshake: &Handshake) -> Result<Box<dyn Transport>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::ConnectFailed("invalid token".into()))
        }
    }

    /// Connector that never completes.
    struct Hanging;

    #[async_trait]
    impl Connector for Hanging {
        async fn connect(&self, _handshake: &Handshake) -> Result<Box<dyn Transport>> {
            std::future::pending().await
        }
    }

    fn store_with(identity: &Identity) -> Arc<dyn KeyValueStore> {
        let store = Arc::new(MemoryStore::new());
        IdentityStore::new(store.clone()).set(identity).unwrap();
        store
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = SessionConfig::new("42");
        assert_eq!(config.game_code, "42");
        assert_eq!(config.initial_settings, Settings::default());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn starts_idle_on_nickname() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (mut session, snapshots) = GameSession::start(
            SessionConfig::new("42"),
            Refusing {
                attempts: attempts.clone(),
            },
            Arc::new(MemoryStore::new()),
        );
        let snap = snapshots.borrow().clone();
        assert_eq!(snap.connection, ConnectionStatus::Idle);
        assert_eq!(snap.page, crate::navigation::Page::Nickname);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn refused_connect_clears_credentials() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (mut session, mut snapshots) = GameSession::start(
            SessionConfig::new("42"),
            Refusing {
                attempts: attempts.clone(),
            },
            store_with(&Identity::new("p1", "t1")),
        );
        session.send(Command::GameCodeValidated).unwrap();

        let snap = tokio::time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|s| matches!(s.connection, ConnectionStatus::Disconnected { .. })),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(snap.identity, Identity::default());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        // Validating again does not retry with the cleared credentials.
        session.send(Command::GameCodeValidated).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn connect_timeout_counts_as_connect_error() {
        let (mut session, mut snapshots) = GameSession::start(
            SessionConfig::new("42").with_connect_timeout(Duration::from_millis(20)),
            Hanging,
            store_with(&Identity::new("p1", "t1")),
        );
        session.send(Command::GameCodeValidated).unwrap();

        let snap = tokio::time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|s| matches!(s.connection, ConnectionStatus::Disconnected { .. })),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(
            snap.connection,
            ConnectionStatus::Disconnected {
                reason: Some("operation timed out".into())
            }
        );
        assert!(!snap.identity.is_complete());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn emit_requires_connection() {
        let (mut session, _snapshots) = GameSession::start(
            SessionConfig::new("42"),
            Hanging,
            Arc::new(MemoryStore::new()),
        );
        let result = session.emit("punchlines:submit", Value::Null);
        assert!(matches!(result, Err(SyncError::NotConnected)));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let (mut session, _snapshots) = GameSession::start(
            SessionConfig::new("42"),
            Hanging,
            Arc::new(MemoryStore::new()),
        );
        session.shutdown().await;
        assert!(matches!(session.back(), Err(SyncError::NotConnected)));
    }
}
