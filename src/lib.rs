//! # Punchline Client
//!
//! Client-side realtime sync engine for the Punchline party game.
//!
//! The server is authoritative. This crate keeps a local mirror of the game
//! (settings, players, the current round, the player's punchline hand and
//! the current page) in step with the event stream the server pushes over
//! one realtime connection, and exposes it as immutable snapshots for a UI
//! to render.
//!
//! ## Features
//!
//! - **One handler per event**: handler bindings are diffed on every
//!   rebind, so no event is ever applied twice
//! - **Atomic events**: each event is applied fully before a snapshot is
//!   published; a malformed payload stops the session instead of applying
//!   half of it
//! - **Persisted identity**: player id and reconnection token survive
//!   restarts through a [`KeyValueStore`]
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for
//!   any backend; WebSocket is built in (`transport-websocket`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "transport-websocket", feature = "http-reqwest"))]
//! # async fn example() -> Result<(), punchline_client::SyncError> {
//! use std::sync::Arc;
//! use punchline_client::{
//!     GameApi, GameSession, JsonFileStore, ReqwestBackend, SessionConfig, WebSocketConnector,
//! };
//!
//! let api = GameApi::new(ReqwestBackend::new("http://localhost:5000"));
//! let (session, mut snapshots) = GameSession::start(
//!     SessionConfig::new("12345"),
//!     WebSocketConnector::new("ws://localhost:5000/realtime"),
//!     Arc::new(JsonFileStore::open("punchline.json")?),
//! );
//!
//! if session.enter(&api).await?.is_success() {
//!     session.submit_nickname(&api, "Alice").await?;
//! }
//!
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow_and_update().clone();
//!     println!("{} with {} players", snapshot.page, snapshot.players.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod navigation;
pub mod protocol;
pub mod session;
pub mod state;
pub mod storage;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use api::{ApiResponse, GameApi, HttpBackend, HttpReply};
pub use dispatcher::{Delivery, Dispatcher, HandlerTable, Listeners};
pub use error::{Result, SyncError};
pub use identity::{Identity, IdentityStore};
pub use navigation::{Navigator, Page};
pub use protocol::{ClientFrame, EventFrame, EventKind, Handshake, ServerEvent};
pub use session::{GameSession, SessionConfig};
pub use state::{ConnectionStatus, GameSnapshot, GameState, Player, Players, Settings};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use transport::{Connector, Transport};

#[cfg(feature = "http-reqwest")]
pub use api::ReqwestBackend;

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
