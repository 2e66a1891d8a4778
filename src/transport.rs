//! Transport abstraction for the Punchline realtime connection.
//!
//! Two traits split the connection lifecycle:
//!
//! - [`Transport`] moves JSON text frames over an already-open connection.
//!   Framing (WebSocket messages, length prefixes, …) is the implementor's
//!   business.
//! - [`Connector`] opens a fresh [`Transport`] for a [`Handshake`]. The
//!   session calls it whenever credentials and a validated game code are
//!   available, and treats any error as a rejected connection.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use punchline_client::error::SyncError;
//! use punchline_client::protocol::Handshake;
//! use punchline_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), SyncError> {
//!         // Write one JSON frame
//! #       Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, SyncError>> {
//!         // Read one JSON frame; `None` once the peer closed cleanly
//! #       None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), SyncError> {
//! #       Ok(())
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Transport>, SyncError> {
//!         // Dial the server and present the handshake
//! #       Ok(Box::new(MyTransport {}))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::SyncError;
use crate::protocol::Handshake;

/// A bidirectional JSON text frame channel.
///
/// # Object Safety
///
/// The trait is object-safe; the session stores the live connection as
/// `Box<dyn Transport>`.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the session
/// loop polls it inside `tokio::select!`. Dropping an unfinished `recv`
/// future must not lose a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::TransportSend`] if the frame could not be written.
    async fn send(&mut self, message: String) -> Result<(), SyncError>;

    /// Receive the next JSON text frame.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the peer closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, SyncError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// regardless.
    async fn close(&mut self) -> Result<(), SyncError>;
}

/// Opens realtime sessions.
///
/// Implementations must send the handshake as part of connecting (for the
/// built-in transports, as the first frame). An `Err` is reported to the
/// session as a connection error and clears the stored credentials.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport authenticated with `handshake`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConnectFailed`] (or any transport error) if the
    /// session could not be established.
    async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Transport>, SyncError>;
}
