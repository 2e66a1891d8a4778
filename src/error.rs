//! Error types for the Punchline client.

use thiserror::Error;

/// Errors that can occur while synchronizing with a Punchline game server.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a frame.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires a live connection.
    #[error("not connected to server")]
    NotConnected,

    /// A known event arrived with a payload of the wrong shape.
    ///
    /// Applying such an event could leave the local state out of step with
    /// the server, so the session stops instead.
    #[error("malformed payload for event `{event}`: {source}")]
    MalformedEvent {
        /// Wire name of the offending event.
        event: &'static str,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// The connector could not open a session (rejected or unreachable).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// An HTTP request produced no response at all.
    #[error("request failed: {0}")]
    Request(String),

    /// The persisted key-value store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Punchline client operations.
pub type Result<T> = std::result::Result<T, SyncError>;
