//! Built-in [`Transport`](crate::Transport) implementations.
//!
//! | Feature                | Transport              | Connector              |
//! |------------------------|------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] | [`WebSocketConnector`] |

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
