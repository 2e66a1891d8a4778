//! Reconnection credentials.
//!
//! A player who has joined a game holds an [`Identity`]: the player id and
//! session token returned by create-player. Both are persisted so that a
//! restarted client can rejoin the same game. Either field being empty means
//! "no credentials".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;
use crate::storage::KeyValueStore;

/// Storage key of the persisted player id.
pub const PLAYER_ID_KEY: &str = "playerId";

/// Storage key of the persisted session token.
pub const TOKEN_KEY: &str = "token";

/// A player's reconnection credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub player_id: String,
    pub token: String,
}

impl Identity {
    pub fn new(player_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            token: token.into(),
        }
    }

    /// Both fields are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.player_id.is_empty() && !self.token.is_empty()
    }
}

/// Persisted view of the local player's [`Identity`].
#[derive(Clone)]
pub struct IdentityStore {
    store: Arc<dyn KeyValueStore>,
}

impl IdentityStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn player_id(&self) -> String {
        self.store.get(PLAYER_ID_KEY)
    }

    pub fn token(&self) -> String {
        self.store.get(TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Propagates persistence failures from the underlying store.
    pub fn set_player_id(&self, player_id: &str) -> Result<()> {
        self.store.set(PLAYER_ID_KEY, player_id)
    }

    /// # Errors
    ///
    /// Propagates persistence failures from the underlying store.
    pub fn set_token(&self, token: &str) -> Result<()> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn current(&self) -> Identity {
        Identity {
            player_id: self.player_id(),
            token: self.token(),
        }
    }

    /// Persist both fields.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures from the underlying store.
    pub fn set(&self, identity: &Identity) -> Result<()> {
        self.set_player_id(&identity.player_id)?;
        self.set_token(&identity.token)
    }

    /// Forget the credentials after the server rejected them.
    ///
    /// The token is cleared first: once it is empty the identity is no longer
    /// complete, so a failure on the second write still cannot trigger a
    /// retry with the stale player id.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures from the underlying store.
    pub fn clear(&self) -> Result<()> {
        self.set_token("")?;
        self.set_player_id("")
    }

    pub fn subscribe_player_id(&self) -> watch::Receiver<String> {
        self.store.subscribe(PLAYER_ID_KEY)
    }

    pub fn subscribe_token(&self) -> watch::Receiver<String> {
        self.store.subscribe(TOKEN_KEY)
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore")
            .field("player_id", &self.player_id())
            .field("has_token", &!self.token().is_empty())
            .finish()
    }
}

/// Whether the client may open a realtime session right now.
///
/// A connection is attempted only once the game code is known and has been
/// validated, and only with complete credentials. After a connection error
/// the credentials are cleared, so this gate stays shut until new ones are
/// issued.
pub fn may_connect(identity: &Identity, game_code: &str, game_code_validated: bool) -> bool {
    identity.is_complete() && !game_code.is_empty() && game_code_validated
}
