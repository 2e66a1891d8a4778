//! Domain state stores.
//!
//! Each store owns one slice of client state and exposes pure operations
//! (previous value + input → next value). The same operations serve server
//! events and local callers. [`GameState`] holds the live stores inside the
//! session loop; renderers only ever see an immutable [`GameSnapshot`].

mod players;
mod punchlines;
mod round;
mod settings;

pub use players::{Player, Players};
pub use punchlines::PunchlineHand;
pub use round::{Round, Winner};
pub use settings::{SettingKey, Settings, INITIAL_MAX_PLAYERS, INITIAL_ROUND_LIMIT};

use crate::identity::{Identity, IdentityStore};
use crate::navigation::{Navigator, Page};

/// Health of the realtime connection as seen by the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection attempted yet (or waiting for credentials).
    #[default]
    Idle,
    Connecting,
    Connected,
    /// The connection ended; a new attempt may follow new credentials.
    Disconnected { reason: Option<String> },
    /// The session stopped on a local error and will not resume.
    Failed { reason: String },
}

/// Live client state, owned by the session loop.
#[derive(Debug, Clone)]
pub struct GameState {
    pub settings: Settings,
    pub players: Players,
    pub round: Round,
    pub hand: PunchlineHand,
    pub navigator: Navigator,
    pub identity: IdentityStore,
    pub connection: ConnectionStatus,
}

impl GameState {
    pub fn new(settings: Settings, identity: IdentityStore) -> Self {
        Self {
            settings,
            players: Players::default(),
            round: Round::default(),
            hand: PunchlineHand::default(),
            navigator: Navigator::default(),
            identity,
            connection: ConnectionStatus::Idle,
        }
    }

    /// Record the round winner and award the point in one step.
    ///
    /// The server is authoritative, so a winner is always applied. A round
    /// that already has one is logged and overwritten.
    pub fn declare_winner(&mut self, player_id: &str, punchlines: Vec<String>) {
        if let Some(previous) = self.round.winner() {
            tracing::warn!(
                previous = %previous.player_id,
                player_id = %player_id,
                "round already had a winner, replacing"
            );
        }
        let round = self.round.with_winner(player_id, punchlines);
        self.players = self.players.with_point_for(player_id);
        self.round = round;
    }

    /// Immutable view for renderers.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            page: self.navigator.current(),
            settings: self.settings,
            players: self.players.clone(),
            round: self.round.clone(),
            hand: self.hand.clone(),
            identity: self.identity.current(),
            connection: self.connection.clone(),
        }
    }
}

/// Everything a renderer needs, captured between two events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub page: Page,
    pub settings: Settings,
    pub players: Players,
    pub round: Round,
    pub hand: PunchlineHand,
    pub identity: Identity,
    pub connection: ConnectionStatus,
}
