//! Wire types for the Punchline realtime protocol.
//!
//! Every frame on the realtime connection is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`. Events that carry more than one
//! argument put them in a JSON array, e.g.
//! `{"event": "round:winner", "data": ["p1", ["a punchline"]]}`.
//!
//! Inbound frames are first read as an untyped [`EventFrame`]; the payload is
//! only decoded by the handler bound to that event name. [`ServerEvent`] is the
//! typed view of the same frames and is what servers, tests and demos use to
//! build them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::state::{Player, Settings};

// ── Event names ─────────────────────────────────────────────────────

/// Names of every server event the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Navigate,
    Host,
    PlayersInitial,
    SettingsInitial,
    ConnectError,
    PlayersAdd,
    PlayersRemove,
    SettingsUpdate,
    PunchlinesAdd,
    PunchlinesRemove,
    RoundNumber,
    RoundSetup,
    RoundIncrementPlayersChosen,
    RoundChosenPunchlines,
    RoundWinner,
}

impl EventKind {
    /// Every subscribed event, in binding order.
    pub const ALL: [EventKind; 15] = [
        EventKind::Navigate,
        EventKind::Host,
        EventKind::PlayersInitial,
        EventKind::SettingsInitial,
        EventKind::ConnectError,
        EventKind::PlayersAdd,
        EventKind::PlayersRemove,
        EventKind::SettingsUpdate,
        EventKind::PunchlinesAdd,
        EventKind::PunchlinesRemove,
        EventKind::RoundNumber,
        EventKind::RoundSetup,
        EventKind::RoundIncrementPlayersChosen,
        EventKind::RoundChosenPunchlines,
        EventKind::RoundWinner,
    ];

    /// The event name as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Navigate => "navigate",
            EventKind::Host => "host",
            EventKind::PlayersInitial => "players:initial",
            EventKind::SettingsInitial => "settings:initial",
            EventKind::ConnectError => "connect_error",
            EventKind::PlayersAdd => "players:add",
            EventKind::PlayersRemove => "players:remove",
            EventKind::SettingsUpdate => "settings:update",
            EventKind::PunchlinesAdd => "punchlines:add",
            EventKind::PunchlinesRemove => "punchlines:remove",
            EventKind::RoundNumber => "round:number",
            EventKind::RoundSetup => "round:setup",
            EventKind::RoundIncrementPlayersChosen => "round:increment-players-chosen",
            EventKind::RoundChosenPunchlines => "round:chosen-punchlines",
            EventKind::RoundWinner => "round:winner",
        }
    }

    /// Look up an event by its wire name. Returns `None` for names the
    /// client does not subscribe to.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Frames ──────────────────────────────────────────────────────────

/// A raw inbound frame: event name plus undecoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    /// Missing payloads (argument-less events) decode as `null`.
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    /// Build a frame for a known event.
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            event: kind.as_str().to_string(),
            data,
        }
    }

    /// Parse a JSON text message into a frame.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`](crate::SyncError::Serialization)
    /// if the text is not a `{event, data}` object.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The subscribed event this frame belongs to, if any.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_name(&self.event)
    }
}

/// Typed view of every subscribed server event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Move every client to a page, e.g. `"/LOBBY"`.
    #[serde(rename = "navigate")]
    Navigate(String),
    /// The given player id is now the host.
    #[serde(rename = "host")]
    Host(String),
    #[serde(rename = "players:initial")]
    PlayersInitial(Vec<Player>),
    #[serde(rename = "settings:initial")]
    SettingsInitial(Settings),
    /// The realtime layer rejected the session credentials.
    #[serde(rename = "connect_error")]
    ConnectError(String),
    #[serde(rename = "players:add")]
    PlayersAdd(Player),
    #[serde(rename = "players:remove")]
    PlayersRemove(String),
    /// `(setting name, value)`, e.g. `("ROUND_LIMIT", 10)`.
    #[serde(rename = "settings:update")]
    SettingsUpdate(String, u32),
    #[serde(rename = "punchlines:add")]
    PunchlinesAdd(Vec<String>),
    #[serde(rename = "punchlines:remove")]
    PunchlinesRemove(Vec<String>),
    #[serde(rename = "round:number")]
    RoundNumber(u32),
    #[serde(rename = "round:setup")]
    RoundSetup(String),
    #[serde(rename = "round:increment-players-chosen")]
    RoundIncrementPlayersChosen,
    #[serde(rename = "round:chosen-punchlines")]
    RoundChosenPunchlines(Vec<String>),
    /// `(winning player id, winning punchlines)`.
    #[serde(rename = "round:winner")]
    RoundWinner(String, Vec<String>),
}

impl ServerEvent {
    /// The event name this value is sent under.
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Navigate(_) => EventKind::Navigate,
            ServerEvent::Host(_) => EventKind::Host,
            ServerEvent::PlayersInitial(_) => EventKind::PlayersInitial,
            ServerEvent::SettingsInitial(_) => EventKind::SettingsInitial,
            ServerEvent::ConnectError(_) => EventKind::ConnectError,
            ServerEvent::PlayersAdd(_) => EventKind::PlayersAdd,
            ServerEvent::PlayersRemove(_) => EventKind::PlayersRemove,
            ServerEvent::SettingsUpdate(..) => EventKind::SettingsUpdate,
            ServerEvent::PunchlinesAdd(_) => EventKind::PunchlinesAdd,
            ServerEvent::PunchlinesRemove(_) => EventKind::PunchlinesRemove,
            ServerEvent::RoundNumber(_) => EventKind::RoundNumber,
            ServerEvent::RoundSetup(_) => EventKind::RoundSetup,
            ServerEvent::RoundIncrementPlayersChosen => EventKind::RoundIncrementPlayersChosen,
            ServerEvent::RoundChosenPunchlines(_) => EventKind::RoundChosenPunchlines,
            ServerEvent::RoundWinner(..) => EventKind::RoundWinner,
        }
    }

    /// Convert into the untyped frame the dispatcher consumes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`](crate::SyncError::Serialization)
    /// if the payload cannot be represented as JSON.
    pub fn to_frame(&self) -> Result<EventFrame> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }

    /// Serialize into a JSON text message.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`](crate::SyncError::Serialization)
    /// if the payload cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// Credentials presented when opening a realtime session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub game_code: String,
    pub player_id: String,
    pub token: String,
}

/// A frame sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ClientFrame {
    /// Wire name of the handshake frame.
    pub const AUTH: &'static str = "auth";

    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// The first frame on every fresh transport.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`](crate::SyncError::Serialization)
    /// if the handshake cannot be represented as JSON.
    pub fn auth(handshake: &Handshake) -> Result<Self> {
        Ok(Self::new(Self::AUTH, serde_json::to_value(handshake)?))
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
    use serde_json::json;

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_name("players:shuffle"), None);
    }

    #[test]
    fn multi_argument_events_use_arrays() {
        let frame = ServerEvent::RoundWinner("p1".into(), vec!["a".into(), "b".into()])
            .to_frame()
            .unwrap();
        assert_eq!(frame.event, "round:winner");
        assert_eq!(frame.data, json!(["p1", ["a", "b"]]));

        let frame = ServerEvent::SettingsUpdate("ROUND_LIMIT".into(), 10)
            .to_frame()
            .unwrap();
        assert_eq!(frame.data, json!(["ROUND_LIMIT", 10]));
    }

    #[test]
    fn argumentless_event_parses_with_null_data() {
        let frame = EventFrame::parse(r#"{"event":"round:increment-players-chosen"}"#).unwrap();
        assert_eq!(frame.kind(), Some(EventKind::RoundIncrementPlayersChosen));
        assert!(frame.data.is_null());
    }

    #[test]
    fn player_payload_uses_camel_case() {
        let frame = ServerEvent::PlayersAdd(Player::new("p1", "Alice"))
            .to_frame()
            .unwrap();
        assert_eq!(
            frame.data,
            json!({"id": "p1", "nickname": "Alice", "score": 0, "isHost": false})
        );
    }

    #[test]
    fn auth_frame_carries_camel_case_handshake() {
        let frame = ClientFrame::auth(&Handshake {
            game_code: "12345".into(),
            player_id: "p1".into(),
            token: "t".into(),
        })
        .unwrap();
        let text = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            text,
            r#"{"event":"auth","data":{"gameCode":"12345","playerId":"p1","token":"t"}}"#
        );
    }

    #[test]
    fn non_object_text_is_a_serialization_error() {
        assert!(EventFrame::parse("[1,2,3").is_err());
        assert!(EventFrame::parse(r#"{"data": 1}"#).is_err());
    }
}
