//! Game settings pushed by the server.

use serde::{Deserialize, Serialize};

/// Round limit used until the server pushes `settings:initial`.
pub const INITIAL_ROUND_LIMIT: u32 = 69;

/// Player cap used until the server pushes `settings:initial`.
pub const INITIAL_MAX_PLAYERS: u32 = 40;

/// Host-configurable game settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub round_limit: u32,
    pub max_players: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            round_limit: INITIAL_ROUND_LIMIT,
            max_players: INITIAL_MAX_PLAYERS,
        }
    }
}

/// A single setting addressable by `settings:update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    MaxPlayers,
    RoundLimit,
}

impl SettingKey {
    /// Map the server's setting name. Unrecognized names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "MAX_PLAYERS" => Some(SettingKey::MaxPlayers),
            "ROUND_LIMIT" => Some(SettingKey::RoundLimit),
            _ => None,
        }
    }
}

impl Settings {
    /// Returns these settings with one key overwritten. Both settings must
    /// stay positive, so a zero value is ignored.
    #[must_use]
    pub fn with(self, key: SettingKey, value: u32) -> Self {
        if value == 0 {
            tracing::warn!(setting = ?key, "ignoring zero value for setting");
            return self;
        }
        match key {
            SettingKey::MaxPlayers => Self {
                max_players: value,
                ..self
            },
            SettingKey::RoundLimit => Self {
                round_limit: value,
                ..self
            },
        }
    }

    /// Take every positive value from `incoming`, keeping the current value
    /// where `incoming` has a zero.
    #[must_use]
    pub fn replaced(self, incoming: Settings) -> Self {
        self.with(SettingKey::RoundLimit, incoming.round_limit)
            .with(SettingKey::MaxPlayers, incoming.max_players)
    }

    /// Apply a named update from the wire. Unrecognized names leave the
    /// settings unchanged.
    #[must_use]
    pub fn updated(self, name: &str, value: u32) -> Self {
        match SettingKey::from_wire(name) {
            Some(key) => self.with(key, value),
            None => {
                tracing::warn!(setting = %name, "ignoring update for unrecognized setting");
                self
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pre_push_values() {
        let settings = Settings::default();
        assert_eq!(settings.round_limit, 69);
        assert_eq!(settings.max_players, 40);
    }

    #[test]
    fn round_limit_update_keeps_max_players() {
        let settings = Settings::default().updated("ROUND_LIMIT", 10);
        assert_eq!(
            settings,
            Settings {
                round_limit: 10,
                max_players: 40
            }
        );
    }

    #[test]
    fn max_players_update_keeps_round_limit() {
        let settings = Settings::default().updated("MAX_PLAYERS", 8);
        assert_eq!(settings.max_players, 8);
        assert_eq!(settings.round_limit, 69);
    }

    #[test]
    fn unrecognized_setting_is_ignored() {
        let settings = Settings::default();
        assert_eq!(settings.updated("TIME_LIMIT", 3), settings);
        assert_eq!(settings.updated("round_limit", 3), settings);
    }

    #[test]
    fn zero_values_are_ignored() {
        let settings = Settings::default();
        assert_eq!(settings.updated("ROUND_LIMIT", 0), settings);
        assert_eq!(settings.with(SettingKey::MaxPlayers, 0), settings);
    }

    #[test]
    fn replaced_keeps_current_value_for_zero_fields() {
        let settings = Settings::default().replaced(Settings {
            round_limit: 5,
            max_players: 0,
        });
        assert_eq!(
            settings,
            Settings {
                round_limit: 5,
                max_players: 40
            }
        );
    }
}
