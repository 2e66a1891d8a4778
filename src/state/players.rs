//! The Players store.
//!
//! Players are kept in join order. Every operation returns a new [`Players`]
//! value; a mutation always allocates a fresh collection so that holders of
//! an older snapshot can tell, by identity alone, that something changed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A player in the game lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub is_host: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            score: 0,
            is_host: false,
        }
    }
}

/// Ordered collection of players keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Players {
    list: Arc<Vec<Player>>,
}

impl Players {
    /// Replace the whole collection, e.g. from `players:initial`.
    ///
    /// Later duplicates of an id are dropped, and only the first player
    /// flagged as host keeps the flag.
    pub fn initialised(players: Vec<Player>) -> Self {
        let mut list: Vec<Player> = Vec::with_capacity(players.len());
        let mut seen_host = false;
        for mut player in players {
            if list.iter().any(|p| p.id == player.id) {
                continue;
            }
            if player.is_host {
                player.is_host = !seen_host;
                seen_host = true;
            }
            list.push(player);
        }
        Self {
            list: Arc::new(list),
        }
    }

    /// Append a player. Adding an id that is already present is a no-op.
    #[must_use]
    pub fn added(&self, player: Player) -> Self {
        if self.contains(&player.id) {
            tracing::debug!(player_id = %player.id, "player already present");
            return self.clone();
        }
        let mut list = Vec::with_capacity(self.list.len() + 1);
        list.extend(self.list.iter().cloned());
        list.push(Player {
            is_host: false,
            ..player
        });
        Self {
            list: Arc::new(list),
        }
    }

    /// Remove a player by id. Removing an absent id is a no-op.
    #[must_use]
    pub fn removed(&self, id: &str) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        Self {
            list: Arc::new(self.list.iter().filter(|p| p.id != id).cloned().collect()),
        }
    }

    /// Make `id` the host and demote everyone else.
    ///
    /// An id that is not in the collection leaves nobody as host.
    #[must_use]
    pub fn with_host(&self, id: &str) -> Self {
        self.mapped(|p| Player {
            is_host: p.id == id,
            ..p.clone()
        })
    }

    /// Add one point to a player's score. Unknown ids are a no-op.
    #[must_use]
    pub fn with_point_for(&self, id: &str) -> Self {
        if !self.contains(id) {
            tracing::warn!(player_id = %id, "score increment for unknown player");
            return self.clone();
        }
        self.mapped(|p| {
            if p.id == id {
                Player {
                    score: p.score.saturating_add(1),
                    ..p.clone()
                }
            } else {
                p.clone()
            }
        })
    }

    fn mapped(&self, f: impl Fn(&Player) -> Player) -> Self {
        Self {
            list: Arc::new(self.list.iter().map(f).collect()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.list.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The current host, if any.
    pub fn host(&self) -> Option<&Player> {
        self.list.iter().find(|p| p.is_host)
    }

    /// Players in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.list.iter()
    }

    /// Player ids in join order.
    pub fn ids(&self) -> Vec<&str> {
        self.list.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns `true` if both values share the same underlying collection.
    pub fn same_collection(&self, other: &Players) -> bool {
        Arc::ptr_eq(&self.list, &other.list)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn lobby() -> Players {
        Players::initialised(vec![
            Player::new("a", "Alice"),
            Player::new("b", "Bob"),
            Player::new("c", "Carol"),
        ])
    }

    #[test]
    fn add_preserves_join_order() {
        let players = lobby().added(Player::new("d", "Dave"));
        assert_eq!(players.ids(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let players = lobby();
        let again = players.added(Player::new("b", "Impostor"));
        assert_eq!(again.ids(), vec!["a", "b", "c"]);
        assert_eq!(again.get("b").unwrap().nickname, "Bob");
        assert!(again.same_collection(&players));
    }

    #[test]
    fn remove_absent_is_a_no_op() {
        let players = lobby();
        let after = players.removed("zzz");
        assert_eq!(after, players);
    }

    #[test]
    fn remove_drops_only_that_player() {
        let players = lobby().removed("b");
        assert_eq!(players.ids(), vec!["a", "c"]);
    }

    #[test]
    fn host_is_exclusive() {
        let players = lobby().with_host("a").with_host("c");
        assert_eq!(players.host().unwrap().id, "c");
        assert_eq!(players.iter().filter(|p| p.is_host).count(), 1);
    }

    #[test]
    fn unknown_host_demotes_everyone() {
        let players = lobby().with_host("a").with_host("ghost");
        assert!(players.host().is_none());
    }

    #[test]
    fn added_player_cannot_declare_itself_host() {
        let mut p = Player::new("d", "Dave");
        p.is_host = true;
        let players = lobby().with_host("a").added(p);
        assert_eq!(players.host().unwrap().id, "a");
    }

    #[test]
    fn initial_collection_keeps_a_single_host() {
        let mut a = Player::new("a", "Alice");
        a.is_host = true;
        let mut b = Player::new("b", "Bob");
        b.is_host = true;
        let players = Players::initialised(vec![a, b, Player::new("a", "Dup")]);
        assert_eq!(players.len(), 2);
        assert_eq!(players.host().unwrap().id, "a");
        assert!(!players.get("b").unwrap().is_host);
    }

    #[test]
    fn point_goes_to_one_player() {
        let players = lobby().with_point_for("b").with_point_for("b");
        assert_eq!(players.get("b").unwrap().score, 2);
        assert_eq!(players.get("a").unwrap().score, 0);
    }

    #[test]
    fn every_mutation_allocates_a_new_collection() {
        let players = lobby();
        assert!(!players.added(Player::new("d", "D")).same_collection(&players));
        assert!(!players.removed("a").same_collection(&players));
        assert!(!players.with_host("a").same_collection(&players));
        assert!(!players.with_point_for("a").same_collection(&players));
    }
}
