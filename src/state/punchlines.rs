//! The local player's hand of punchlines.

use std::sync::Arc;

/// Punchlines currently held by the local player.
///
/// Behaves as a set that remembers the order cards were dealt in. Batches
/// are applied additively: adding a card already held and removing a card
/// not held are both silently skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PunchlineHand {
    cards: Arc<Vec<String>>,
}

impl PunchlineHand {
    #[must_use]
    pub fn added(&self, batch: Vec<String>) -> Self {
        let mut cards = Vec::clone(&self.cards);
        for card in batch {
            if !cards.contains(&card) {
                cards.push(card);
            }
        }
        Self {
            cards: Arc::new(cards),
        }
    }

    #[must_use]
    pub fn removed(&self, batch: &[String]) -> Self {
        Self {
            cards: Arc::new(
                self.cards
                    .iter()
                    .filter(|card| !batch.contains(card))
                    .cloned()
                    .collect(),
            ),
        }
    }

    pub fn contains(&self, card: &str) -> bool {
        self.cards.iter().any(|c| c == card)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn cards(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_skips_cards_already_held() {
        let hand = PunchlineHand::default()
            .added(cards(&["a", "b"]))
            .added(cards(&["b", "c", "c"]));
        assert_eq!(hand.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_tolerates_cards_not_held() {
        let hand = PunchlineHand::default()
            .added(cards(&["a", "b", "c"]))
            .removed(&cards(&["b", "zzz"]));
        assert_eq!(hand.iter().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(!hand.contains("b"));
    }

    #[test]
    fn removing_from_empty_hand_is_fine() {
        let hand = PunchlineHand::default().removed(&cards(&["a"]));
        assert!(hand.is_empty());
    }
}
