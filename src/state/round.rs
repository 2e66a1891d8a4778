//! The Round store.

use std::sync::Arc;

/// The winner of a round and the punchlines that won it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub player_id: String,
    pub punchlines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RoundData {
    number: u32,
    setup: String,
    players_chosen_count: u32,
    chosen_punchlines: Vec<String>,
    winner: Option<Winner>,
}

/// State of the current round.
///
/// Every `round:number` starts a new round, even when the number repeats: the
/// chosen count drops back to zero and the chosen punchlines and winner are
/// cleared. The setup text is left alone since the server may send it before
/// or after the number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Round {
    data: Arc<RoundData>,
}

impl Round {
    fn with_data(&self, f: impl FnOnce(&mut RoundData)) -> Self {
        let mut data = RoundData::clone(&self.data);
        f(&mut data);
        Self {
            data: Arc::new(data),
        }
    }

    #[must_use]
    pub fn with_number(&self, number: u32) -> Self {
        self.with_data(|d| {
            d.number = number;
            d.players_chosen_count = 0;
            d.chosen_punchlines.clear();
            d.winner = None;
        })
    }

    #[must_use]
    pub fn with_setup(&self, setup: impl Into<String>) -> Self {
        let setup = setup.into();
        self.with_data(|d| d.setup = setup)
    }

    /// One more player has submitted their punchlines.
    #[must_use]
    pub fn with_player_chosen(&self) -> Self {
        self.with_data(|d| d.players_chosen_count = d.players_chosen_count.saturating_add(1))
    }

    #[must_use]
    pub fn with_chosen_punchlines(&self, punchlines: Vec<String>) -> Self {
        self.with_data(|d| d.chosen_punchlines = punchlines)
    }

    /// Record the round winner, replacing any earlier one.
    #[must_use]
    pub fn with_winner(&self, player_id: impl Into<String>, punchlines: Vec<String>) -> Self {
        let winner = Winner {
            player_id: player_id.into(),
            punchlines,
        };
        self.with_data(|d| d.winner = Some(winner))
    }

    pub fn number(&self) -> u32 {
        self.data.number
    }

    pub fn setup(&self) -> &str {
        &self.data.setup
    }

    pub fn players_chosen_count(&self) -> u32 {
        self.data.players_chosen_count
    }

    pub fn chosen_punchlines(&self) -> &[String] {
        &self.data.chosen_punchlines
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.data.winner.as_ref()
    }

    /// Returns `true` if both values share the same underlying data.
    pub fn same_data(&self, other: &Round) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}
