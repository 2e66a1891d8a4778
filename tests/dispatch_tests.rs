#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Event application tests that drive the dispatcher directly.
//!
//! These run whole event sequences through `deliver` with the standard
//! handler table and check the resulting state, without a session loop.

mod common;

use std::sync::Arc;

use punchline_client::dispatcher::{deliver, Delivery};
use punchline_client::protocol::{EventFrame, EventKind, ServerEvent};
use punchline_client::{
    Dispatcher, GameState, Identity, IdentityStore, JsonFileStore, KeyValueStore, Listeners,
    MemoryStore, Page, Settings,
};

use common::{frame_json, player};
use serde_json::json;

fn mounted() -> (GameState, Dispatcher, Listeners) {
    let state = GameState::new(
        Settings::default(),
        IdentityStore::new(Arc::new(MemoryStore::new())),
    );
    let mut listeners = Listeners::new();
    let mut dispatcher = Dispatcher::default();
    dispatcher.mount(&mut listeners);
    (state, dispatcher, listeners)
}

fn apply(listeners: &Listeners, state: &mut GameState, event: ServerEvent) {
    let delivery = deliver(listeners, event.to_frame().unwrap(), state).unwrap();
    assert!(matches!(delivery, Delivery::Applied { handlers: 1, .. }));
}

/// Small deterministic generator so sequences are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

// ════════════════════════════════════════════════════════════════════
// Players
// ════════════════════════════════════════════════════════════════════

#[test]
fn player_add_remove_sequences_match_a_model() {
    for seed in 0..20 {
        let (mut state, _dispatcher, listeners) = mounted();
        let mut rng = Lcg(seed);
        let mut model: Vec<String> = Vec::new();

        for _ in 0..200 {
            let id = format!("p{}", rng.next(8));
            if rng.next(2) == 0 {
                apply(
                    &listeners,
                    &mut state,
                    ServerEvent::PlayersAdd(player(&id, "nick")),
                );
                if !model.contains(&id) {
                    model.push(id);
                }
            } else {
                apply(&listeners, &mut state, ServerEvent::PlayersRemove(id.clone()));
                model.retain(|m| *m != id);
            }
        }

        let ids: Vec<String> = state.players.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, model, "seed {seed}");
    }
}

#[test]
fn host_moves_and_unknown_host_demotes_everyone() {
    let (mut state, _dispatcher, listeners) = mounted();
    apply(
        &listeners,
        &mut state,
        ServerEvent::PlayersInitial(vec![player("p1", "Alice"), player("p2", "Bob")]),
    );

    apply(&listeners, &mut state, ServerEvent::Host("p1".into()));
    assert_eq!(state.players.host().map(|p| p.id.as_str()), Some("p1"));

    apply(&listeners, &mut state, ServerEvent::Host("p2".into()));
    assert_eq!(state.players.host().map(|p| p.id.as_str()), Some("p2"));
    assert_eq!(state.players.iter().filter(|p| p.is_host).count(), 1);

    apply(&listeners, &mut state, ServerEvent::Host("ghost".into()));
    assert!(state.players.host().is_none());
}

// ════════════════════════════════════════════════════════════════════
// Rounds
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_server_winner_is_scored() {
    let (mut state, _dispatcher, listeners) = mounted();
    apply(
        &listeners,
        &mut state,
        ServerEvent::PlayersInitial(vec![player("p1", "Alice"), player("p2", "Bob")]),
    );

    // A new game can reuse round number 1.
    for (setup, winner) in [("s1", "p1"), ("s2", "p2")] {
        apply(&listeners, &mut state, ServerEvent::RoundNumber(1));
        assert!(state.round.winner().is_none());
        apply(&listeners, &mut state, ServerEvent::RoundSetup(setup.into()));
        apply(
            &listeners,
            &mut state,
            ServerEvent::RoundWinner(winner.into(), vec![setup.into()]),
        );
    }
    assert_eq!(state.round.setup(), "s2");
    assert_eq!(state.round.winner().map(|w| w.player_id.as_str()), Some("p2"));
    assert_eq!(state.players.get("p1").map(|p| p.score), Some(1));
    assert_eq!(state.players.get("p2").map(|p| p.score), Some(1));

    apply(&listeners, &mut state, ServerEvent::RoundNumber(2));
    assert!(state.round.winner().is_none());
    apply(
        &listeners,
        &mut state,
        ServerEvent::RoundWinner("p2".into(), vec!["c".into()]),
    );
    assert_eq!(state.players.get("p2").map(|p| p.score), Some(2));
}

#[test]
fn full_round_walks_through_every_page() {
    let (mut state, _dispatcher, listeners) = mounted();
    let script = vec![
        ServerEvent::PlayersInitial(vec![player("p1", "Alice"), player("p2", "Bob")]),
        ServerEvent::Navigate("/LOBBY".into()),
        ServerEvent::Host("p1".into()),
        ServerEvent::RoundNumber(1),
        ServerEvent::RoundSetup("Why did the chicken cross the road?".into()),
        ServerEvent::Navigate("/BEFORE".into()),
        ServerEvent::PunchlinesAdd(vec!["a".into(), "b".into(), "c".into()]),
        ServerEvent::Navigate("/PLAYERS_CHOOSE".into()),
        ServerEvent::PunchlinesRemove(vec!["b".into()]),
        ServerEvent::RoundIncrementPlayersChosen,
        ServerEvent::Navigate("/HOST_CHOOSES".into()),
        ServerEvent::RoundChosenPunchlines(vec!["b".into()]),
        ServerEvent::RoundWinner("p2".into(), vec!["b".into()]),
        ServerEvent::Navigate("/AFTER".into()),
    ];
    for event in script {
        apply(&listeners, &mut state, event);
    }

    assert_eq!(state.navigator.current(), Page::After);
    assert_eq!(state.round.number(), 1);
    assert_eq!(state.round.setup(), "Why did the chicken cross the road?");
    assert_eq!(state.round.players_chosen_count(), 1);
    assert_eq!(state.round.chosen_punchlines(), ["b".to_string()]);
    assert_eq!(state.hand.iter().collect::<Vec<_>>(), vec!["a", "c"]);
    assert_eq!(state.players.get("p2").map(|p| p.score), Some(1));

    apply(
        &listeners,
        &mut state,
        ServerEvent::Navigate("/SCOREBOARD".into()),
    );
    assert_eq!(state.navigator.current(), Page::Scoreboard);
}

// ════════════════════════════════════════════════════════════════════
// Settings and bindings
// ════════════════════════════════════════════════════════════════════

#[test]
fn settings_update_changes_only_the_named_setting() {
    let (mut state, _dispatcher, listeners) = mounted();
    apply(
        &listeners,
        &mut state,
        ServerEvent::SettingsInitial(Settings {
            round_limit: 69,
            max_players: 40,
        }),
    );
    apply(
        &listeners,
        &mut state,
        ServerEvent::SettingsUpdate("ROUND_LIMIT".into(), 10),
    );
    assert_eq!(
        state.settings,
        Settings {
            round_limit: 10,
            max_players: 40
        }
    );

    apply(
        &listeners,
        &mut state,
        ServerEvent::SettingsUpdate("NOT_A_SETTING".into(), 3),
    );
    assert_eq!(state.settings.round_limit, 10);
    assert_eq!(state.settings.max_players, 40);
}

#[test]
fn unrecognized_setting_with_text_value_is_ignored() {
    let (mut state, _dispatcher, listeners) = mounted();
    let frame: EventFrame =
        serde_json::from_str(&frame_json("settings:update", json!(["THEME", "dark"]))).unwrap();
    let delivery = deliver(&listeners, frame, &mut state).unwrap();
    assert!(matches!(delivery, Delivery::Applied { handlers: 1, .. }));
    assert_eq!(state.settings, Settings::default());
}

#[test]
fn repeated_mounts_keep_one_listener_per_event() {
    let (mut state, mut dispatcher, mut listeners) = mounted();
    for _ in 0..10 {
        let rebind = dispatcher.mount(&mut listeners);
        assert_eq!(rebind.attached, 0);
        assert_eq!(rebind.detached, 0);
    }
    for kind in EventKind::ALL {
        assert_eq!(listeners.count(kind), 1, "{kind}");
    }

    apply(&listeners, &mut state, ServerEvent::RoundIncrementPlayersChosen);
    assert_eq!(state.round.players_chosen_count(), 1);

    dispatcher.unmount(&mut listeners);
    assert_eq!(listeners.total(), 0);
}

// ════════════════════════════════════════════════════════════════════
// Identity persistence
// ════════════════════════════════════════════════════════════════════

#[test]
fn credentials_survive_a_restart() {
    let dir = std::env::temp_dir().join(format!("punchline-restart-{}", std::process::id()));
    let path = dir.join("identity.json");
    let _ = std::fs::remove_dir_all(&dir);

    {
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        IdentityStore::new(store)
            .set(&Identity::new("p1", "t1"))
            .unwrap();
    }

    let store = Arc::new(JsonFileStore::open(&path).unwrap());
    assert_eq!(store.get("playerId"), "p1");
    let identity = IdentityStore::new(store);
    assert_eq!(identity.current(), Identity::new("p1", "t1"));

    identity.clear().unwrap();
    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get("token"), "");
    assert_eq!(reopened.get("playerId"), "");

    let _ = std::fs::remove_dir_all(&dir);
}
