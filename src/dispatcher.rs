//! Event dispatch: server event name → exactly one state change.
//!
//! The pieces fit together like this:
//!
//! - [`Listeners`] is the connection's `on`/`off` surface. It will happily
//!   hold several handlers for one event, which is exactly what must never
//!   happen in practice.
//! - [`HandlerTable`] is the fixed mapping from every [`EventKind`] to the
//!   handler that applies it to [`GameState`].
//! - [`SubscriptionSet`] remembers which listeners a dispatcher attached.
//!   Binding a table diffs it against what is already attached and only
//!   swaps the entries that changed, so there is at most one active handler
//!   per event name however many times it is bound.
//! - [`Dispatcher`] ties a table to its subscription set and exposes
//!   mount/unmount.
//!
//! Frames are delivered with [`deliver`], one at a time, in receipt order.
//! Handlers decode their payload before touching state, so a malformed
//! payload fails the whole event with [`SyncError::MalformedEvent`] and
//! nothing is applied. Handler errors are not caught here.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::protocol::{EventFrame, EventKind};
use crate::state::{ConnectionStatus, GameState, Player, Players, SettingKey, Settings};

/// A bound event handler.
pub type Handler = Arc<dyn Fn(&mut GameState, Value) -> Result<()> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut GameState, Value) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Decode an event payload, tagging failures with the event name.
fn decode<T: DeserializeOwned>(kind: EventKind, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|source| SyncError::MalformedEvent {
        event: kind.as_str(),
        source,
    })
}

// ── Listeners ───────────────────────────────────────────────────────

/// Identifies one attached listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Handlers attached to a connection, per event.
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    by_event: HashMap<EventKind, Vec<(ListenerId, Handler)>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler. Existing handlers for the same event stay attached.
    pub fn on(&mut self, kind: EventKind, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_event.entry(kind).or_default().push((id, handler));
        id
    }

    /// Detach one handler. Returns `false` if it was not attached.
    pub fn off(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(list) = self.by_event.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(listener, _)| *listener != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_event.remove(&kind);
        }
        removed
    }

    /// Number of handlers attached for one event.
    pub fn count(&self, kind: EventKind) -> usize {
        self.by_event.get(&kind).map_or(0, Vec::len)
    }

    /// Number of handlers attached across all events.
    pub fn total(&self) -> usize {
        self.by_event.values().map(Vec::len).sum()
    }

    fn handlers(&self, kind: EventKind) -> impl Iterator<Item = &Handler> {
        self.by_event
            .get(&kind)
            .into_iter()
            .flat_map(|list| list.iter().map(|(_, handler)| handler))
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .by_event
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.len()))
            .collect();
        f.debug_struct("Listeners").field("counts", &counts).finish()
    }
}

// ── Handler table ───────────────────────────────────────────────────

/// Mapping from every event to the handler that applies it.
#[derive(Clone)]
pub struct HandlerTable {
    handlers: BTreeMap<EventKind, Handler>,
}

impl HandlerTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// The table every session uses.
    pub fn standard() -> Self {
        use EventKind as E;

        Self::empty()
            // Connection
            .with(
                E::Navigate,
                handler(|state, data| {
                    let path: String = decode(E::Navigate, data)?;
                    let page = state.navigator.push_path(&path.to_lowercase());
                    debug!(%page, "navigated");
                    Ok(())
                }),
            )
            .with(
                E::Host,
                handler(|state, data| {
                    let id: String = decode(E::Host, data)?;
                    state.players = state.players.with_host(&id);
                    Ok(())
                }),
            )
            .with(
                E::PlayersInitial,
                handler(|state, data| {
                    let players: Vec<Player> = decode(E::PlayersInitial, data)?;
                    state.players = Players::initialised(players);
                    Ok(())
                }),
            )
            .with(
                E::SettingsInitial,
                handler(|state, data| {
                    let incoming = decode::<Settings>(E::SettingsInitial, data)?;
                    state.settings = state.settings.replaced(incoming);
                    Ok(())
                }),
            )
            .with(
                E::ConnectError,
                handler(|state, data| {
                    let reason = match data {
                        Value::String(message) => Some(message),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    };
                    tracing::warn!(?reason, "connection rejected, clearing credentials");
                    state.identity.clear()?;
                    state.connection = ConnectionStatus::Disconnected { reason };
                    Ok(())
                }),
            )
            // Lobby
            .with(
                E::PlayersAdd,
                handler(|state, data| {
                    let player: Player = decode(E::PlayersAdd, data)?;
                    state.players = state.players.added(player);
                    Ok(())
                }),
            )
            .with(
                E::PlayersRemove,
                handler(|state, data| {
                    let id: String = decode(E::PlayersRemove, data)?;
                    state.players = state.players.removed(&id);
                    Ok(())
                }),
            )
            .with(
                E::SettingsUpdate,
                handler(|state, data| {
                    let (name, value): (String, Value) = decode(E::SettingsUpdate, data)?;
                    let Some(key) = SettingKey::from_wire(&name) else {
                        tracing::warn!(setting = %name, "ignoring update for unrecognized setting");
                        return Ok(());
                    };
                    let value: u32 = decode(E::SettingsUpdate, value)?;
                    state.settings = state.settings.with(key, value);
                    Ok(())
                }),
            )
            // Round
            .with(
                E::PunchlinesAdd,
                handler(|state, data| {
                    let batch: Vec<String> = decode(E::PunchlinesAdd, data)?;
                    state.hand = state.hand.added(batch);
                    Ok(())
                }),
            )
            .with(
                E::PunchlinesRemove,
                handler(|state, data| {
                    let batch: Vec<String> = decode(E::PunchlinesRemove, data)?;
                    state.hand = state.hand.removed(&batch);
                    Ok(())
                }),
            )
            .with(
                E::RoundNumber,
                handler(|state, data| {
                    let number: u32 = decode(E::RoundNumber, data)?;
                    state.round = state.round.with_number(number);
                    Ok(())
                }),
            )
            .with(
                E::RoundSetup,
                handler(|state, data| {
                    let setup: String = decode(E::RoundSetup, data)?;
                    state.round = state.round.with_setup(setup);
                    Ok(())
                }),
            )
            .with(
                E::RoundIncrementPlayersChosen,
                handler(|state, _data| {
                    state.round = state.round.with_player_chosen();
                    Ok(())
                }),
            )
            .with(
                E::RoundChosenPunchlines,
                handler(|state, data| {
                    let chosen: Vec<String> = decode(E::RoundChosenPunchlines, data)?;
                    state.round = state.round.with_chosen_punchlines(chosen);
                    Ok(())
                }),
            )
            .with(
                E::RoundWinner,
                handler(|state, data| {
                    let (player_id, punchlines): (String, Vec<String>) =
                        decode(E::RoundWinner, data)?;
                    state.declare_winner(&player_id, punchlines);
                    Ok(())
                }),
            )
    }

    /// Returns the table with the handler for `kind` replaced.
    #[must_use]
    pub fn with(mut self, kind: EventKind, handler: Handler) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn get(&self, kind: EventKind) -> Option<&Handler> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.keys().map(|kind| kind.as_str()))
            .finish()
    }
}

// ── Subscription set ────────────────────────────────────────────────

/// Outcome of binding a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rebind {
    /// Entries attached for the first time or swapped for a new handler.
    pub attached: usize,
    /// Entries detached (swapped out or no longer in the table).
    pub detached: usize,
    /// Entries already bound to the same handler.
    pub kept: usize,
}

/// The listeners one dispatcher has attached, at most one per event.
#[derive(Default)]
pub struct SubscriptionSet {
    bound: BTreeMap<EventKind, (ListenerId, Handler)>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the attached listeners match `table`.
    ///
    /// Entries bound to the same handler are left in place; changed entries
    /// are detached before their replacement is attached; entries missing
    /// from `table` are detached.
    pub fn bind(&mut self, listeners: &mut Listeners, table: &HandlerTable) -> Rebind {
        let mut stats = Rebind::default();

        let stale: Vec<EventKind> = self
            .bound
            .keys()
            .copied()
            .filter(|kind| table.get(*kind).is_none())
            .collect();
        for kind in stale {
            if let Some((id, _)) = self.bound.remove(&kind) {
                listeners.off(kind, id);
                stats.detached += 1;
            }
        }

        for (kind, wanted) in &table.handlers {
            match self.bound.get(kind) {
                Some((_, current)) if Arc::ptr_eq(current, wanted) => {
                    stats.kept += 1;
                    continue;
                }
                Some((id, _)) => {
                    listeners.off(*kind, *id);
                    stats.detached += 1;
                }
                None => {}
            }
            let id = listeners.on(*kind, Arc::clone(wanted));
            self.bound.insert(*kind, (id, Arc::clone(wanted)));
            stats.attached += 1;
        }

        debug!(?stats, "subscriptions bound");
        stats
    }

    /// Detach everything this set attached. Returns the number detached.
    pub fn unbind(&mut self, listeners: &mut Listeners) -> usize {
        let bound = std::mem::take(&mut self.bound);
        let count = bound.len();
        for (kind, (id, _)) in bound {
            listeners.off(kind, id);
        }
        debug!(count, "subscriptions unbound");
        count
    }

    pub fn is_bound(&self, kind: EventKind) -> bool {
        self.bound.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

impl std::fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.bound.keys().map(|kind| kind.as_str()))
            .finish()
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// A handler table plus the subscriptions it currently holds.
#[derive(Debug)]
pub struct Dispatcher {
    table: HandlerTable,
    subscriptions: SubscriptionSet,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(HandlerTable::standard())
    }
}

impl Dispatcher {
    pub fn new(table: HandlerTable) -> Self {
        Self {
            table,
            subscriptions: SubscriptionSet::new(),
        }
    }

    /// Bind the table. Mounting again while mounted is a no-op diff.
    pub fn mount(&mut self, listeners: &mut Listeners) -> Rebind {
        self.subscriptions.bind(listeners, &self.table)
    }

    /// Replace the table and rebind only the entries that differ.
    pub fn replace_table(&mut self, listeners: &mut Listeners, table: HandlerTable) -> Rebind {
        self.table = table;
        self.mount(listeners)
    }

    /// Detach every listener this dispatcher attached.
    pub fn unmount(&mut self, listeners: &mut Listeners) -> usize {
        self.subscriptions.unbind(listeners)
    }

    pub fn is_mounted(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }
}

/// What [`deliver`] did with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was applied by this many handlers.
    Applied { kind: EventKind, handlers: usize },
    /// Nobody listens for this event name.
    Unhandled { event: String },
}

/// Apply one frame to `state` through the attached listeners.
///
/// # Errors
///
/// Returns the first handler error, typically
/// [`SyncError::MalformedEvent`]. The caller must treat it as fatal.
pub fn deliver(listeners: &Listeners, frame: EventFrame, state: &mut GameState) -> Result<Delivery> {
    let Some(kind) = frame.kind() else {
        debug!(event = %frame.event, "ignoring unknown event");
        return Ok(Delivery::Unhandled { event: frame.event });
    };

    let mut handlers = 0;
    for listener in listeners.handlers(kind) {
        listener(state, frame.data.clone())?;
        handlers += 1;
    }

    if handlers == 0 {
        debug!(event = %kind, "no listener bound");
        return Ok(Delivery::Unhandled { event: frame.event });
    }
    Ok(Delivery::Applied { kind, handlers })
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
    use crate::identity::{Identity, IdentityStore};
    use crate::navigation::Page;
    use crate::protocol::ServerEvent;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn state() -> GameState {
        GameState::new(
            Settings::default(),
            IdentityStore::new(Arc::new(MemoryStore::new())),
        )
    }

    fn mounted() -> (Dispatcher, Listeners) {
        let mut listeners = Listeners::new();
        let mut dispatcher = Dispatcher::default();
        dispatcher.mount(&mut listeners);
        (dispatcher, listeners)
    }

    fn apply(listeners: &Listeners, state: &mut GameState, event: ServerEvent) -> Delivery {
        deliver(listeners, event.to_frame().unwrap(), state).unwrap()
    }

    #[test]
    fn standard_table_covers_every_event() {
        let table = HandlerTable::standard();
        for kind in EventKind::ALL {
            assert!(table.get(kind).is_some(), "no handler for {kind}");
        }
    }

    #[test]
    fn mount_binds_one_listener_per_event() {
        let (dispatcher, listeners) = mounted();
        assert_eq!(listeners.total(), EventKind::ALL.len());
        for kind in EventKind::ALL {
            assert_eq!(listeners.count(kind), 1);
            assert!(dispatcher.subscriptions().is_bound(kind));
        }
    }

    #[test]
    fn remount_is_a_no_op_diff() {
        let (mut dispatcher, mut listeners) = mounted();
        let stats = dispatcher.mount(&mut listeners);
        assert_eq!(stats.attached, 0);
        assert_eq!(stats.detached, 0);
        assert_eq!(stats.kept, EventKind::ALL.len());
    }

    #[test]
    fn replacing_one_handler_swaps_only_that_entry() {
        let (mut dispatcher, mut listeners) = mounted();
        let table = HandlerTable::standard().with(EventKind::Host, handler(|_, _| Ok(())));
        let stats = dispatcher.replace_table(&mut listeners, table);
        // A fresh standard table has fresh handlers, so every entry swaps.
        assert_eq!(stats.attached, EventKind::ALL.len());
        assert_eq!(listeners.count(EventKind::Host), 1);

        let same = HandlerTable::standard();
        let tweaked = same.clone().with(EventKind::Host, handler(|_, _| Ok(())));
        dispatcher.replace_table(&mut listeners, same);
        let stats = dispatcher.replace_table(&mut listeners, tweaked);
        assert_eq!(stats.attached, 1);
        assert_eq!(stats.detached, 1);
        assert_eq!(stats.kept, EventKind::ALL.len() - 1);
        assert_eq!(listeners.total(), EventKind::ALL.len());
    }

    #[test]
    fn entries_missing_from_table_are_detached() {
        let (mut dispatcher, mut listeners) = mounted();
        let stats = dispatcher.replace_table(&mut listeners, HandlerTable::empty());
        assert_eq!(stats.detached, EventKind::ALL.len());
        assert_eq!(listeners.total(), 0);
    }

    #[test]
    fn unmount_detaches_everything() {
        let (mut dispatcher, mut listeners) = mounted();
        assert_eq!(dispatcher.unmount(&mut listeners), EventKind::ALL.len());
        assert_eq!(listeners.total(), 0);
        assert!(!dispatcher.is_mounted());
    }

    #[test]
    fn unmounted_dispatcher_applies_nothing() {
        let (mut dispatcher, mut listeners) = mounted();
        dispatcher.unmount(&mut listeners);
        let mut state = state();
        let delivery = apply(&listeners, &mut state, ServerEvent::RoundIncrementPlayersChosen);
        assert!(matches!(delivery, Delivery::Unhandled { .. }));
        assert_eq!(state.round.players_chosen_count(), 0);
    }

    #[test]
    fn duplicate_listeners_would_double_apply() {
        // Without a subscription set, attaching twice double-counts.
        let mut listeners = Listeners::new();
        let table = HandlerTable::standard();
        let h = table.get(EventKind::RoundIncrementPlayersChosen).unwrap();
        listeners.on(EventKind::RoundIncrementPlayersChosen, Arc::clone(h));
        listeners.on(EventKind::RoundIncrementPlayersChosen, Arc::clone(h));
        let mut state = state();
        apply(&listeners, &mut state, ServerEvent::RoundIncrementPlayersChosen);
        assert_eq!(state.round.players_chosen_count(), 2);
    }

    #[test]
    fn navigate_lowercases_path() {
        let (_d, listeners) = mounted();
        let mut state = state();
        apply(&listeners, &mut state, ServerEvent::Navigate("/HOST_CHOOSES".into()));
        assert_eq!(state.navigator.current(), Page::HostChooses);
    }

    #[test]
    fn connect_error_clears_identity() {
        let (_d, listeners) = mounted();
        let mut state = state();
        state.identity.set(&Identity::new("p1", "t1")).unwrap();
        apply(&listeners, &mut state, ServerEvent::ConnectError("bad token".into()));
        assert_eq!(state.identity.player_id(), "");
        assert_eq!(state.identity.token(), "");
        assert_eq!(
            state.connection,
            ConnectionStatus::Disconnected {
                reason: Some("bad token".into())
            }
        );
    }

    #[test]
    fn connect_error_accepts_object_payload() {
        let (_d, listeners) = mounted();
        let mut state = state();
        let frame = EventFrame::new(EventKind::ConnectError, json!({"message": "nope"}));
        deliver(&listeners, frame, &mut state).unwrap();
        assert!(matches!(state.connection, ConnectionStatus::Disconnected { .. }));
    }

    #[test]
    fn settings_events_replace_and_update() {
        let (_d, listeners) = mounted();
        let mut state = state();
        apply(
            &listeners,
            &mut state,
            ServerEvent::SettingsInitial(Settings {
                round_limit: 5,
                max_players: 6,
            }),
        );
        apply(&listeners, &mut state, ServerEvent::SettingsUpdate("MAX_PLAYERS".into(), 12));
        apply(&listeners, &mut state, ServerEvent::SettingsUpdate("COLOUR".into(), 1));
        assert_eq!(
            state.settings,
            Settings {
                round_limit: 5,
                max_players: 12
            }
        );
    }

    #[test]
    fn unrecognized_setting_with_any_value_is_ignored() {
        let (_d, listeners) = mounted();
        let mut state = state();
        let frame = EventFrame::new(EventKind::SettingsUpdate, json!(["THEME", "dark"]));
        let delivery = deliver(&listeners, frame, &mut state).unwrap();
        assert!(matches!(delivery, Delivery::Applied { handlers: 1, .. }));
        assert_eq!(state.settings, Settings::default());
    }

    #[test]
    fn recognized_setting_with_non_integer_value_is_fatal() {
        let (_d, listeners) = mounted();
        let mut state = state();
        let frame = EventFrame::new(EventKind::SettingsUpdate, json!(["ROUND_LIMIT", "ten"]));
        let err = deliver(&listeners, frame, &mut state).unwrap_err();
        assert!(matches!(
            err,
            SyncError::MalformedEvent {
                event: "settings:update",
                ..
            }
        ));
        assert_eq!(state.settings, Settings::default());
    }

    #[test]
    fn zero_settings_from_the_server_are_ignored() {
        let (_d, listeners) = mounted();
        let mut state = state();
        apply(&listeners, &mut state, ServerEvent::SettingsUpdate("MAX_PLAYERS".into(), 0));
        apply(
            &listeners,
            &mut state,
            ServerEvent::SettingsInitial(Settings {
                round_limit: 0,
                max_players: 8,
            }),
        );
        assert_eq!(
            state.settings,
            Settings {
                round_limit: 69,
                max_players: 8
            }
        );
    }

    #[test]
    fn repeated_round_number_still_scores_the_next_winner() {
        let (_d, listeners) = mounted();
        let mut state = state();
        state.players = Players::initialised(vec![Player::new("p1", "Alice"), Player::new("p2", "Bob")]);
        for (setup, winner) in [("s1", "p1"), ("s2", "p2")] {
            apply(&listeners, &mut state, ServerEvent::RoundNumber(1));
            apply(&listeners, &mut state, ServerEvent::RoundSetup(setup.into()));
            apply(
                &listeners,
                &mut state,
                ServerEvent::RoundWinner(winner.into(), vec![]),
            );
        }
        assert_eq!(state.round.winner().map(|w| w.player_id.as_str()), Some("p2"));
        assert_eq!(state.players.get("p1").map(|p| p.score), Some(1));
        assert_eq!(state.players.get("p2").map(|p| p.score), Some(1));
    }

    #[test]
    fn punchline_batches_are_applied() {
        let (_d, listeners) = mounted();
        let mut state = state();
        apply(
            &listeners,
            &mut state,
            ServerEvent::PunchlinesAdd(vec!["a".into(), "b".into()]),
        );
        apply(
            &listeners,
            &mut state,
            ServerEvent::PunchlinesRemove(vec!["a".into(), "missing".into()]),
        );
        assert_eq!(state.hand.iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn malformed_payload_is_fatal_and_applies_nothing() {
        let (_d, listeners) = mounted();
        let mut state = state();
        let before = state.snapshot();
        let frame = EventFrame::new(EventKind::PlayersAdd, json!({"nickname": 7}));
        let err = deliver(&listeners, frame, &mut state).unwrap_err();
        assert!(matches!(
            err,
            SyncError::MalformedEvent {
                event: "players:add",
                ..
            }
        ));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn unknown_event_is_ignored() {
        let (_d, listeners) = mounted();
        let mut state = state();
        let frame = EventFrame {
            event: "round:confetti".into(),
            data: json!(true),
        };
        let delivery = deliver(&listeners, frame, &mut state).unwrap();
        assert_eq!(
            delivery,
            Delivery::Unhandled {
                event: "round:confetti".into()
            }
        );
    }
}
