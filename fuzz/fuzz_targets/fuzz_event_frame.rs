#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use punchline_client::dispatcher::deliver;
use punchline_client::protocol::{EventFrame, ServerEvent};
use punchline_client::{Dispatcher, GameState, IdentityStore, Listeners, MemoryStore, Settings};

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<ServerEvent>(data);

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(frame) = EventFrame::parse(text) else {
        return;
    };

    // Any frame must either apply cleanly or be rejected without panicking.
    let mut state = GameState::new(
        Settings::default(),
        IdentityStore::new(Arc::new(MemoryStore::new())),
    );
    let mut listeners = Listeners::new();
    let mut dispatcher = Dispatcher::default();
    dispatcher.mount(&mut listeners);
    let _ = deliver(&listeners, frame, &mut state);
});
