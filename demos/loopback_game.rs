//! # Loopback Game Demo
//!
//! Plays one scripted round of Punchline against an in-process server:
//!
//! 1. Validate the game code and create a player over a fake HTTP backend
//! 2. Connect through a loopback [`Connector`] (no network involved)
//! 3. Follow the lobby, round and scoreboard events as snapshots arrive
//! 4. Submit a punchline when the round asks for one
//! 5. Shut down gracefully on the scoreboard or on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_game
//!
//! # Show every applied event:
//! RUST_LOG=punchline_client=debug cargo run --example loopback_game
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use punchline_client::api::HttpReply;
use punchline_client::protocol::{ClientFrame, Handshake, ServerEvent};
use punchline_client::{
    Connector, GameApi, GameSession, HttpBackend, MemoryStore, Page, Player, SessionConfig,
    Settings, SyncError, Transport,
};
use serde_json::json;
use tokio::sync::mpsc;

const GAME_CODE: &str = "12345";

// ── Loopback transport ──────────────────────────────────────────────

/// One side of an in-memory frame pipe.
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

fn pipe() -> (LoopbackTransport, LoopbackTransport) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport { tx: a_tx, rx: b_rx },
        LoopbackTransport { tx: b_tx, rx: a_rx },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), SyncError> {
        self.tx.send(message).map_err(|_| SyncError::TransportClosed)
    }

    async fn recv(&mut self) -> Option<Result<String, SyncError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        self.rx.close();
        Ok(())
    }
}

/// Connects every session to a freshly spawned [`fake_server`].
struct LoopbackConnector;

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Transport>, SyncError> {
        let (mut client, server) = pipe();
        client
            .send(serde_json::to_string(&ClientFrame::auth(handshake)?)?)
            .await?;
        tokio::spawn(fake_server(server));
        Ok(Box::new(client))
    }
}

// ── Fake HTTP backend ───────────────────────────────────────────────

struct LocalBackend;

#[async_trait]
impl HttpBackend for LocalBackend {
    async fn get(&self, _path: &str, _query: &[(&str, &str)]) -> Result<HttpReply, SyncError> {
        Ok(HttpReply {
            status: 204,
            body: String::new(),
        })
    }

    async fn post(&self, _path: &str, _query: &[(&str, &str)]) -> Result<HttpReply, SyncError> {
        Ok(HttpReply {
            status: 201,
            body: json!({ "playerId": "p1", "token": "demo-token" }).to_string(),
        })
    }
}

// ── Fake server ─────────────────────────────────────────────────────

async fn fake_server(mut conn: LoopbackTransport) {
    let Some(Ok(auth)) = conn.recv().await else {
        return;
    };
    tracing::info!("server: received {auth}");

    let host = Player {
        is_host: true,
        ..Player::new("p0", "Host")
    };
    let lobby = [
        ServerEvent::SettingsInitial(Settings {
            round_limit: 1,
            max_players: 8,
        }),
        ServerEvent::PlayersInitial(vec![host, Player::new("p1", "Demo")]),
        ServerEvent::Navigate("/LOBBY".into()),
        ServerEvent::RoundNumber(1),
        ServerEvent::RoundSetup("I never leave home without...".into()),
        ServerEvent::PunchlinesAdd(vec![
            "my emotional support cactus".into(),
            "a spare pair of opinions".into(),
        ]),
        ServerEvent::Navigate("/PLAYERS_CHOOSE".into()),
    ];
    for event in lobby {
        if !push(&mut conn, event).await {
            return;
        }
    }

    // Wait for the player's choice.
    let chosen = loop {
        match conn.recv().await {
            Some(Ok(text)) => {
                let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                    continue;
                };
                if frame.event == "punchlines:submit" {
                    let cards: Vec<String> = serde_json::from_value(frame.data).unwrap_or_default();
                    break cards;
                }
            }
            _ => return,
        }
    };

    let finale = [
        ServerEvent::PunchlinesRemove(chosen.clone()),
        ServerEvent::RoundIncrementPlayersChosen,
        ServerEvent::Navigate("/HOST_CHOOSES".into()),
        ServerEvent::RoundChosenPunchlines(chosen.clone()),
        ServerEvent::RoundWinner("p1".into(), chosen),
        ServerEvent::Navigate("/AFTER".into()),
        ServerEvent::Navigate("/SCOREBOARD".into()),
    ];
    for event in finale {
        if !push(&mut conn, event).await {
            return;
        }
    }
}

async fn push(conn: &mut LoopbackTransport, event: ServerEvent) -> bool {
    tokio::time::sleep(Duration::from_millis(150)).await;
    let Ok(json) = event.to_json() else {
        return false;
    };
    conn.send(json).await.is_ok()
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let api = GameApi::new(LocalBackend);
    let (mut session, mut snapshots) = GameSession::start(
        SessionConfig::new(GAME_CODE),
        LoopbackConnector,
        Arc::new(MemoryStore::new()),
    );

    let entered = session.enter(&api).await?;
    if !entered.is_success() {
        tracing::error!("game {GAME_CODE} not found: {:?}", entered.error());
        return Ok(());
    }
    let created = session.submit_nickname(&api, "Demo").await?;
    if let Some(error) = created.error() {
        tracing::error!("nickname rejected: {error}");
        return Ok(());
    }

    let mut submitted = false;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::info!("session ended");
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                tracing::info!(
                    page = %snap.page,
                    players = snap.players.len(),
                    round = snap.round.number(),
                    hand = snap.hand.len(),
                    connection = ?snap.connection,
                    "snapshot"
                );

                if snap.page == Page::PlayersChoose && !submitted {
                    if let Some(card) = snap.hand.iter().next() {
                        tracing::info!("submitting {card:?}");
                        session.emit("punchlines:submit", json!([card]))?;
                        submitted = true;
                    }
                }

                if snap.page == Page::Scoreboard {
                    for player in snap.players.iter() {
                        tracing::info!("{}: {} point(s)", player.nickname, player.score);
                    }
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
