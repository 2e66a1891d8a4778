#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Tests for the validate-game and create-player calls.
//!
//! The `MockBackend` from `tests/common` stands in for the HTTP server and
//! records every request it receives.

mod common;

use punchline_client::api::{
    CREATE_PLAYER_PATH, INVALID_GAME_CODE_MESSAGE, SERVER_ERROR_MESSAGE, UNKNOWN_ERROR_MESSAGE,
    VALIDATE_GAME_PATH,
};
use punchline_client::{ApiResponse, GameApi, Identity};

use common::{MockBackend, RecordedCall};

fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// validate_game
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn validate_rejects_non_numeric_codes_locally() {
    let api = GameApi::new(MockBackend::new());

    let response = api.validate_game("abc12").await;
    assert_eq!(
        response,
        ApiResponse::Failure {
            status: 400,
            error: INVALID_GAME_CODE_MESSAGE.into()
        }
    );
    assert!(api.backend().calls().is_empty());
}

#[tokio::test]
async fn validate_accepts_no_content() {
    let backend = MockBackend::new();
    backend.reply(204, "");
    let api = GameApi::new(backend);

    let response = api.validate_game("12345").await;
    assert_eq!(
        response,
        ApiResponse::Success {
            status: 204,
            data: ()
        }
    );
    assert_eq!(
        api.backend().calls(),
        vec![RecordedCall {
            method: "GET",
            path: VALIDATE_GAME_PATH.into(),
            query: query(&[("gameCode", "12345")]),
        }]
    );
}

#[tokio::test]
async fn validate_passes_the_error_body_through() {
    let backend = MockBackend::new();
    backend.reply(404, "{}");
    let api = GameApi::new(backend);

    let response = api.validate_game("12345").await;
    assert_eq!(
        response,
        ApiResponse::Failure {
            status: 404,
            error: "{}".into()
        }
    );
}

#[tokio::test]
async fn validate_without_response_is_a_server_error() {
    let backend = MockBackend::new();
    backend.fail();
    let api = GameApi::new(backend);

    let response = api.validate_game("12345").await;
    assert_eq!(response.status(), 500);
    assert_eq!(response.error(), Some(SERVER_ERROR_MESSAGE));
}

#[tokio::test]
async fn validate_hides_server_error_pages() {
    let backend = MockBackend::new();
    backend.reply(503, "upstream unavailable");
    let api = GameApi::new(backend);

    let response = api.validate_game("12345").await;
    assert_eq!(response.status(), 503);
    assert_eq!(response.error(), Some(SERVER_ERROR_MESSAGE));
}

#[tokio::test]
async fn validate_treats_other_success_codes_as_failure() {
    let backend = MockBackend::new();
    backend.reply(200, "ok");
    let api = GameApi::new(backend);

    let response = api.validate_game("12345").await;
    assert!(!response.is_success());
    assert_eq!(response.error(), Some("ok"));
}

// ════════════════════════════════════════════════════════════════════
// create_player
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn create_returns_the_new_identity() {
    let backend = MockBackend::new();
    backend.reply(201, r#"{"playerId":"p1","token":"t1"}"#);
    let api = GameApi::new(backend);

    let response = api.create_player("12345", "Alice").await;
    assert_eq!(
        response,
        ApiResponse::Success {
            status: 201,
            data: Identity::new("p1", "t1")
        }
    );
    assert_eq!(
        api.backend().calls(),
        vec![RecordedCall {
            method: "POST",
            path: CREATE_PLAYER_PATH.into(),
            query: query(&[("gameCode", "12345"), ("nickname", "Alice")]),
        }]
    );
}

#[tokio::test]
async fn create_passes_validation_errors_through() {
    let backend = MockBackend::new();
    backend.reply(400, "Nickname must be between 1 and 20 characters");
    let api = GameApi::new(backend);

    let response = api.create_player("12345", "").await;
    assert_eq!(
        response,
        ApiResponse::Failure {
            status: 400,
            error: "Nickname must be between 1 and 20 characters".into()
        }
    );
}

#[tokio::test]
async fn create_without_response_is_a_server_error() {
    let backend = MockBackend::new();
    backend.fail();
    let api = GameApi::new(backend);

    let response = api.create_player("12345", "Alice").await;
    assert_eq!(
        response,
        ApiResponse::Failure {
            status: 500,
            error: SERVER_ERROR_MESSAGE.into()
        }
    );
}

#[tokio::test]
async fn create_hides_bad_gateway_body() {
    let backend = MockBackend::new();
    backend.reply(502, "<html>Bad Gateway</html>");
    let api = GameApi::new(backend);

    let response = api.create_player("12345", "Alice").await;
    assert_eq!(
        response,
        ApiResponse::Failure {
            status: 502,
            error: SERVER_ERROR_MESSAGE.into()
        }
    );
}

#[tokio::test]
async fn create_with_incomplete_identity_is_unknown_error() {
    let backend = MockBackend::new();
    backend.reply(201, r#"{"playerId":"p1"}"#);
    let api = GameApi::new(backend);

    let response = api.create_player("12345", "Alice").await;
    assert_eq!(response.error(), Some(UNKNOWN_ERROR_MESSAGE));
}
