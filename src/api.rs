//! Request/response collaborators: validate-game and create-player.
//!
//! Neither call ever fails past its own boundary. Every outcome, including
//! a request that got no response at all, is folded into one
//! [`ApiResponse`] the caller can match on:
//!
//! | Outcome                        | Result                                               |
//! |--------------------------------|------------------------------------------------------|
//! | accepted status                | `Success { status, data }`                           |
//! | 5xx status                     | `Failure { status, "Server error, please try again." }` |
//! | any other status               | `Failure { status, error: <response body> }`         |
//! | no response                    | `Failure { 500, "Server error, please try again." }` |
//! | rejected locally (bad input)   | `Failure { 400, <reason> }`, no request sent         |
//!
//! HTTP itself goes through the [`HttpBackend`] port. [`ReqwestBackend`] is
//! the default implementation (feature `http-reqwest`).

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::Identity;

/// Path of the game-code validation endpoint.
pub const VALIDATE_GAME_PATH: &str = "/api/game/validate";

/// Path of the player creation endpoint.
pub const CREATE_PLAYER_PATH: &str = "/api/player/create";

/// Shown for a 5xx response or a request that produced no response.
pub const SERVER_ERROR_MESSAGE: &str = "Server error, please try again.";

/// Shown when a success response carries an unreadable body.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error, please try again";

/// Shown when the game code is not all digits.
pub const INVALID_GAME_CODE_MESSAGE: &str = "Game code must be a number";

const NO_CONTENT_204: u16 = 204;
const CREATED_201: u16 = 201;
const BAD_REQUEST_400: u16 = 400;
const SERVER_ERROR_500: u16 = 500;

/// A response as seen by the backend: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Minimal HTTP port used by [`GameApi`].
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status, and `Err` only when no response arrived.
#[async_trait]
pub trait HttpBackend: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns [`SyncError::Request`](crate::SyncError::Request) if no
    /// response was received.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<HttpReply>;

    /// # Errors
    ///
    /// Returns [`SyncError::Request`](crate::SyncError::Request) if no
    /// response was received.
    async fn post(&self, path: &str, query: &[(&str, &str)]) -> Result<HttpReply>;
}

/// Normalized outcome of a request/response call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse<T> {
    Success { status: u16, data: T },
    Failure { status: u16, error: String },
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }

    pub fn status(&self) -> u16 {
        match self {
            ApiResponse::Success { status, .. } | ApiResponse::Failure { status, .. } => *status,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiResponse::Success { data, .. } => Some(data),
            ApiResponse::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ApiResponse::Success { .. } => None,
            ApiResponse::Failure { error, .. } => Some(error),
        }
    }

    fn failure(status: u16, error: impl Into<String>) -> Self {
        ApiResponse::Failure {
            status,
            error: error.into(),
        }
    }
}

/// Fold a backend outcome into an [`ApiResponse`].
fn normalize<T>(
    outcome: Result<HttpReply>,
    accepted: &[u16],
    parse: impl FnOnce(&str) -> Option<T>,
) -> ApiResponse<T> {
    match outcome {
        Ok(reply) if accepted.contains(&reply.status) => match parse(&reply.body) {
            Some(data) => ApiResponse::Success {
                status: reply.status,
                data,
            },
            None => {
                tracing::warn!(status = reply.status, "unreadable success body");
                ApiResponse::failure(reply.status, UNKNOWN_ERROR_MESSAGE)
            }
        },
        Ok(reply) if reply.status >= SERVER_ERROR_500 => {
            tracing::warn!(status = reply.status, "server error response");
            ApiResponse::failure(reply.status, SERVER_ERROR_MESSAGE)
        }
        Ok(reply) => {
            tracing::debug!(status = reply.status, "request rejected");
            ApiResponse::failure(reply.status, reply.body)
        }
        Err(e) => {
            tracing::error!("request failed without a response: {e}");
            ApiResponse::failure(SERVER_ERROR_500, SERVER_ERROR_MESSAGE)
        }
    }
}

/// Game codes are non-empty runs of ASCII digits.
pub fn is_valid_game_code(game_code: &str) -> bool {
    !game_code.is_empty() && game_code.bytes().all(|b| b.is_ascii_digit())
}

/// Client for the game's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct GameApi<B> {
    backend: B,
}

impl<B: HttpBackend> GameApi<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Check that a game with this code exists.
    ///
    /// Codes that are not all digits are rejected without a request.
    pub async fn validate_game(&self, game_code: &str) -> ApiResponse<()> {
        if !is_valid_game_code(game_code) {
            return ApiResponse::failure(BAD_REQUEST_400, INVALID_GAME_CODE_MESSAGE);
        }
        let outcome = self
            .backend
            .get(VALIDATE_GAME_PATH, &[("gameCode", game_code)])
            .await;
        normalize(outcome, &[NO_CONTENT_204], |_| Some(()))
    }

    /// Register a player in a game and obtain reconnection credentials.
    pub async fn create_player(&self, game_code: &str, nickname: &str) -> ApiResponse<Identity> {
        let outcome = self
            .backend
            .post(
                CREATE_PLAYER_PATH,
                &[("gameCode", game_code), ("nickname", nickname)],
            )
            .await;
        normalize(outcome, &[CREATED_201], |body| {
            serde_json::from_str::<Identity>(body)
                .ok()
                .filter(Identity::is_complete)
        })
    }
}

#[cfg(feature = "http-reqwest")]
pub use self::reqwest_backend::ReqwestBackend;

#[cfg(feature = "http-reqwest")]
mod reqwest_backend {
    use async_trait::async_trait;

    use super::{HttpBackend, HttpReply};
    use crate::error::{Result, SyncError};

    /// [`HttpBackend`] over a shared `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestBackend {
        base_url: String,
        client: reqwest::Client,
    }

    impl ReqwestBackend {
        /// Backend for the server at `base_url`, e.g. `http://localhost:5000`.
        pub fn new(base_url: impl Into<String>) -> Self {
            Self::with_client(base_url, reqwest::Client::new())
        }

        pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
            let base_url = base_url.into().trim_end_matches('/').to_string();
            Self { base_url, client }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }

        async fn finish(request: reqwest::RequestBuilder) -> Result<HttpReply> {
            let response = request
                .send()
                .await
                .map_err(|e| SyncError::Request(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| SyncError::Request(e.to_string()))?;
            Ok(HttpReply { status, body })
        }
    }

    #[async_trait]
    impl HttpBackend for ReqwestBackend {
        async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<HttpReply> {
            Self::finish(self.client.get(self.url(path)).query(query)).await
        }

        async fn post(&self, path: &str, query: &[(&str, &str)]) -> Result<HttpReply> {
            Self::finish(self.client.post(self.url(path)).query(query)).await
        }
    }
}
