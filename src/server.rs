//! HTTP API: result submission and health check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::api::{Outcome, SendOutcome, SubmissionPayload};
use crate::chat_map::ChatStore;
use crate::telegram::{
    lose_message, win_message, MessageSender, OutgoingMessage, SendMessageError,
};

pub const INVALID_PAYLOAD: &str = "invalid_payload";
pub const CHAT_NOT_FOUND: &str = "chat_not_found";

#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<dyn ChatStore>,
    pub sender: Arc<dyn MessageSender>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

pub fn router(state: AppState) -> Router {
    // The game is served from arbitrary hosting, so the API answers any
    // origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/send", post(send))
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn send(
    State(state): State<AppState>,
    Json(payload): Json<SubmissionPayload>,
) -> (StatusCode, Json<SendOutcome>) {
    let (status, outcome) = handle_send(&state, payload).await;
    (status, Json(outcome))
}

fn chat_not_found_response() -> (StatusCode, SendOutcome) {
    (
        StatusCode::NOT_FOUND,
        SendOutcome {
            ok: false,
            error: Some(CHAT_NOT_FOUND.to_string()),
            reason: Some(CHAT_NOT_FOUND.to_string()),
        },
    )
}

/// Core of `POST /api/send`, separated from the axum plumbing so tests can
/// drive it directly.
pub async fn handle_send(
    state: &AppState,
    payload: SubmissionPayload,
) -> (StatusCode, SendOutcome) {
    match payload.status {
        Outcome::Win => {
            let code = payload.code.as_deref().filter(|c| !c.is_empty());
            let username = payload.username.as_deref().filter(|u| !u.is_empty());
            let (Some(code), Some(username)) = (code, username) else {
                return (
                    StatusCode::BAD_REQUEST,
                    SendOutcome::failure(INVALID_PAYLOAD),
                );
            };

            let Some(chat_id) = state.chats.resolve(username) else {
                info!("no chat registered for @{username}");
                return chat_not_found_response();
            };

            let message = OutgoingMessage::markdown(chat_id, win_message(code));
            match state.sender.send_message(&message).await {
                Ok(()) => {
                    info!("promo code delivered to @{username} (chat {chat_id})");
                    (StatusCode::OK, SendOutcome::success())
                }
                Err(SendMessageError::ChatNotFound) => chat_not_found_response(),
                Err(e) => {
                    error!("failed to deliver promo code to chat {chat_id}: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        SendOutcome::failure(e.to_string()),
                    )
                }
            }
        }
        Outcome::Lose => {
            // Consolation delivery is best effort: failures are logged and
            // the response stays successful.
            if let Some(username) = payload.username.as_deref().filter(|u| !u.is_empty()) {
                if let Some(chat_id) = state.chats.resolve(username) {
                    let message = OutgoingMessage::plain(chat_id, lose_message());
                    if let Err(e) = state.sender.send_message(&message).await {
                        warn!("consolation message to chat {chat_id} failed: {e}");
                    }
                }
            }
            (StatusCode::OK, SendOutcome::success())
        }
    }
}
