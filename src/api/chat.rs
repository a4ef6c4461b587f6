//! Chat endpoint
//!
//! Local intents are answered without touching the vendor; everything else
//! is forwarded to the completion client.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::completion::{CompletionError, CompletionReply};
use crate::intent;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .with_state(state)
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Flat error body: `{"error": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<CompletionReply>, ChatError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected chat body");
        ChatError::NoMessage
    })?;

    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or(ChatError::NoMessage)?;

    if let Some(reply) = CompletionReply::from_intent(intent::classify(&message)) {
        tracing::debug!(response = %reply.response, "answered locally");
        return Ok(Json(reply));
    }

    let reply = state.completion.complete(&message).await.map_err(|e| {
        tracing::error!(error = %e, "completion failed");
        ChatError::Upstream(e)
    })?;

    Ok(Json(reply))
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    NoMessage,
    Upstream(CompletionError),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::NoMessage => (StatusCode::BAD_REQUEST, "No message provided".to_string()),
            Self::Upstream(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server error: {e}"),
            ),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
