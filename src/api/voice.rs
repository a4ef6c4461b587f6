//! Voice API endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use super::chat::ErrorResponse;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/synthesize", post(synthesize))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

/// Voice capabilities response
#[derive(Debug, Serialize)]
pub struct VoiceCapabilities {
    pub stt_available: bool,
    pub tts_available: bool,
}

async fn capabilities(State(state): State<Arc<ApiState>>) -> Json<VoiceCapabilities> {
    Json(VoiceCapabilities {
        stt_available: state.transcriber.is_some(),
        tts_available: state.synthesizer.is_some(),
    })
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe WAV audio to text
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, VoiceError> {
    let transcriber = state
        .transcriber
        .as_ref()
        .ok_or(VoiceError::NotConfigured("STT not configured (no API key)"))?;

    if body.is_empty() {
        return Err(VoiceError::BadRequest("Empty audio data"));
    }

    let text = transcriber
        .transcribe(&body)
        .await
        .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;

    Ok(Json(TranscribeResponse { text }))
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Synthesize text to speech, returning MP3
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, VoiceError> {
    let synthesizer = state
        .synthesizer
        .as_ref()
        .ok_or(VoiceError::NotConfigured("TTS not configured (no API key)"))?;

    if request.text.trim().is_empty() {
        return Err(VoiceError::BadRequest("Empty text"));
    }

    let audio = synthesizer
        .synthesize(&request.text)
        .await
        .map_err(|e| VoiceError::SynthesisFailed(e.to_string()))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    NotConfigured(&'static str),
    BadRequest(&'static str),
    TranscriptionFailed(String),
    SynthesisFailed(String),
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::TranscriptionFailed(msg) => {
                tracing::error!(error = %msg, "transcription failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Transcription failed: {msg}"))
            }
            Self::SynthesisFailed(msg) => {
                tracing::error!(error = %msg, "synthesis failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Synthesis failed: {msg}"))
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
