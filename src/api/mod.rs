//! HTTP relay for the voice assistant
//!
//! Holds the vendor credential so clients never see it. Serves the chat
//! endpoint plus speech transcription and synthesis.

pub mod chat;
pub mod health;
pub mod rate_limit;
pub mod voice;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::completion::CompletionClient;
use crate::voice::{Synthesizer, Transcriber};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Answers delegated chat messages
    pub completion: Arc<dyn CompletionClient>,
    /// Present only when a vendor key is configured
    pub transcriber: Option<Arc<Transcriber>>,
    /// Present only when a vendor key is configured
    pub synthesizer: Option<Arc<Synthesizer>>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

impl ApiState {
    /// State with only a completion client
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            completion,
            transcriber: None,
            synthesizer: None,
            rate_limiter: None,
        }
    }
}

/// Build the relay router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let chat = chat::router(state.clone()).route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        rate_limit::rate_limit_middleware,
    ));

    let router = Router::new()
        .nest("/api/voice", voice::router(state))
        .merge(chat)
        .merge(health::router());

    // CORS layer for cross-origin requests from frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// Builder for [`ApiServer`]
pub struct ApiServerBuilder {
    completion: Arc<dyn CompletionClient>,
    port: u16,
    transcriber: Option<Arc<Transcriber>>,
    synthesizer: Option<Arc<Synthesizer>>,
    rate_limit_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionClient>, port: u16) -> Self {
        Self {
            completion,
            port,
            transcriber: None,
            synthesizer: None,
            rate_limit_per_minute: None,
        }
    }

    /// Enable `/api/voice/transcribe`
    #[must_use]
    pub fn transcriber(mut self, transcriber: Option<Transcriber>) -> Self {
        self.transcriber = transcriber.map(Arc::new);
        self
    }

    /// Enable `/api/voice/synthesize`
    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Option<Synthesizer>) -> Self {
        self.synthesizer = synthesizer.map(Arc::new);
        self
    }

    /// Limit chat requests per minute
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = ApiState {
            completion: self.completion,
            transcriber: self.transcriber,
            synthesizer: self.synthesizer,
            rate_limiter: self.rate_limit_per_minute.and_then(rate_limit::create_limiter),
        };

        ApiServer {
            state: Arc::new(state),
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            stt = self.state.transcriber.is_some(),
            tts = self.state.synthesizer.is_some(),
            rate_limited = self.state.rate_limiter.is_some(),
            "relay listening at http://localhost:{}",
            self.port
        );

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
