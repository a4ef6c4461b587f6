//! Rate limiting for the chat endpoint

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};

use super::ApiState;
use super::chat::ErrorResponse;

/// Global rate limiter
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a rate limiter with the given requests-per-minute burst capacity
///
/// Returns `None` for zero; there is no limiter that admits nothing.
#[must_use]
pub fn create_limiter(requests_per_minute: u32) -> Option<SharedLimiter> {
    let rpm = NonZeroU32::new(requests_per_minute)?;
    Some(Arc::new(RateLimiter::direct(Quota::per_minute(rpm))))
}

/// Rate limiting middleware (only active when limiter is configured)
pub async fn rate_limit_middleware(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(ref limiter) = state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    error: "Too many requests".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(req).await
}
