use axum::Json;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::clock::ceil_secs;
use crate::rate_limit::RateLimitResult;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

// Body of the 429 response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TooManyRequestsBody {
    pub error: &'static str,
    pub message: &'static str,
    pub retry_after: i64,
}

// X-RateLimit-Limit / -Remaining / -Reset for a check result.
// Reset is epoch seconds, floored from the millisecond timestamp.
pub fn rate_limit_headers(result: &RateLimitResult, limit: u32) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(result.reset_at.div_euclid(1000)),
    );
    headers
}

// Ready-to-send 429 for a failed check. retryAfter rounds the time to the
// window reset up to whole seconds.
pub fn too_many_requests(result: &RateLimitResult, limit: u32, now_millis: i64) -> Response {
    let body = TooManyRequestsBody {
        error: "Too many requests",
        message: "Rate limit exceeded. Please try again later.",
        retry_after: ceil_secs(result.reset_at - now_millis),
    };
    (
        StatusCode::TOO_MANY_REQUESTS,
        rate_limit_headers(result, limit),
        Json(body),
    )
        .into_response()
}
