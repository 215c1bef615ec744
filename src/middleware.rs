use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::client_ip::resolve_client_ip;
use crate::responses::{rate_limit_headers, too_many_requests};
use crate::state::AppState;

// Per-request throttle. Resolves the caller identity from proxy headers,
// counts the call against the configured window and rejects with the 429
// payload once the budget is gone. Successful responses carry the
// X-RateLimit-* headers so clients can pace themselves.
//
// /health and /metrics stay exempt so probes and scrapes never starve.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if path == "/health" || path == "/metrics" {
        return next.run(req).await;
    }

    let client = resolve_client_ip(req.headers());
    let result = state.limiter.check(&client, &state.limits);

    if !result.success {
        tracing::warn!(client, path, "request rejected by rate limit");
        return too_many_requests(&result, state.limits.limit, state.limiter.now_millis());
    }

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .extend(rate_limit_headers(&result, state.limits.limit));
    response
}
