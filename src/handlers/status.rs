use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::state::AppState;

// Limiter introspection: store occupancy and sweep timer state
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let cleanup = state.limiter.cleanup_state();
    Json(serde_json::json!({
        "rate_limit_entries": state.limiter.rate_limit_entries(),
        "lockout_entries": state.limiter.lockout_entries(),
        "sweeper_active": cleanup.timer_active,
    }))
}
