use axum::{Router, middleware::from_fn_with_state, routing::get};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use rategate::clock::SystemClock;
use rategate::config::Args;
use rategate::handlers::{health_handler, metrics_handler, status_handler};
use rategate::limiter::RateLimiter;
use rategate::middleware::rate_limit_middleware;
use rategate::rate_limit::RateLimitConfig;
use rategate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let limiter = RateLimiter::with_config(
        Arc::new(SystemClock),
        Duration::from_secs(args.sweep_interval),
    );
    let state = AppState {
        limiter: limiter.clone(),
        limits: RateLimitConfig::with_prefix(args.rate_limit, args.rate_window, &args.rate_prefix),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/status", get(status_handler))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(port = args.port, "rategate listening");
    tracing::info!(
        limit = args.rate_limit,
        window_secs = args.rate_window,
        prefix = %args.rate_prefix,
        sweep_interval_secs = args.sweep_interval,
        "throttle configured"
    );

    axum::serve(listener, app).await.expect("server error");

    limiter.stop();
}
