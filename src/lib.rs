//! In-process request throttling and account lockout.
//!
//! The engine is [`RateLimiter`]: fixed-window counters keyed by
//! `prefix:identifier`, failed-login tracking with a threshold-triggered
//! 15 minute lockout, and a background sweep that starts on the first write
//! and stops itself once both stores drain. Around it sit the pieces a
//! request handler needs: client identity resolution from proxy headers,
//! `X-RateLimit-*` header and 429 payload builders, and an axum middleware.

pub mod client_ip;
pub mod clock;
pub mod config;
pub mod handlers;
pub mod limiter;
pub mod lockout;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;
pub mod responses;
pub mod state;

pub use client_ip::{UNKNOWN_CLIENT, resolve_client_ip};
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{CleanupState, RateLimiter, SWEEP_INTERVAL};
pub use lockout::{ATTEMPT_WINDOW_MS, LOCKOUT_DURATION_MS, LOCKOUT_THRESHOLD, LockoutStatus};
pub use rate_limit::{RateLimitConfig, RateLimitResult};
pub use responses::{rate_limit_headers, too_many_requests};
