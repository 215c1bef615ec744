use crate::limiter::RateLimiter;
use crate::rate_limit::RateLimitConfig;

// app's shared state
#[derive(Clone)]
pub struct AppState {
    pub limiter: RateLimiter,
    pub limits: RateLimitConfig, // limits applied by the middleware
}
