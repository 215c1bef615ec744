use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, register_counter, register_gauge};

lazy_static! {
    pub static ref CHECKS_ALLOWED: Counter =
        register_counter!("rategate_checks_allowed_total", "Rate checks that passed").unwrap();
    pub static ref CHECKS_BLOCKED: Counter =
        register_counter!("rategate_checks_blocked_total", "Rate checks that were rejected").unwrap();
    pub static ref FAILURES_RECORDED: Counter =
        register_counter!("rategate_login_failures_total", "Failed login attempts recorded").unwrap();
    pub static ref LOCKOUTS_TOTAL: Counter =
        register_counter!("rategate_lockouts_total", "Accounts that hit the lockout threshold").unwrap();
    pub static ref SWEEPS_TOTAL: Counter =
        register_counter!("rategate_sweeps_total", "Background sweep passes completed").unwrap();
    pub static ref RATE_STORE_SIZE: Gauge =
        register_gauge!("rategate_rate_store_size", "Current number of rate limit windows").unwrap();
    pub static ref LOCKOUT_STORE_SIZE: Gauge =
        register_gauge!("rategate_lockout_store_size", "Current number of tracked usernames").unwrap();
}
