use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

// Time source for the limiter. Everything downstream works in unix epoch
// milliseconds because the X-RateLimit-Reset header and the 429 payload
// are defined in epoch seconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

// Wall clock used by the binary
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

// Manually advanced clock for deterministic tests
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

// Round a millisecond interval up to whole seconds, clamped at zero
pub(crate) fn ceil_secs(millis: i64) -> i64 {
    if millis <= 0 { 0 } else { (millis + 999) / 1000 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.now_millis(), 62_000);
    }

    #[test]
    fn ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(-500), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1_000), 1);
        assert_eq!(ceil_secs(1_001), 2);
        assert_eq!(ceil_secs(899_500), 900);
    }
}
