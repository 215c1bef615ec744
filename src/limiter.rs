use dashmap::DashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock, ceil_secs};
use crate::lockout::{
    ATTEMPT_WINDOW_MS, LOCKOUT_DURATION_MS, LOCKOUT_THRESHOLD, LockoutEntry, LockoutStatus,
};
use crate::metrics::{
    CHECKS_ALLOWED, CHECKS_BLOCKED, FAILURES_RECORDED, LOCKOUT_STORE_SIZE, LOCKOUTS_TOTAL,
    RATE_STORE_SIZE, SWEEPS_TOTAL,
};
use crate::rate_limit::{RateLimitConfig, RateLimitEntry, RateLimitResult};

// How often the background sweep evicts expired entries
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// Snapshot of the sweep lifecycle, for the status endpoint and tests
#[derive(Debug, Clone, Copy)]
pub struct CleanupState {
    pub timer_active: bool,
    pub store_size: usize,
}

struct Inner {
    clock: Arc<dyn Clock>,
    requests: DashMap<String, RateLimitEntry>,
    failures: DashMap<String, LockoutEntry>,
    // Guards the sweep task handle. The stop decision ("stores are empty")
    // and a write's restart both run under this lock, so a write racing the
    // stop can never leave the timer permanently off.
    sweeper: Mutex<Option<JoinHandle<()>>>,
    sweep_interval: Duration,
}

// Request-throttling and account-lockout engine.
//
// Owns two keyed stores: fixed-window request counters and per-username
// failed-login trackers. The sweep task that evicts expired entries starts
// lazily on the first write and stops itself once both stores drain, so an
// idle instance holds no timers. Clones share the same state.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(Arc::new(SystemClock), SWEEP_INTERVAL)
    }

    pub fn with_config(clock: Arc<dyn Clock>, sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                requests: DashMap::new(),
                failures: DashMap::new(),
                sweeper: Mutex::new(None),
                sweep_interval,
            }),
        }
    }

    // Counts one call against the window for this identifier + config.
    //
    // Fixed window: the first call in a window (or the first call after the
    // old window expired) opens a fresh entry with count 1; every later call
    // inside the window increments. The read-modify-write holds the entry
    // guard for the key, so concurrent calls for one key serialize.
    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = self.inner.clock.now_millis();
        let window_ms = config.window_secs as i64 * 1000;
        let key = config.key_for(identifier);

        let result = {
            let mut entry = self
                .inner
                .requests
                .entry(key)
                .or_insert_with(|| RateLimitEntry {
                    count: 0,
                    reset_at: now + window_ms,
                });

            if now >= entry.reset_at {
                // expired window is dead state; replace, never mutate
                *entry = RateLimitEntry {
                    count: 1,
                    reset_at: now + window_ms,
                };
            } else {
                entry.count += 1;
            }

            RateLimitResult {
                success: entry.count <= config.limit,
                remaining: config.limit.saturating_sub(entry.count),
                reset_at: entry.reset_at,
            }
        };

        if result.success {
            CHECKS_ALLOWED.inc();
        } else {
            CHECKS_BLOCKED.inc();
            tracing::warn!(
                identifier,
                limit = config.limit,
                window_secs = config.window_secs,
                "rate limit exceeded"
            );
        }
        RATE_STORE_SIZE.set(self.inner.requests.len() as f64);

        self.ensure_sweeper();
        result
    }

    // Records one failed login for the username's current attempt window.
    // A window that already ran its 15 minutes restarts at one failure.
    pub fn record_failure(&self, username: &str) {
        let now = self.inner.clock.now_millis();

        {
            let mut entry = self
                .inner
                .failures
                .entry(username.to_string())
                .or_insert_with(|| LockoutEntry {
                    failed_attempts: 0,
                    first_failure_at: now,
                    locked_until: None,
                });

            if now - entry.first_failure_at >= ATTEMPT_WINDOW_MS {
                *entry = LockoutEntry {
                    failed_attempts: 1,
                    first_failure_at: now,
                    locked_until: None,
                };
            } else {
                entry.failed_attempts += 1;
            }

            tracing::debug!(
                username,
                attempts = entry.failed_attempts,
                "login failure recorded"
            );
        }

        FAILURES_RECORDED.inc();
        LOCKOUT_STORE_SIZE.set(self.inner.failures.len() as f64);

        self.ensure_sweeper();
    }

    // Reports whether the username is currently locked out. Sets the lock
    // timestamp lazily the first time the threshold is observed; discards
    // entries whose window or lock has run out.
    pub fn check_lockout(&self, username: &str) -> LockoutStatus {
        let now = self.inner.clock.now_millis();

        let (status, expired) = {
            let Some(mut entry) = self.inner.failures.get_mut(username) else {
                return LockoutStatus::unlocked();
            };

            if entry.locked_until.is_none() && now - entry.first_failure_at >= ATTEMPT_WINDOW_MS {
                (LockoutStatus::unlocked(), true)
            } else if entry.failed_attempts < LOCKOUT_THRESHOLD {
                (LockoutStatus::unlocked(), false)
            } else {
                let locked_until = *entry.locked_until.get_or_insert_with(|| {
                    LOCKOUTS_TOTAL.inc();
                    tracing::warn!(username, "account locked after repeated failures");
                    now + LOCKOUT_DURATION_MS
                });

                if now < locked_until {
                    (LockoutStatus::locked_for(ceil_secs(locked_until - now)), false)
                } else {
                    (LockoutStatus::unlocked(), true)
                }
            }
        };

        // removal happens after the entry guard is dropped
        if expired {
            self.inner.failures.remove(username);
            LOCKOUT_STORE_SIZE.set(self.inner.failures.len() as f64);
        }

        status
    }

    // Clears the failure history, called on successful authentication.
    // The very next check reports unlocked, even mid-lockout.
    pub fn clear_failed_logins(&self, username: &str) {
        if self.inner.failures.remove(username).is_some() {
            tracing::debug!(username, "failed login history cleared");
        }
        LOCKOUT_STORE_SIZE.set(self.inner.failures.len() as f64);
    }

    // Stops the sweep task for orderly shutdown. The aborted task never
    // fires again; a later write starts a fresh one.
    pub fn stop(&self) {
        self.inner.stop_sweeper();
    }

    // Empties both stores and stops the sweep task. Test hook.
    pub fn reset(&self) {
        self.inner.requests.clear();
        self.inner.failures.clear();
        self.inner.stop_sweeper();
        RATE_STORE_SIZE.set(0.0);
        LOCKOUT_STORE_SIZE.set(0.0);
    }

    pub fn cleanup_state(&self) -> CleanupState {
        CleanupState {
            timer_active: self.inner.sweeper.lock().unwrap().is_some(),
            store_size: self.inner.requests.len() + self.inner.failures.len(),
        }
    }

    pub fn rate_limit_entries(&self) -> usize {
        self.inner.requests.len()
    }

    pub fn lockout_entries(&self) -> usize {
        self.inner.failures.len()
    }

    pub fn now_millis(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    // Starts the sweep task if it is not running. Idempotent; called on
    // every write. The task keeps only a weak handle on the engine so a
    // dropped limiter never keeps ticking.
    fn ensure_sweeper(&self) {
        let mut sweeper = self.inner.sweeper.lock().unwrap();
        if sweeper.is_some() {
            return;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        // anchor the tick schedule here, not at the task's first poll
        let mut ticker = tokio::time::interval(self.inner.sweep_interval);

        *sweeper = Some(tokio::spawn(async move {
            // the first tick completes immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if inner.sweep() {
                    break;
                }
            }
        }));

        tracing::debug!("sweep timer started");
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    // One sweep pass. Returns true when the task should exit because both
    // stores drained; in that case the handle is already cleared, so a
    // write observing the empty slot restarts the timer.
    fn sweep(&self) -> bool {
        let now = self.clock.now_millis();

        self.requests.retain(|_, entry| now < entry.reset_at);
        self.failures.retain(|_, entry| match entry.locked_until {
            Some(until) => now < until,
            None => now - entry.first_failure_at < ATTEMPT_WINDOW_MS,
        });

        SWEEPS_TOTAL.inc();
        RATE_STORE_SIZE.set(self.requests.len() as f64);
        LOCKOUT_STORE_SIZE.set(self.failures.len() as f64);

        let mut sweeper = self.sweeper.lock().unwrap();
        if self.requests.is_empty() && self.failures.is_empty() {
            *sweeper = None;
            tracing::debug!("stores empty, sweep timer stopped");
            true
        } else {
            false
        }
    }

    fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
            tracing::debug!("sweep timer stopped");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter_at(start_millis: i64) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(start_millis));
        let limiter = RateLimiter::with_config(clock.clone(), SWEEP_INTERVAL);
        (clock, limiter)
    }

    // let the spawned sweep task run between clock advances
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn six_calls_exhaust_a_window_of_five() {
        let (_, limiter) = limiter_at(0);
        let config = RateLimitConfig::new(5, 60);

        let results: Vec<_> = (0..6).map(|_| limiter.check("u1", &config)).collect();

        let flags: Vec<_> = results.iter().map(|r| r.success).collect();
        let remaining: Vec<_> = results.iter().map(|r| r.remaining).collect();
        assert_eq!(flags, [true, true, true, true, true, false]);
        assert_eq!(remaining, [4, 3, 2, 1, 0, 0]);
        assert!(results.iter().all(|r| r.reset_at == 60_000));
    }

    #[tokio::test]
    async fn window_reopens_after_expiry() {
        let (clock, limiter) = limiter_at(0);
        let config = RateLimitConfig::new(5, 60);

        for _ in 0..6 {
            limiter.check("u1", &config);
        }

        clock.advance(Duration::from_secs(61));
        let result = limiter.check("u1", &config);
        assert!(result.success);
        assert_eq!(result.remaining, 4);
        assert_eq!(result.reset_at, 61_000 + 60_000);
    }

    #[tokio::test]
    async fn identifiers_do_not_share_counters() {
        let (_, limiter) = limiter_at(0);
        let config = RateLimitConfig::new(2, 60);

        limiter.check("a", &config);
        limiter.check("a", &config);
        assert!(!limiter.check("a", &config).success);
        assert!(limiter.check("b", &config).success);
    }

    #[tokio::test]
    async fn prefixes_do_not_share_counters() {
        let (_, limiter) = limiter_at(0);
        let auth = RateLimitConfig::with_prefix(2, 60, "auth");
        let api = RateLimitConfig::with_prefix(2, 60, "api");

        limiter.check("1.2.3.4", &auth);
        limiter.check("1.2.3.4", &auth);
        assert!(!limiter.check("1.2.3.4", &auth).success);
        assert!(limiter.check("1.2.3.4", &api).success);
    }

    #[tokio::test]
    async fn unprefixed_calls_share_one_budget() {
        let (_, limiter) = limiter_at(0);
        // two unrelated call sites, neither sets a prefix
        let first = RateLimitConfig::new(3, 60);
        let second = RateLimitConfig::new(3, 60);

        limiter.check("1.2.3.4", &first);
        limiter.check("1.2.3.4", &second);
        limiter.check("1.2.3.4", &first);
        assert!(!limiter.check("1.2.3.4", &second).success);
    }

    #[tokio::test]
    async fn four_failures_do_not_lock() {
        let (_, limiter) = limiter_at(0);
        for _ in 0..4 {
            limiter.record_failure("alice");
        }
        assert_eq!(limiter.check_lockout("alice"), LockoutStatus::unlocked());
    }

    #[tokio::test]
    async fn fifth_failure_locks_for_fifteen_minutes() {
        let (_, limiter) = limiter_at(0);
        for _ in 0..5 {
            limiter.record_failure("alice");
        }

        let status = limiter.check_lockout("alice");
        assert!(status.locked);
        let remaining = status.remaining_seconds.unwrap();
        assert!((890..=910).contains(&remaining), "remaining = {remaining}");
    }

    #[tokio::test]
    async fn lock_expires_after_its_duration() {
        let (clock, limiter) = limiter_at(0);
        for _ in 0..5 {
            limiter.record_failure("alice");
        }
        assert!(limiter.check_lockout("alice").locked);

        clock.advance(Duration::from_secs(15 * 60 + 1));
        assert_eq!(limiter.check_lockout("alice"), LockoutStatus::unlocked());
        // entry was discarded entirely
        assert_eq!(limiter.lockout_entries(), 0);
    }

    #[tokio::test]
    async fn clear_unlocks_immediately_even_mid_lockout() {
        let (_, limiter) = limiter_at(0);
        for _ in 0..5 {
            limiter.record_failure("alice");
        }
        assert!(limiter.check_lockout("alice").locked);

        limiter.clear_failed_logins("alice");
        assert_eq!(limiter.check_lockout("alice"), LockoutStatus::unlocked());
    }

    #[tokio::test]
    async fn attempt_window_elapse_resets_the_count() {
        let (clock, limiter) = limiter_at(0);
        for _ in 0..4 {
            limiter.record_failure("alice");
        }

        clock.advance(Duration::from_secs(15 * 60 + 1));
        assert_eq!(limiter.check_lockout("alice"), LockoutStatus::unlocked());
        assert_eq!(limiter.lockout_entries(), 0);

        // the username counts as fresh again: four more failures stay open
        for _ in 0..4 {
            limiter.record_failure("alice");
        }
        assert_eq!(limiter.check_lockout("alice"), LockoutStatus::unlocked());
        limiter.record_failure("alice");
        assert!(limiter.check_lockout("alice").locked);
    }

    #[tokio::test]
    async fn stale_window_restarts_on_next_failure() {
        let (clock, limiter) = limiter_at(0);
        for _ in 0..4 {
            limiter.record_failure("alice");
        }

        clock.advance(Duration::from_secs(16 * 60));
        limiter.record_failure("alice");

        // that failure opened a fresh window at one attempt
        for _ in 0..3 {
            limiter.record_failure("alice");
        }
        assert_eq!(limiter.check_lockout("alice"), LockoutStatus::unlocked());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_timer_starts_lazily_and_stops_itself() {
        let (clock, limiter) = limiter_at(0);
        assert!(!limiter.cleanup_state().timer_active);

        limiter.check("u1", &RateLimitConfig::new(5, 60));
        assert!(limiter.cleanup_state().timer_active);
        assert_eq!(limiter.cleanup_state().store_size, 1);

        // first sweep: the window is still live, timer keeps running
        clock.advance(Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(61)).await;
        settle().await;
        assert!(limiter.cleanup_state().timer_active);
        assert_eq!(limiter.cleanup_state().store_size, 1);

        // second sweep: the window expired, stores drain, timer stops
        clock.advance(Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(limiter.cleanup_state().store_size, 0);
        assert!(!limiter.cleanup_state().timer_active);

        // a later write restarts it
        limiter.check("u2", &RateLimitConfig::new(5, 60));
        assert!(limiter.cleanup_state().timer_active);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_locked_entries_until_the_lock_expires() {
        let (clock, limiter) = limiter_at(0);
        for _ in 0..5 {
            limiter.record_failure("alice");
        }
        assert!(limiter.check_lockout("alice").locked);

        // well past the attempt window, but the lock is still in force
        clock.advance(Duration::from_secs(10 * 60));
        tokio::time::advance(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(limiter.lockout_entries(), 1);
        assert!(limiter.check_lockout("alice").locked);

        // lock runs out, next sweep evicts and the timer stops
        clock.advance(Duration::from_secs(6 * 60));
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(limiter.lockout_entries(), 0);
        assert!(!limiter.cleanup_state().timer_active);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_stale_unlocked_attempts() {
        let (clock, limiter) = limiter_at(0);
        limiter.record_failure("alice");
        limiter.record_failure("bob");

        clock.advance(Duration::from_secs(16 * 60));
        tokio::time::advance(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(limiter.lockout_entries(), 0);
        assert!(!limiter.cleanup_state().timer_active);
    }

    #[tokio::test]
    async fn stop_and_reset_tear_the_timer_down() {
        let (_, limiter) = limiter_at(0);
        limiter.check("u1", &RateLimitConfig::new(5, 60));
        assert!(limiter.cleanup_state().timer_active);

        limiter.stop();
        assert!(!limiter.cleanup_state().timer_active);
        // stopping does not drop live entries
        assert_eq!(limiter.rate_limit_entries(), 1);

        limiter.record_failure("alice");
        assert!(limiter.cleanup_state().timer_active);

        limiter.reset();
        assert!(!limiter.cleanup_state().timer_active);
        assert_eq!(limiter.cleanup_state().store_size, 0);
    }
}
