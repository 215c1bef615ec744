// Failed attempts within one window before the account locks
pub const LOCKOUT_THRESHOLD: u32 = 5;

// How long a triggered lock holds, in milliseconds (15 minutes)
pub const LOCKOUT_DURATION_MS: i64 = 15 * 60 * 1000;

// How long failed attempts keep counting toward the threshold (15 minutes)
pub const ATTEMPT_WINDOW_MS: i64 = 15 * 60 * 1000;

// Failure-tracking state for one username.
//
// locked_until is only ever set once failed_attempts reaches the threshold,
// and it is computed once when the locked branch is first observed rather
// than recomputed on every check.
pub struct LockoutEntry {
    pub failed_attempts: u32,
    pub first_failure_at: i64, // epoch millis, start of the attempt window
    pub locked_until: Option<i64>,
}

// Outcome of a lockout check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    pub locked: bool,
    pub remaining_seconds: Option<i64>,
}

impl LockoutStatus {
    pub(crate) fn unlocked() -> Self {
        Self {
            locked: false,
            remaining_seconds: None,
        }
    }

    pub(crate) fn locked_for(remaining_seconds: i64) -> Self {
        Self {
            locked: true,
            remaining_seconds: Some(remaining_seconds),
        }
    }
}
