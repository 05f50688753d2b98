//! Blocking waits and the two retry policies used by the batch jobs.
//!
//! * Cooldown policy: list calls and bulk deletes that fail transiently are
//!   re-issued after a fixed cooldown until they succeed. There is no limit.
//! * Single-item policy: a failing single-item delete is retried a bounded
//!   number of times, then the record is skipped.

use std::time::Duration;

use crate::types::config::RetrySettings;

/// Blocks the current thread. Swapped out in tests.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    pub single_retry_delay: Duration,
    pub single_retry_attempts: u32,
    pub delete_pause: Duration,
}

impl RetryPolicy {
    /// Policy with no waiting at all.
    pub fn immediate(single_retry_attempts: u32) -> Self {
        Self {
            cooldown: Duration::ZERO,
            single_retry_delay: Duration::ZERO,
            single_retry_attempts,
            delete_pause: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            cooldown: s.cooldown(),
            single_retry_delay: s.single_retry_delay(),
            single_retry_attempts: s.single_retry_attempts,
            delete_pause: s.delete_pause(),
        }
    }
}

/// Runs `op` until it returns something other than a transient error,
/// sleeping `cooldown` between attempts.
pub fn retry_until_settled<T, E>(
    sleeper: &dyn Sleeper,
    cooldown: Duration,
    mut is_transient: impl FnMut(&E) -> bool,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    loop {
        match op() {
            Err(e) if is_transient(&e) => {
                tracing::warn!(cooldown_secs = cooldown.as_secs(), "transient failure, cooling down");
                sleeper.sleep(cooldown);
            }
            other => return other,
        }
    }
}

/// Runs `op` once plus up to `attempts` retries on transient errors.
pub fn retry_bounded<T, E>(
    sleeper: &dyn Sleeper,
    delay: Duration,
    attempts: u32,
    mut is_transient: impl FnMut(&E) -> bool,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut result = op();
    let mut tries = 0;
    while tries < attempts {
        match &result {
            Err(e) if is_transient(e) => {
                sleeper.sleep(delay);
                result = op();
                tries += 1;
            }
            _ => break,
        }
    }
    result
}
