//! Bounded retry policy and an injectable clock.
//!
//! Reads from an eventually consistent store are retried on a fixed poll
//! interval until a wall-clock deadline passes. The clock is a trait so tests
//! can drive the loop without real sleeps.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Source of time and sleeping for retry loops.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that only moves when something sleeps on it.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    fn now_guard(&self) -> MutexGuard<'_, Instant> {
        self.now.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.now_guard() += duration;
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now_guard()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.sleeps
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(duration);
    }
}

/// Fixed-interval retry bounded by a total deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts.
    pub interval: Duration,

    /// Total time after the first attempt during which failures are retried.
    /// Zero means a single attempt.
    pub deadline: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Run `attempt` until it succeeds, `should_retry` rejects its error, or
    /// the deadline passes. Returns the last error with the attempt count.
    pub fn run<T, E>(
        &self,
        clock: &dyn Clock,
        mut attempt: impl FnMut() -> Result<T, E>,
        mut should_retry: impl FnMut(&E) -> bool,
    ) -> Result<T, (E, u32)> {
        let give_up_at = clock.now() + self.deadline;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match attempt() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !should_retry(&err) || clock.now() >= give_up_at {
                        return Err((err, attempts));
                    }
                    clock.sleep(self.interval);
                }
            }
        }
    }
}
