//! Bounded retry for transient transport failures.

use std::fmt::Display;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Number of attempts made for every remote call unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How many times a call is attempted and how long to wait in between.
///
/// Which errors count as transient is decided by the caller's predicate; the
/// policy only bounds the attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last transient one once
    /// `max_attempts` calls have failed.
    pub fn run<T, E, F, P>(&self, operation: &str, is_transient: P, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_transient(&err) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
