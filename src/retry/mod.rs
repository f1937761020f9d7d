
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, error, warn};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Fixed-attempt, fixed-delay retry policy applied at call sites
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first one
    pub attempts: u32,
    /// Pause between a failed attempt and the next one
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    ///
    /// Returns the first success, or the error of the final attempt.
    #[inline]
    pub fn run<T, E, F>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", label, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < attempts => {
                    warn!("{} failed on attempt {}/{}: {}", label, attempt, attempts, e);
                    std::thread::sleep(self.delay());
                    attempt += 1;
                }
                Err(e) => {
                    error!("{} failed after {} attempts: {}", label, attempts, e);
                    return Err(e);
                }
            }
        }
    }
}
