//! Retry policy: decides backoff delays.

use std::time::Duration;

use crate::config::SifterConfig;

/// Backoff policy for failed attempts.
///
/// The attempt budget itself (`max_attempts`) lives on each task record;
/// this type only answers "how long until the next try".
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SifterConfig) -> Self {
        Self {
            base_delay: config.retry_base_delay(),
            multiplier: config.retry_multiplier,
        }
    }

    /// Zero delay everywhere; keeps retry-path tests fast.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Calculate delay for the next retry based on attempt number.
    ///
    /// Exponential backoff: `delay = base_delay * multiplier^(attempts - 1)`.
    ///
    /// Example with base_delay=1s, multiplier=2.0:
    /// - attempt 1 (first failure): 1s
    /// - attempt 2: 2s
    /// - attempt 3: 4s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}
