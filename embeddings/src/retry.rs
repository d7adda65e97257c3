//! Retry policy for embedding requests.

use std::time::Duration;

use rand::Rng;

use crate::error::EmbeddingError;

/// Exponential backoff with uniform jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Factor applied to the delay after each failed attempt.
    pub multiplier: f64,

    /// Upper bound of the random delay added to each backoff.
    pub max_jitter: Duration,

    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_jitter: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Retry `max_attempts` times total without sleeping in between.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_jitter: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Set the number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Backoff without jitter after `failed_attempts` failures (1-based).
    pub fn base_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Delay to wait after `failed_attempts` failures ending in `error`.
    pub fn delay_for(&self, failed_attempts: u32, error: &EmbeddingError) -> Duration {
        let mut delay = self.base_delay(failed_attempts);

        if !self.max_jitter.is_zero() {
            let jitter = rand::rng().random_range(0.0..=self.max_jitter.as_secs_f64());
            delay = delay.saturating_add(Duration::from_secs_f64(jitter));
        }

        if let EmbeddingError::RateLimited { retry_after_secs } = error {
            delay = delay.max(Duration::from_secs(*retry_after_secs));
        }

        delay.min(self.max_delay)
    }
}
