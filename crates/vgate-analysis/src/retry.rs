//! Retry policy with exponential backoff and jitter.
//!
//! Backoff for recognizer calls:
//! - Exponential growth from a base delay by a configurable factor
//! - Capped at a maximum delay
//! - Equal jitter (half fixed, half random) to spread retries of sibling chunks
//! - Honors a server-provided Retry-After, still subject to the cap

use std::time::Duration;

use rand::Rng;

/// Retry/backoff configuration.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total recognizer attempts per chunk, the first call included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per additional retry.
    pub factor: u32,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Randomize delays.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            factor: 2,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_attempts: std::env::var("VGATE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts),
            base_delay: std::env::var("VGATE_BACKOFF_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            factor: std::env::var("VGATE_BACKOFF_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|f: &u32| *f > 0)
                .unwrap_or(defaults.factor),
            max_delay: std::env::var("VGATE_BACKOFF_MAX_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            jitter: true,
        }
    }

    /// Set the total number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Whether another attempt is allowed after `attempts` calls.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Deterministic delay after the `failed_attempts`-th failure (1-based).
    pub fn nominal_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Delay to sleep before the next attempt.
    pub fn delay_for(&self, failed_attempts: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(after) = retry_after {
            return after.min(self.max_delay);
        }

        let nominal = self.nominal_delay(failed_attempts);
        if !self.jitter {
            return nominal;
        }

        let nominal_ms = nominal.as_millis() as u64;
        let half = nominal_ms / 2;
        let spread = rand::rng().random_range(0..=nominal_ms - half);
        Duration::from_millis(half + spread)
    }
}
