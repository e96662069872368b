use std::time::Duration;

use rand::Rng;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);
/// Longest accepted per-attempt timeout. Larger values are clamped to it.
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Bounds for one logical generate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// The per-attempt timeout, clamped to [`MAX_ATTEMPT_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        self.attempt_timeout.min(MAX_ATTEMPT_TIMEOUT)
    }

    /// Never less than one attempt.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based): `2^attempt * base + uniform(0..=jitter)`.
    pub fn backoff(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        self.min_backoff(attempt) + self.jitter(rng)
    }

    pub fn min_backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn max_backoff(&self, attempt: u32) -> Duration {
        self.min_backoff(attempt).saturating_add(self.max_jitter)
    }

    /// Upper bound on wall-clock time of a whole operation.
    pub fn max_total_duration(&self) -> Duration {
        let attempts = self.attempts();
        (1..attempts)
            .map(|n| self.max_backoff(n))
            .fold(self.timeout().saturating_mul(attempts), Duration::saturating_add)
    }

    fn jitter(&self, rng: &mut impl Rng) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}
