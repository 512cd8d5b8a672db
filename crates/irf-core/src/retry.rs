//! Backoff schedule for transient generation failures

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any computed delay
    pub max_delay: Duration,
    /// Spread applied to computed delays, as a fraction
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately; for tests and dry runs
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
        }
    }

    /// Total calls allowed, including the first
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (zero-based)
    ///
    /// A provider-suggested delay wins, capped at `max_delay`.
    #[must_use]
    pub fn delay(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(delay) = suggested {
            return delay.min(self.max_delay);
        }

        let exp_ms = self.base_delay.as_millis() as f64 * 2f64.powi(attempt.min(16) as i32);
        let capped = exp_ms.min(self.max_delay.as_millis() as f64);
        if capped <= 0.0 {
            return Duration::ZERO;
        }

        let spread = capped * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = if spread > 0.0 {
            rand::rng().random_range(-spread..=spread)
        } else {
            0.0
        };
        let final_ms = (capped + jitter).clamp(0.0, self.max_delay.as_millis() as f64);
        Duration::from_millis(final_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_cap() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay(3, None), Duration::from_secs(8));
        assert_eq!(policy.delay(10, None), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_in_band() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay(2, None).as_millis();
            assert!((3200..=4800).contains(&d), "{d}");
        }
    }

    #[test]
    fn suggested_delay_wins_but_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay(0, Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn immediate_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay(2, None), Duration::ZERO);
    }
}
