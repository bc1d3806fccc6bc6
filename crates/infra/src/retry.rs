//! Backoff for transient ledger conflicts.
//!
//! Only `Conflict` failures (lock timeouts) are retried. Deterministic failures
//! such as insufficient stock would fail the same way again.

use std::time::Duration;

/// Doubling delay between conflict retries, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn exponential(retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (1-indexed): `base * 2^(attempt-1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(doublings) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether another retry is allowed after `attempt` retries have been used.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_capped() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(10), Duration::from_millis(35));
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(35));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_millis(35));
    }

    #[test]
    fn retry_budget_is_respected() {
        let policy = RetryPolicy::exponential(2, Duration::ZERO, Duration::ZERO);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert!(!RetryPolicy::no_retry().should_retry(0));
    }
}
