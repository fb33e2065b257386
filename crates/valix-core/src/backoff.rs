//! Exponential backoff policy.
//!
//! Both the job queue and the webhook delivery engine compute retry delays
//! with this function; the suspend/sleep mechanism stays with the caller so
//! the computation is testable on its own.

use std::time::Duration;

/// Compute the delay before the next attempt.
///
/// `attempt` is 1-based: the delay returned for attempt `n` is the wait
/// after the n-th failure, `min(base * 2^(n-1), cap)`. An `attempt` of 0 is
/// treated as 1.
#[must_use]
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let delay = base.saturating_mul(1u32 << exponent);
    delay.min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(1);
    const CAP: Duration = Duration::from_secs(30);

    #[test]
    fn test_first_attempt_is_base() {
        assert_eq!(backoff_delay(1, BASE, CAP), Duration::from_secs(1));
    }

    #[test]
    fn test_doubles_per_attempt() {
        assert_eq!(backoff_delay(2, BASE, CAP), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, BASE, CAP), Duration::from_secs(4));
        assert_eq!(backoff_delay(4, BASE, CAP), Duration::from_secs(8));
        assert_eq!(backoff_delay(5, BASE, CAP), Duration::from_secs(16));
    }

    #[test]
    fn test_capped() {
        assert_eq!(backoff_delay(6, BASE, CAP), Duration::from_secs(30));
        assert_eq!(backoff_delay(20, BASE, CAP), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_attempt_treated_as_first() {
        assert_eq!(backoff_delay(0, BASE, CAP), Duration::from_secs(1));
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        assert_eq!(backoff_delay(u32::MAX, BASE, CAP), CAP);
    }

    #[test]
    fn test_queue_policy_base() {
        // Queue jobs retry at 2s, 4s, capped at 60s.
        let base = Duration::from_secs(2);
        let cap = Duration::from_secs(60);
        assert_eq!(backoff_delay(1, base, cap), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, base, cap), Duration::from_secs(4));
        assert_eq!(backoff_delay(10, base, cap), Duration::from_secs(60));
    }
}
