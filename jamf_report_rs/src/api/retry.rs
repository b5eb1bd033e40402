//! Retry policy for transient HTTP failures.

use std::time::Duration;

/// Statuses worth another attempt: payload too large (Jamf returns it under
/// load), throttling and gateway errors.
const RETRYABLE_STATUSES: [u16; 6] = [413, 429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn is_retryable(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Backoff after the given failed attempt: base, 2x base, 4x base, ...
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut backoff = self.base_delay;
        for _ in 1..attempt {
            backoff = (backoff * 2).min(self.max_delay);
        }
        backoff.min(self.max_delay)
    }

    /// Server-provided `Retry-After` wins, still bounded by `max_delay`.
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for(attempt),
        }
    }
}

/// Parse a `Retry-After` header given in seconds. HTTP-date values are
/// ignored and fall back to the computed backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        for status in [413, 429, 500, 502, 503, 504] {
            assert!(RetryPolicy::is_retryable(status), "{status}");
        }
        for status in [400, 401, 403, 404, 501] {
            assert!(!RetryPolicy::is_retryable(status), "{status}");
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(16));
        assert_eq!(policy.delay_for(6), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
    }

    #[test]
    fn retry_after_hint() {
        let policy = RetryPolicy::default();
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_secs(120))),
            Duration::from_secs(30)
        );
        assert_eq!(policy.delay_with_hint(2, None), Duration::from_secs(2));
    }
}
