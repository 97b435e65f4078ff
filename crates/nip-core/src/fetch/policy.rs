use std::time::Duration;

/// Capped exponential backoff over a fixed per-endpoint attempt budget.
///
/// The budget applies to each endpoint separately: a fetch burns up to
/// `attempts_per_endpoint` attempts on one endpoint before rotating to the
/// next, and the attempt counter restarts on rotation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per endpoint (including the first).
    pub attempts_per_endpoint: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_endpoint: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after a failed attempt. `attempt` is 1-based
    /// (1 = first attempt on the current endpoint).
    ///
    /// Grows as `base * 2^(attempt-1)`, never decreases with the attempt
    /// index, and is capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let raw = self.base_delay.saturating_mul(exp);
        raw.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_monotonically() {
        let p = RetryPolicy::default();
        let mut prev = Duration::ZERO;
        for attempt in 1..=10 {
            let d = p.delay_for(attempt);
            assert!(d >= prev, "attempt {attempt} shrank the delay");
            prev = d;
        }
    }

    #[test]
    fn first_delay_is_base() {
        let p = RetryPolicy {
            base_delay: Duration::from_millis(250),
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(250));
        assert_eq!(p.delay_for(2), Duration::from_millis(500));
    }

    #[test]
    fn backoff_is_capped() {
        let p = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn zero_base_means_no_sleep() {
        let p = RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_for(7), Duration::ZERO);
    }
}
