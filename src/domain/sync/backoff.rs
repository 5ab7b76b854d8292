//! Capped exponential reconnect backoff.

use std::time::Duration;

/// `delay(n) = min(base * factor^(n-1), max)` for attempt `n >= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            factor: 2.0,
            max: Duration::from_millis(30_000),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, factor: f64, max: Duration) -> Self {
        Self { base, factor, max }
    }

    /// Delay before retry number `attempt`. Attempt 0 is treated as 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_until_capped() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (1..=7).map(|n| policy.delay(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn huge_attempt_counts_saturate() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(u32::MAX), policy.max);
        assert_eq!(policy.delay(0), policy.base);
    }

    proptest! {
        #[test]
        fn non_decreasing_and_capped(
            base_ms in 1u64..5_000,
            factor in 1.0f64..4.0,
            extra_ms in 0u64..120_000,
            n in 1u32..200,
        ) {
            let policy = BackoffPolicy::new(
                Duration::from_millis(base_ms),
                factor,
                Duration::from_millis(base_ms + extra_ms),
            );
            let this = policy.delay(n);
            let next = policy.delay(n + 1);
            prop_assert!(next >= this);
            prop_assert!(next <= policy.max);
        }

        #[test]
        fn strictly_increasing_before_saturation(base_ms in 1u64..1_000, n in 1u32..20) {
            let policy = BackoffPolicy::new(
                Duration::from_millis(base_ms),
                2.0,
                Duration::from_secs(3_600 * 24),
            );
            let this = policy.delay(n);
            let next = policy.delay(n + 1);
            if next < policy.max {
                prop_assert!(next > this);
            }
        }
    }
}
