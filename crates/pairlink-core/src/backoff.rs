// ── Poll backoff ──
//
// Maps a consecutive-failure count to the delay before the next status
// poll. Steps up every `step` failures and stays flat in between, so a
// single blip never slows the poller down.

use std::time::Duration;

/// Stepped exponential backoff: `base * min(2^(failures / step), cap_multiplier)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Interval with no failures.
    pub base: Duration,
    /// Failures per doubling. Zero is treated as one.
    pub step: u32,
    /// Largest multiplier applied to `base`. Zero is treated as one.
    pub cap_multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5000),
            step: 3,
            cap_multiplier: 8,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next poll after `failures` consecutive failures.
    pub fn interval(&self, failures: u32) -> Duration {
        let exponent = failures / self.step.max(1);
        let multiplier = 2_u32
            .checked_pow(exponent)
            .unwrap_or(u32::MAX)
            .min(self.cap_multiplier.max(1));
        self.base.saturating_mul(multiplier)
    }

    /// The ceiling `interval` never exceeds.
    pub fn max_interval(&self) -> Duration {
        self.base.saturating_mul(self.cap_multiplier.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_steps_every_three_failures() {
        let policy = BackoffPolicy::default();
        let expected = [
            (0, 5_000),
            (1, 5_000),
            (2, 5_000),
            (3, 10_000),
            (5, 10_000),
            (6, 20_000),
            (9, 40_000),
            (12, 40_000),
        ];
        for (failures, millis) in expected {
            assert_eq!(
                policy.interval(failures),
                Duration::from_millis(millis),
                "failures = {failures}"
            );
        }
    }

    #[test]
    fn interval_is_monotonic() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for failures in 0..200 {
            let current = policy.interval(failures);
            assert!(
                current >= previous,
                "interval({failures}) = {current:?} dropped below {previous:?}"
            );
            previous = current;
        }
    }

    #[test]
    fn interval_never_exceeds_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_interval(), Duration::from_secs(40));
        for failures in [0, 10, 100, 1_000, u32::MAX] {
            assert!(policy.interval(failures) <= policy.max_interval());
        }
        assert_eq!(policy.interval(u32::MAX), Duration::from_secs(40));
    }

    #[test]
    fn zero_step_and_cap_are_clamped() {
        let policy = BackoffPolicy {
            base: Duration::from_secs(1),
            step: 0,
            cap_multiplier: 0,
        };
        assert_eq!(policy.interval(0), Duration::from_secs(1));
        assert_eq!(policy.interval(50), Duration::from_secs(1));
    }
}
