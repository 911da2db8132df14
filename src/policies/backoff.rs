//! # Backoff between worker creation attempts.
//!
//! The delay before retry `n` (0-indexed) is `first × factor^n`, clamped to `max`,
//! then jittered. The base never depends on a previous jittered value.
//!
//! ```rust
//! use std::time::Duration;
//! use procvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
    /// Growth factor per retry; `1.0` keeps the delay constant.
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl BackoffPolicy {
    /// Constant delay with no jitter.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 && secs <= self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };
        self.jitter.apply(base.min(self.max))
    }

    /// Sum of the un-jittered delays of `retries` retries.
    pub fn total(&self, retries: u32) -> Duration {
        let plain = Self {
            jitter: JitterPolicy::None,
            ..*self
        };
        (0..retries).map(|n| plain.next(n)).sum()
    }
}

impl Default for BackoffPolicy {
    /// Constant 10s between worker creation attempts, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_constant_ten_seconds() {
        let p = BackoffPolicy::default();
        for n in 0..5 {
            assert_eq!(p.next(n), Duration::from_secs(10));
        }
        assert_eq!(p.total(2), Duration::from_secs(20));
    }

    #[test]
    fn exponential_growth_is_capped() {
        let p = BackoffPolicy {
            first: Duration::from_millis(250),
            max: Duration::from_secs(2),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.next(0), Duration::from_millis(250));
        assert_eq!(p.next(2), Duration::from_secs(1));
        assert_eq!(p.next(3), Duration::from_secs(2));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = BackoffPolicy {
            first: Duration::from_secs(30),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.next(0), Duration::from_secs(5));
    }

    #[test]
    fn jitter_never_exceeds_base() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..BackoffPolicy::constant(Duration::from_secs(1))
        };
        for n in 0..20 {
            assert!(p.next(n) <= Duration::from_secs(1));
        }
        assert_eq!(p.total(3), Duration::from_secs(3));
    }
}
