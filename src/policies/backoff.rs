//! # Delay between retry attempts.
//!
//! [`BackoffPolicy`] computes how long a worker waits before it retries a
//! device call. The delay after failed attempt `n` (0-indexed) is
//! `first × factor^n`, clamped to `max`, then jittered. The base is derived
//! from the attempt number alone, so jitter never feeds back into later delays.
//!
//! [`BackoffPolicy::default`] is a flat one-second delay without jitter.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use clockfleet::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(250));
//! assert_eq!(backoff.next(2), Duration::from_secs(1));
//! assert_eq!(backoff.next(5), Duration::from_secs(2));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// One second between attempts, no growth, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// A fixed delay between attempts.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Retry immediately.
    pub fn immediate() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// Computes the delay to wait after failed attempt `attempt` (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base, self.first, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(first_ms: u64, max_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_default_is_one_second_flat() {
        let policy = BackoffPolicy::default();
        for attempt in 0..5 {
            assert_eq!(policy.next(attempt), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_exponential_growth() {
        let policy = exp(100, 30_000);
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn test_clamped_to_max() {
        assert_eq!(exp(100, 1_000).next(10), Duration::from_secs(1));
        assert_eq!(exp(5_000, 1_000).next(0), Duration::from_secs(1));
    }

    #[test]
    fn test_overflow_clamps_to_max() {
        assert_eq!(exp(100, 10_000).next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_immediate_never_waits() {
        assert_eq!(BackoffPolicy::immediate().next(7), Duration::ZERO);
    }
}
