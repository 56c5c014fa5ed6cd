//! # Jitter for retry delays.
//!
//! A fleet run connects to many clocks at once; when a switch or a site link
//! flaps, every worker fails at the same moment. [`JitterPolicy`] spreads the
//! retries so they do not land on the network in lockstep.
//!
//! - [`JitterPolicy::None`]: exact backoff delay
//! - [`JitterPolicy::Full`]: random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: random in `[first, delay * 3]`, capped at max

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Randomization applied on top of a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    /// No jitter (default).
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// Keeps at least half of the delay.
    Equal,
    /// Random delay in `[first, delay * 3]`, capped at `max`.
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `floor` and `cap` are only consulted by [`JitterPolicy::Decorrelated`].
    pub fn apply(&self, delay: Duration, floor: Duration, cap: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                if ms == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rand::rng().random_range(0..=ms))
            }
            JitterPolicy::Equal => {
                let half = ms / 2;
                if half == 0 {
                    return Duration::from_millis(ms);
                }
                Duration::from_millis(half + rand::rng().random_range(0..=half))
            }
            JitterPolicy::Decorrelated => {
                let lo = floor.min(cap).as_millis() as u64;
                let hi = ms.saturating_mul(3).min(cap.as_millis() as u64).max(lo);
                if lo >= hi {
                    return Duration::from_millis(lo);
                }
                Duration::from_millis(rand::rng().random_range(lo..=hi))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR: Duration = Duration::from_millis(100);
    const CAP: Duration = Duration::from_secs(10);

    #[test]
    fn test_none_is_identity() {
        let d = Duration::from_millis(750);
        assert_eq!(JitterPolicy::None.apply(d, FLOOR, CAP), d);
    }

    #[test]
    fn test_full_stays_within_delay() {
        let d = Duration::from_millis(400);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(d, FLOOR, CAP) <= d);
        }
    }

    #[test]
    fn test_equal_keeps_half() {
        let d = Duration::from_millis(1000);
        for _ in 0..100 {
            let j = JitterPolicy::Equal.apply(d, FLOOR, CAP);
            assert!(j >= Duration::from_millis(500));
            assert!(j <= d);
        }
    }

    #[test]
    fn test_decorrelated_respects_floor_and_cap() {
        let d = Duration::from_secs(8);
        for _ in 0..100 {
            let j = JitterPolicy::Decorrelated.apply(d, FLOOR, CAP);
            assert!(j >= FLOOR);
            assert!(j <= CAP);
        }
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(
            JitterPolicy::Full.apply(Duration::ZERO, FLOOR, CAP),
            Duration::ZERO
        );
        assert_eq!(
            JitterPolicy::Equal.apply(Duration::ZERO, FLOOR, CAP),
            Duration::ZERO
        );
    }

    #[test]
    fn test_deserializes_lowercase_names() {
        #[derive(Deserialize)]
        struct Wrap {
            jitter: JitterPolicy,
        }
        let w: Wrap = toml::from_str("jitter = \"equal\"").unwrap();
        assert_eq!(w.jitter, JitterPolicy::Equal);
    }
}
