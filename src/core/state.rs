//! # Fleet progress counters.
//!
//! [`SharedState`] holds `processed` and `total` behind one lock so a
//! progress read never observes a half-applied update. Each operation
//! manager owns its own instance; the runner resets it at the start of
//! every run.

use parking_lot::Mutex;

/// Consistent view of the counters taken under the lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Default)]
struct Counters {
    processed: usize,
    total: usize,
}

impl Counters {
    fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.processed as u128 * 100) / self.total as u128;
        pct.min(100) as u8
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed,
            total: self.total,
            percent: self.percent(),
        }
    }
}

/// Thread-safe progress counters for one fleet run.
#[derive(Default)]
pub struct SharedState {
    inner: Mutex<Counters>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes `processed` and sets `total`.
    pub fn reset(&self, total: usize) {
        let mut c = self.inner.lock();
        c.processed = 0;
        c.total = total;
    }

    pub fn set_total_devices(&self, total: usize) {
        self.inner.lock().total = total;
    }

    /// Increments `processed` and returns the new count.
    pub fn increment_processed_devices(&self) -> usize {
        self.advance().processed
    }

    /// Increments `processed` and returns the counters as seen right after.
    pub fn advance(&self) -> ProgressSnapshot {
        let mut c = self.inner.lock();
        c.processed += 1;
        c.snapshot()
    }

    /// `floor(100 * processed / total)`, or 0 when `total` is 0.
    pub fn calculate_progress(&self) -> u8 {
        self.inner.lock().percent()
    }

    pub fn get_total_devices(&self) -> usize {
        self.inner.lock().total
    }

    pub fn get_processed_devices(&self) -> usize {
        self.inner.lock().processed
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_zero_total_is_zero_percent() {
        let s = SharedState::new();
        assert_eq!(s.calculate_progress(), 0);
        s.increment_processed_devices();
        assert_eq!(s.calculate_progress(), 0);
    }

    #[test]
    fn test_progress_is_floored() {
        let s = SharedState::new();
        s.reset(3);
        assert_eq!(s.increment_processed_devices(), 1);
        assert_eq!(s.calculate_progress(), 33);
        s.increment_processed_devices();
        assert_eq!(s.calculate_progress(), 66);
        let last = s.advance();
        assert_eq!(last, ProgressSnapshot { processed: 3, total: 3, percent: 100 });
    }

    #[test]
    fn test_reset_zeroes_processed() {
        let s = SharedState::new();
        s.reset(2);
        s.increment_processed_devices();
        s.reset(5);
        assert_eq!(s.get_processed_devices(), 0);
        assert_eq!(s.get_total_devices(), 5);
        s.set_total_devices(4);
        assert_eq!(s.get_total_devices(), 4);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let s = Arc::new(SharedState::new());
        s.reset(800);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        s.increment_processed_devices();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(s.get_processed_devices(), 800);
        assert_eq!(s.calculate_progress(), 100);
    }
}
