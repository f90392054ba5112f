use crate::traits::Clock;
use crate::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Shared between threads; reads and writes are atomic.
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            seconds: AtomicU64::new(start.seconds_since_epoch),
        }
    }

    pub fn set(&self, to: Timestamp) {
        self.seconds.store(to.seconds_since_epoch, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        // fetch_update never fails when the closure always returns Some
        let _ = self
            .seconds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                Some(s.saturating_add(seconds))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_seconds(self.seconds.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // 2023-11-14T22:13:20Z
        assert!(SystemClock.now().seconds_since_epoch > 1_700_000_000);
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(Timestamp::from_seconds(1000));
        assert_eq!(clock.now(), Timestamp::from_seconds(1000));
        clock.advance(3600);
        assert_eq!(clock.now(), Timestamp::from_seconds(4600));
        clock.set(Timestamp::from_seconds(5));
        assert_eq!(clock.now(), Timestamp::from_seconds(5));
    }

    #[test]
    fn test_manual_clock_advance_saturates() {
        let clock = ManualClock::new(Timestamp::from_seconds(u64::MAX - 1));
        clock.advance(10);
        assert_eq!(clock.now(), Timestamp::from_seconds(u64::MAX));
    }
}
