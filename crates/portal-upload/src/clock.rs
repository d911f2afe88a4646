//! Millisecond clocks used to stamp storage keys.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Wraps a [`Clock`] so that successive stamps are strictly increasing.
///
/// Two files stamped within the same millisecond get consecutive values, so
/// keys derived from the stamp never collide within a process.
pub struct MonotonicKeyClock {
    source: Box<dyn Clock>,
    last: Mutex<Option<i64>>,
}

impl MonotonicKeyClock {
    pub fn new(source: Box<dyn Clock>) -> Self {
        Self {
            source,
            last: Mutex::new(None),
        }
    }

    pub fn system() -> Self {
        Self::new(Box::new(SystemClock))
    }

    /// Next stamp: the source time, or one past the previous stamp if the
    /// source has not moved forward.
    pub fn next_stamp(&self) -> i64 {
        let now = self.source.now_millis();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let stamp = match *last {
            Some(prev) if now <= prev => prev + 1,
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

impl Default for MonotonicKeyClock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Frozen(i64);

    impl Clock for Frozen {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_frozen_source_still_yields_distinct_stamps() {
        let clock = MonotonicKeyClock::new(Box::new(Frozen(1_700_000_000_000)));
        let a = clock.next_stamp();
        let b = clock.next_stamp();
        let c = clock.next_stamp();
        assert_eq!(a, 1_700_000_000_000);
        assert_eq!(b, a + 1);
        assert_eq!(c, a + 2);
    }

    #[test]
    fn test_system_clock_is_close_to_now() {
        let clock = MonotonicKeyClock::system();
        let stamp = clock.next_stamp();
        let now = Utc::now().timestamp_millis();
        assert!((now - stamp).abs() < 5_000);
    }
}
