//! Clocks, real and mocked
//!
//! Token validation always asks a [`Clock`] for the current time so that
//! expiry checks can be exercised deterministically.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

/// Whole seconds since 1970-01-01T00:00:00Z
///
/// This is the representation of the `exp` and `iat` claims.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixTime(pub u64);

impl UnixTime {
    /// The moment `secs` seconds later, saturating at the far future
    #[must_use]
    pub const fn plus_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// The moment `secs` seconds earlier, saturating at the epoch
    #[must_use]
    pub const fn minus_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Adds a duration, ignoring sub-second precision
    #[must_use]
    pub const fn plus(self, duration: Duration) -> Self {
        self.plus_secs(duration.as_secs())
    }
}

impl From<SystemTime> for UnixTime {
    fn from(t: SystemTime) -> Self {
        // Times before the epoch saturate to zero.
        UnixTime(
            t.duration_since(SystemTime::UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        )
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A source of the current time
pub trait Clock {
    /// The current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

/// Wall-clock time from [`SystemTime`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A clock that only moves when told to
///
/// The time is shared, so a clone handed to an `Authority` observes calls to
/// [`advance`][TestClock::advance] made through the original.
#[derive(Clone, Debug, Default)]
pub struct TestClock(Arc<AtomicU64>);

impl Clock for TestClock {
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::Acquire))
    }
}

impl TestClock {
    /// A clock stopped at `time`
    pub fn new(time: UnixTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0)))
    }

    /// Moves the clock to `time`, which may be in the past
    pub fn set(&self, time: UnixTime) {
        self.0.store(time.0, Ordering::Release);
    }

    /// Moves the clock forward by `secs` seconds
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_time_is_a_bare_number_on_the_wire() {
        assert_eq!(serde_json::to_string(&UnixTime(1_700_000_000)).unwrap(), "1700000000");
        assert_eq!(
            serde_json::from_str::<UnixTime>("42").unwrap(),
            UnixTime(42)
        );
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(UnixTime(5).minus_secs(10), UnixTime(0));
        assert_eq!(UnixTime(u64::MAX).plus_secs(1), UnixTime(u64::MAX));
        assert_eq!(UnixTime(5).plus(Duration::from_millis(2_900)), UnixTime(7));
    }

    #[test]
    fn pre_epoch_system_time_is_zero() {
        let before = SystemTime::UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(UnixTime::from(before), UnixTime(0));
    }

    #[test]
    fn clones_of_a_test_clock_share_time() {
        let clock = TestClock::new(UnixTime(100));
        let shared = clock.clone();

        clock.advance(5);
        assert_eq!(shared.now(), UnixTime(105));

        shared.set(UnixTime(1));
        assert_eq!(clock.now(), UnixTime(1));
    }
}
