// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time abstraction for deterministic expiry decisions.
//!
//! All freshness checks and expiry computations go through a [`Clock`] so
//! that tests can freeze and advance time instead of sleeping. In production
//! the clock reads the system time with no overhead beyond a match.

use std::sync::Arc;
use std::time::SystemTime;
#[cfg(any(feature = "test-util", test))]
use std::time::Duration;

#[cfg(any(feature = "test-util", test))]
use parking_lot::Mutex;

/// Provides the current absolute time to drivers and sweeps.
///
/// Cloning a clock is inexpensive (an `Arc` clone) and every clone shares the
/// same underlying state: advancing a frozen clock through one clone is
/// visible to every other clone created from it.
///
/// # Testing
///
/// With the `test-util` feature enabled, `Clock::frozen` and
/// `Clock::frozen_at` create clocks whose time only moves when
/// `Clock::advance` is called, making expiry tests fast and exact.
#[derive(Debug, Clone)]
pub struct Clock(Arc<ClockState>);

#[derive(Debug)]
enum ClockState {
    System,
    #[cfg(any(feature = "test-util", test))]
    Frozen(Mutex<SystemTime>),
}

impl Clock {
    /// Creates a clock that reads the real system time.
    #[must_use]
    pub fn system() -> Self {
        Self(Arc::new(ClockState::System))
    }

    /// Creates a frozen clock starting at the current system time.
    ///
    /// The returned clock does not advance on its own; use
    /// [`advance`](Self::advance) to move it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use stash_driver::Clock;
    ///
    /// let clock = Clock::frozen();
    /// let before = clock.now();
    /// clock.advance(Duration::from_secs(3600));
    /// assert_eq!(clock.now(), before + Duration::from_secs(3600));
    /// ```
    #[cfg(any(feature = "test-util", test))]
    #[must_use]
    pub fn frozen() -> Self {
        Self::frozen_at(SystemTime::now())
    }

    /// Creates a frozen clock at the specified timestamp.
    #[cfg(any(feature = "test-util", test))]
    #[must_use]
    pub fn frozen_at(time: impl Into<SystemTime>) -> Self {
        Self(Arc::new(ClockState::Frozen(Mutex::new(time.into()))))
    }

    /// Retrieves the current time according to this clock.
    #[must_use]
    pub fn now(&self) -> SystemTime {
        match self.0.as_ref() {
            ClockState::System => SystemTime::now(),
            #[cfg(any(feature = "test-util", test))]
            ClockState::Frozen(time) => *time.lock(),
        }
    }

    /// Advances a frozen clock by the given duration.
    ///
    /// # Panics
    ///
    /// Panics if called on a system clock; real time cannot be steered.
    #[cfg(any(feature = "test-util", test))]
    #[expect(clippy::panic, reason = "misusing the test clock is a programming error, not a runtime condition")]
    pub fn advance(&self, duration: Duration) {
        match self.0.as_ref() {
            ClockState::System => panic!("advance requires a frozen clock"),
            ClockState::Frozen(time) => {
                let mut time = time.lock();
                *time = time.checked_add(duration).unwrap_or(*time);
            }
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
