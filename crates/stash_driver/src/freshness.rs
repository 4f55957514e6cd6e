// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The shared freshness/grace predicate.
//!
//! Every backend that stores an explicit expiry timestamp must reproduce the
//! same expiration algorithm, on the read path and in the periodic sweep
//! alike. Keeping the predicate in one place is what prevents the two from
//! drifting apart.
//!
//! Backends with a native time-to-live countdown (redis) cannot compare
//! timestamps because the stored entry carries none. They encode freshness
//! and grace into a single countdown set at write time to
//! `(resolved_expiry - now) + grace_period` and recover the state from the
//! remaining countdown at read time via [`Freshness::from_remaining_ttl`].
//! The two formulations are equivalent: a remaining countdown of
//! `grace_period` corresponds exactly to `now == expires_at`. Any change to
//! one side must preserve this arithmetic or grace-period length will drift.

use std::time::{Duration, SystemTime};

/// The lifecycle state of a cache entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The entry has not yet reached its expiry timestamp.
    Fresh,
    /// The entry has expired but is still within the grace window and may be
    /// served as stale data while a refresh runs.
    InGrace,
    /// The entry has expired past the grace window and must be deleted.
    Expired,
}

impl Freshness {
    /// Evaluates the freshness of an entry from its expiry timestamp.
    ///
    /// The algorithm, identical for every timestamp-based backend:
    /// an entry has expired once `now` is past `expires_at`; an expired entry
    /// is in grace while `now` is before `expires_at + grace_period`; an
    /// expired entry past grace is gone.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, SystemTime};
    /// use stash_driver::Freshness;
    ///
    /// let now = SystemTime::now();
    /// let grace = Duration::from_secs(300);
    ///
    /// let expires_at = now + Duration::from_secs(60);
    /// assert_eq!(Freshness::evaluate(now, expires_at, grace), Freshness::Fresh);
    ///
    /// let expires_at = now - Duration::from_secs(60);
    /// assert_eq!(Freshness::evaluate(now, expires_at, grace), Freshness::InGrace);
    ///
    /// let expires_at = now - Duration::from_secs(600);
    /// assert_eq!(Freshness::evaluate(now, expires_at, grace), Freshness::Expired);
    /// ```
    #[must_use]
    pub fn evaluate(now: SystemTime, expires_at: SystemTime, grace_period: Duration) -> Self {
        if now <= expires_at {
            return Self::Fresh;
        }
        match expires_at.checked_add(grace_period) {
            Some(grace_expires_at) if now >= grace_expires_at => Self::Expired,
            // A grace window that overflows `SystemTime` never closes.
            _ => Self::InGrace,
        }
    }

    /// Evaluates freshness from the remaining grace-inclusive countdown of a
    /// native-TTL backend.
    ///
    /// A remaining countdown of zero means the backend has already deleted
    /// the key (or is about to); a countdown within the grace period means
    /// the nominal expiry has passed and the entry is stale-but-servable;
    /// anything larger is fresh.
    #[must_use]
    pub fn from_remaining_ttl(remaining: Duration, grace_period: Duration) -> Self {
        if remaining.is_zero() {
            Self::Expired
        } else if remaining <= grace_period {
            Self::InGrace
        } else {
            Self::Fresh
        }
    }
}

/// Computes the grace-inclusive countdown a native-TTL backend must set at
/// write time: `(expires_at - now) + grace_period`.
///
/// Returns `None` when the resolved expiry does not leave a positive
/// remaining lifetime, which the caller must reject as an invalid duration.
#[must_use]
pub fn grace_inclusive_ttl(now: SystemTime, expires_at: SystemTime, grace_period: Duration) -> Option<Duration> {
    let remaining = expires_at.duration_since(now).ok()?;
    if remaining.is_zero() {
        return None;
    }
    remaining.checked_add(grace_period)
}
