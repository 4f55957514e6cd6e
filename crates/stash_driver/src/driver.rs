// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for storage-backed cache drivers.
//!
//! [`StashDriver`] defines the uniform surface every backend must satisfy.
//! Backends differ in native capability (explicit timestamp storage vs. a
//! native time-to-live countdown) but must present identical observable
//! cache semantics: the same freshness/grace algorithm, the same
//! duration-tag invalidation, the same error taxonomy.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{DriverResponse, Result};

/// The grace period applied when driver options do not specify one.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(300);

/// How often sweeping drivers scan for expired-and-past-grace entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Trait for stash driver implementations.
///
/// A driver wraps exactly one backend handle and is safe for concurrent
/// calls; backends are trusted to be internally safe and this layer adds no
/// synchronization, timeouts, or retries of its own.
///
/// # Contract
///
/// - [`get`](Self::get) never fails for a missing key; a miss is an absent
///   [`DriverResponse::data`]. It only fails for a malformed stored
///   representation or a backend failure.
/// - [`set`](Self::set) computes the absolute expiry from the duration
///   phrase at write time and fails with
///   [`Error::InvalidDuration`](crate::Error::InvalidDuration) when the
///   phrase does not resolve to a positive remaining lifetime. It returns
///   the value it stored, so a write can be the tail of a
///   compute-store-return chain.
/// - [`delete`](Self::delete) is idempotent; deleting an absent key is not
///   an error.
/// - [`clear`](Self::clear) removes every entry the driver owns.
/// - An entry is only valid for reads presenting the exact duration phrase
///   it was written with; a mismatch deletes the entry and misses.
pub trait StashDriver: Send + Sync {
    /// Reads the entry for `key`, judging freshness against `duration`.
    fn get<T>(&self, key: &str, duration: &str) -> impl Future<Output = Result<DriverResponse<T>>> + Send
    where
        T: DeserializeOwned;

    /// Writes `value` under `key` with an expiry resolved from `duration`,
    /// returning the stored value.
    fn set<T>(&self, key: &str, duration: &str, value: T) -> impl Future<Output = Result<T>> + Send
    where
        T: Serialize + Send;

    /// Removes the entry for `key`, if any.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Removes all entries owned by this driver.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    /// The window after nominal expiry during which stale data is still
    /// served while a refresh runs in the background.
    fn grace_period(&self) -> Duration;

    /// Returns the number of entries, if the backend can count them.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns whether the driver holds no entries, or `None` for backends
    /// that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}
