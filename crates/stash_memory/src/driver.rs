// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The in-memory driver and its periodic sweep.

use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use stash_driver::{Clock, DriverResponse, DurationResolver, Error, Freshness, Result, StashDriver, StoredEntry};
use tokio::task::JoinHandle;

use crate::InMemoryDriverBuilder;

/// An in-memory stash driver.
///
/// Stores entries with explicit timestamps and applies the shared
/// freshness/grace algorithm on every read. Because nothing evicts entries
/// automatically, a periodic sweep task deletes entries that are expired and
/// past grace; the sweep uses the same expiry predicate as the read path and
/// never blocks caller operations.
///
/// The sweep task is started at construction and halted by
/// [`close`](Self::close) or by dropping the driver. It holds only a weak
/// reference to driver state, so an abandoned driver is not kept alive by
/// its own timer.
///
/// # Examples
///
/// ```
/// use stash_driver::StashDriver;
/// use stash_memory::InMemoryDriver;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let driver = InMemoryDriver::new();
///
/// driver.set("ns~answer", "in 1 hour", 42).await?;
/// let response = driver.get::<i32>("ns~answer", "in 1 hour").await?;
/// assert_eq!(response.data, Some(42));
/// # Ok::<(), stash_driver::Error>(())
/// # });
/// ```
pub struct InMemoryDriver {
    inner: Arc<Inner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct Inner {
    entries: DashMap<String, StoredEntry>,
    grace_period: Duration,
    clock: Clock,
    resolver: Arc<dyn DurationResolver>,
}

impl std::fmt::Debug for InMemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDriver")
            .field("entries", &self.inner.entries.len())
            .field("grace_period", &self.inner.grace_period)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDriver {
    /// Creates a new driver with default settings.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context, because the
    /// sweep task is spawned at construction.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new builder for configuring an in-memory driver.
    #[must_use]
    pub fn builder() -> InMemoryDriverBuilder {
        InMemoryDriverBuilder::new()
    }

    pub(crate) fn from_builder(builder: InMemoryDriverBuilder) -> Self {
        let inner = Arc::new(Inner {
            entries: DashMap::new(),
            grace_period: builder.grace_period,
            clock: builder.clock,
            resolver: builder.resolver,
        });

        let sweeper = spawn_sweeper(Arc::downgrade(&inner), builder.sweep_interval);

        Self {
            inner,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Halts the periodic sweep task.
    ///
    /// Entries already expired past grace are still deleted lazily when
    /// read; only the background reclamation of never-read keys stops.
    /// Calling `close` more than once is a no-op.
    pub fn close(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for InMemoryDriver {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    /// Removes `key` only if its entry still fails to match `duration`.
    ///
    /// Re-checking under the map's entry lock keeps a concurrent rewrite
    /// that lands between judgment and removal from being deleted.
    fn remove_mismatched(&self, key: &str, duration: &str) {
        self.entries.remove_if(key, |_, current| !current.matches_duration(duration));
    }

    /// Removes `key` only if its entry is still expired past grace at `now`.
    fn remove_expired(&self, key: &str, now: SystemTime) {
        self.entries
            .remove_if(key, |_, current| current.freshness(now, self.grace_period) == Freshness::Expired);
    }

    /// Deletes every entry that is expired and past grace.
    ///
    /// Shares the expiry predicate with the read path; the two must never
    /// diverge.
    fn sweep(&self) {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.freshness(now, self.grace_period) != Freshness::Expired);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "swept expired entries");
        }
    }
}

fn spawn_sweeper(inner: Weak<Inner>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else { break };
            inner.sweep();
        }
    })
}

impl StashDriver for InMemoryDriver {
    async fn get<T>(&self, key: &str, duration: &str) -> Result<DriverResponse<T>>
    where
        T: DeserializeOwned,
    {
        let Some(entry) = self.inner.entries.get(key).map(|entry| entry.value().clone()) else {
            return Ok(DriverResponse::miss());
        };

        if !entry.matches_duration(duration) {
            tracing::debug!(key, stored = entry.duration(), requested = duration, "duration mismatch, busting entry");
            self.inner.remove_mismatched(key, duration);
            return Ok(DriverResponse::miss());
        }

        let now = self.inner.clock.now();
        match entry.freshness(now, self.inner.grace_period) {
            Freshness::Expired => {
                self.inner.remove_expired(key, now);
                Ok(DriverResponse::miss())
            }
            state => {
                let data = serde_json::from_str(entry.response()).map_err(|e| Error::malformed_entry(key, e))?;
                Ok(if state == Freshness::InGrace {
                    DriverResponse::stale(data)
                } else {
                    DriverResponse::fresh(data)
                })
            }
        }
    }

    async fn set<T>(&self, key: &str, duration: &str, value: T) -> Result<T>
    where
        T: Serialize + Send,
    {
        let now = self.inner.clock.now();
        let expires_at = self
            .inner
            .resolver
            .resolve(duration, now)
            .filter(|resolved| *resolved > now)
            .ok_or_else(|| Error::invalid_duration(duration))?;

        let response = serde_json::to_string(&value).map_err(|e| Error::malformed_entry(key, e))?;
        self.inner
            .entries
            .insert(key.to_owned(), StoredEntry::new(response, duration, now, expires_at));
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner.entries.clear();
        Ok(())
    }

    fn grace_period(&self) -> Duration {
        self.inner.grace_period
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sweep internals are pub(crate), so these stay as unit tests.

    fn frozen_driver() -> (InMemoryDriver, Clock) {
        let clock = Clock::frozen();
        let driver = InMemoryDriver::builder()
            .grace_period(Duration::from_secs(300))
            .clock(clock.clone())
            .build();
        (driver, clock)
    }

    #[tokio::test]
    async fn sweep_removes_only_entries_past_grace() {
        let (driver, clock) = frozen_driver();

        driver.set("keep", "in 2 hours", 1).await.expect("set failed");
        driver.set("stale", "in 1 hour", 2).await.expect("set failed");

        // One hour plus half the grace window: "stale" is expired but in
        // grace, "keep" is fresh. Neither may be swept.
        clock.advance(Duration::from_secs(3600 + 150));
        driver.inner.sweep();
        assert_eq!(driver.len(), Some(2));

        // Past "stale"'s grace window now.
        clock.advance(Duration::from_secs(150));
        driver.inner.sweep();
        assert_eq!(driver.len(), Some(1));
        assert!(driver.inner.entries.contains_key("keep"));
    }

    #[tokio::test]
    async fn removal_rechecks_entry_before_deleting() {
        let (driver, clock) = frozen_driver();

        driver.set("user", "in 1 hour", 1).await.expect("set failed");

        // A reader judges the first write expired past grace at this time,
        // but a rewrite with a longer lifetime lands before its removal
        // executes. The removal must spare the newer entry.
        let judged_at = clock.now() + Duration::from_secs(3600 + 300);
        driver.set("user", "in 2 hours", 2).await.expect("set failed");

        driver.inner.remove_expired("user", judged_at);
        assert!(driver.inner.entries.contains_key("user"));

        // Same for a mismatch judged against the superseded phrase.
        driver.inner.remove_mismatched("user", "in 2 hours");
        assert!(driver.inner.entries.contains_key("user"));

        // A genuine mismatch still removes.
        driver.inner.remove_mismatched("user", "in 1 hour");
        assert!(!driver.inner.entries.contains_key("user"));
    }

    #[tokio::test]
    async fn sweep_task_stops_when_driver_dropped() {
        let (driver, _clock) = frozen_driver();
        let weak = Arc::downgrade(&driver.inner);
        drop(driver);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (driver, _clock) = frozen_driver();
        driver.close();
        driver.close();
    }
}
