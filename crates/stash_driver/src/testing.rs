// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock driver implementation for testing.
//!
//! This module provides [`MockDriver`], a configurable in-memory driver that
//! records all operations and supports failure injection and staleness
//! control for testing the facade's grace-period behavior.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{DEFAULT_GRACE_PERIOD, DriverResponse, Error, Result, StashDriver};

/// Recorded driver operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOp {
    /// A get was performed with the given key and duration phrase.
    Get {
        /// The storage-layer key that was read.
        key: String,
        /// The duration phrase the read presented.
        duration: String,
    },
    /// A set was performed with the given key and duration phrase.
    Set {
        /// The storage-layer key that was written.
        key: String,
        /// The duration phrase the write carried.
        duration: String,
    },
    /// A delete was performed with the given key.
    Delete(String),
    /// A clear was performed.
    Clear,
}

type FailPredicate = Box<dyn Fn(&DriverOp) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
struct MockEntry {
    response: String,
    duration: String,
}

/// A configurable mock driver for testing.
///
/// Stores serialized values in memory, records every operation, and can be
/// configured to fail operations on demand or to report specific keys as
/// stale-in-grace. Clones share state, so a test can hand one clone to a
/// `Stash` and inspect the other.
///
/// # Examples
///
/// ```
/// use stash_driver::testing::MockDriver;
/// use stash_driver::StashDriver;
///
/// # futures::executor::block_on(async {
/// let driver = MockDriver::new();
///
/// driver.set("ns~key", "in 1 hour", 42).await?;
/// let response = driver.get::<i32>("ns~key", "in 1 hour").await?;
/// assert_eq!(response.data, Some(42));
///
/// assert_eq!(driver.operations().len(), 2);
/// # Ok::<(), stash_driver::Error>(())
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockDriver {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    entries: Mutex<HashMap<String, MockEntry>>,
    stale_keys: Mutex<HashSet<String>>,
    operations: Mutex<Vec<DriverOp>>,
    fail_when: Mutex<Option<FailPredicate>>,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("entries", &self.inner.entries.lock().len())
            .field("operations", &self.inner.operations.lock().len())
            .field("fail_when", &self.inner.fail_when.lock().is_some())
            .finish()
    }
}

impl MockDriver {
    /// Creates a new empty mock driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` so that subsequent reads report it stale-but-in-grace.
    pub fn mark_stale(&self, key: impl Into<String>) {
        self.inner.stale_keys.lock().insert(key.into());
    }

    /// Clears the staleness marker for `key`.
    pub fn clear_stale(&self, key: &str) {
        self.inner.stale_keys.lock().remove(key);
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should
    /// fail with a backend error.
    ///
    /// # Examples
    ///
    /// ```
    /// use stash_driver::testing::{DriverOp, MockDriver};
    ///
    /// let driver = MockDriver::new();
    ///
    /// // Fail all sets
    /// driver.fail_when(|op| matches!(op, DriverOp::Set { .. }));
    ///
    /// // Fail gets for a specific key
    /// driver.fail_when(|op| matches!(op, DriverOp::Get { key, .. } if key == "ns~bad"));
    /// ```
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&DriverOp) -> bool + Send + Sync + 'static,
    {
        *self.inner.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.inner.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<DriverOp> {
        self.inner.operations.lock().clone()
    }

    /// Returns how many sets were recorded for the given key.
    #[must_use]
    pub fn set_count(&self, key: &str) -> usize {
        self.inner
            .operations
            .lock()
            .iter()
            .filter(|op| matches!(op, DriverOp::Set { key: k, .. } if k == key))
            .count()
    }

    /// Returns true if the driver contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    fn record(&self, op: DriverOp) {
        self.inner.operations.lock().push(op);
    }

    fn should_fail(&self, op: &DriverOp) -> bool {
        self.inner.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }
}

impl StashDriver for MockDriver {
    async fn get<T>(&self, key: &str, duration: &str) -> Result<DriverResponse<T>>
    where
        T: DeserializeOwned,
    {
        let op = DriverOp::Get {
            key: key.to_owned(),
            duration: duration.to_owned(),
        };
        if self.should_fail(&op) {
            self.record(op);
            return Err(Error::backend("mock: get failed"));
        }
        self.record(op);

        let Some(entry) = self.inner.entries.lock().get(key).cloned() else {
            return Ok(DriverResponse::miss());
        };
        if entry.duration != duration {
            self.inner.entries.lock().remove(key);
            return Ok(DriverResponse::miss());
        }

        let data = serde_json::from_str(&entry.response).map_err(|e| Error::malformed_entry(key, e))?;
        if self.inner.stale_keys.lock().contains(key) {
            Ok(DriverResponse::stale(data))
        } else {
            Ok(DriverResponse::fresh(data))
        }
    }

    async fn set<T>(&self, key: &str, duration: &str, value: T) -> Result<T>
    where
        T: Serialize + Send,
    {
        let op = DriverOp::Set {
            key: key.to_owned(),
            duration: duration.to_owned(),
        };
        if self.should_fail(&op) {
            self.record(op);
            return Err(Error::backend("mock: set failed"));
        }
        self.record(op);

        let response = serde_json::to_string(&value).map_err(|e| Error::malformed_entry(key, e))?;
        self.inner.entries.lock().insert(
            key.to_owned(),
            MockEntry {
                response,
                duration: duration.to_owned(),
            },
        );
        // A fresh write supersedes any staleness marker.
        self.clear_stale(key);
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let op = DriverOp::Delete(key.to_owned());
        if self.should_fail(&op) {
            self.record(op);
            return Err(Error::backend("mock: delete failed"));
        }
        self.record(op);
        self.inner.entries.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let op = DriverOp::Clear;
        if self.should_fail(&op) {
            self.record(op);
            return Err(Error::backend("mock: clear failed"));
        }
        self.record(op);
        self.inner.entries.lock().clear();
        Ok(())
    }

    fn grace_period(&self) -> Duration {
        DEFAULT_GRACE_PERIOD
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entries.lock().len() as u64)
    }
}
