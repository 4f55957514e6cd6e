// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring SQLite drivers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use stash_driver::{Clock, DEFAULT_GRACE_PERIOD, DEFAULT_SWEEP_INTERVAL, DurationResolver, HumanDurations, Result};

use crate::SqliteDriver;

/// Builder for configuring a [`SqliteDriver`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stash_sqlite::SqliteDriver;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let driver = SqliteDriver::builder()
///     .grace_period(Duration::from_secs(60))
///     .open_in_memory()?;
/// # Ok::<(), stash_driver::Error>(())
/// # });
/// ```
pub struct SqliteDriverBuilder {
    pub(crate) grace_period: Duration,
    pub(crate) sweep_interval: Duration,
    pub(crate) clock: Clock,
    pub(crate) resolver: Arc<dyn DurationResolver>,
}

impl std::fmt::Debug for SqliteDriverBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriverBuilder")
            .field("grace_period", &self.grace_period)
            .field("sweep_interval", &self.sweep_interval)
            .finish_non_exhaustive()
    }
}

impl Default for SqliteDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteDriverBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Defaults: a 300 second grace period, a 1 second sweep interval, the
    /// system clock, and the [`HumanDurations`] resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            clock: Clock::system(),
            resolver: Arc::new(HumanDurations),
        }
    }

    /// Sets the grace period during which expired entries are still served
    /// as stale data.
    #[must_use]
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Sets how often the sweep task scans for expired-and-past-grace
    /// entries.
    #[must_use]
    pub fn sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Sets the clock used for expiry decisions.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the duration resolver consulted at write time.
    #[must_use]
    pub fn resolver(mut self, resolver: impl DurationResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Opens (or creates) the database at `path` and starts the sweep task.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// cannot be prepared.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context, because the
    /// sweep task is spawned at construction.
    pub fn open(self, path: impl AsRef<Path>) -> Result<SqliteDriver> {
        SqliteDriver::from_builder(self, Some(path.as_ref()))
    }

    /// Opens a transient in-memory database and starts the sweep task.
    ///
    /// The database lives only as long as the driver. Useful for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// cannot be prepared.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context, because the
    /// sweep task is spawned at construction.
    pub fn open_in_memory(self) -> Result<SqliteDriver> {
        SqliteDriver::from_builder(self, None)
    }
}
