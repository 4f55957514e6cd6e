// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory drivers.

use std::sync::Arc;
use std::time::Duration;

use stash_driver::{Clock, DEFAULT_GRACE_PERIOD, DEFAULT_SWEEP_INTERVAL, DurationResolver, HumanDurations};

use crate::InMemoryDriver;

/// Builder for configuring an [`InMemoryDriver`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stash_memory::InMemoryDriver;
///
/// # let _rt = tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let driver = InMemoryDriver::builder()
///     .grace_period(Duration::from_secs(60))
///     .sweep_interval(Duration::from_millis(500))
///     .build();
/// # });
/// ```
pub struct InMemoryDriverBuilder {
    pub(crate) grace_period: Duration,
    pub(crate) sweep_interval: Duration,
    pub(crate) clock: Clock,
    pub(crate) resolver: Arc<dyn DurationResolver>,
}

impl std::fmt::Debug for InMemoryDriverBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDriverBuilder")
            .field("grace_period", &self.grace_period)
            .field("sweep_interval", &self.sweep_interval)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDriverBuilder {
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

    /// Constructs the driver and starts its sweep task.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context, because the
    /// sweep task is spawned at construction.
    #[must_use]
    pub fn build(self) -> InMemoryDriver {
        InMemoryDriver::from_builder(self)
    }
}
