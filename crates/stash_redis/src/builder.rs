// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring Redis drivers.

use std::sync::Arc;
use std::time::Duration;

use stash_driver::{Clock, DEFAULT_GRACE_PERIOD, DurationResolver, HumanDurations, Result};

use crate::RedisDriver;

/// Builder for configuring a [`RedisDriver`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use stash_redis::RedisDriver;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let driver = RedisDriver::builder()
///     .grace_period(Duration::from_secs(60))
///     .connect("redis://127.0.0.1/")
///     .await?;
/// # Ok::<(), stash_driver::Error>(())
/// # });
/// ```
pub struct RedisDriverBuilder {
    pub(crate) grace_period: Duration,
    pub(crate) clock: Clock,
    pub(crate) resolver: Arc<dyn DurationResolver>,
}

impl std::fmt::Debug for RedisDriverBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisDriverBuilder")
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

impl Default for RedisDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RedisDriverBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Defaults: a 300 second grace period, the system clock, and the
    /// [`HumanDurations`] resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
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

    /// Sets the clock used when resolving duration phrases at write time.
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

    /// Connects to the Redis server at `url`.
    ///
    /// The connection is managed and reconnects automatically after
    /// transient failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the initial connection
    /// cannot be established.
    pub async fn connect(self, url: impl AsRef<str>) -> Result<RedisDriver> {
        RedisDriver::from_builder(self, url.as_ref()).await
    }
}
