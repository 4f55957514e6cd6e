// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The caching facade.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use stash_driver::{Error, Result, StashDriver};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A namespaced key-value cache with grace-period staleness and background
/// refresh.
///
/// A stash owns a base key and a driver. Every caller-supplied key is
/// namespaced as `base_key~key` before it reaches the driver, so multiple
/// stashes can share one backend without colliding. The concatenation is
/// flat and keys are not validated: a base key of `"a"` with key `"b~c"`
/// lands on the same entry as a base key of `"a~b"` with key `"c"`. Avoid
/// `~` in keys.
///
/// The primary operation is [`wrap`](Self::wrap): pass a key, a duration
/// phrase, and a computation, and the stash serves the cached value when one
/// is live. When an entry has expired but is still within the driver's grace
/// period, the stale value is returned immediately while a single refresh
/// runs in the background. Concurrent misses are not deduplicated; each miss
/// runs the computation.
///
/// Cloning is cheap and clones share the driver.
///
/// # Examples
///
/// ```
/// use stash::Stash;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let stash = Stash::new("prices");
///
/// let price = stash.wrap("gold", "in 10 minutes", || async { 1987 }).await?;
/// assert_eq!(price, 1987);
///
/// // A second call within ten minutes is served from the cache.
/// let price = stash.wrap("gold", "in 10 minutes", || async { 0 }).await?;
/// assert_eq!(price, 1987);
/// # Ok::<(), stash::Error>(())
/// # });
/// ```
pub struct Stash<D> {
    base_key: String,
    driver: Arc<D>,
}

impl<D> Clone for Stash<D> {
    fn clone(&self) -> Self {
        Self {
            base_key: self.base_key.clone(),
            driver: Arc::clone(&self.driver),
        }
    }
}

impl<D> std::fmt::Debug for Stash<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stash").field("base_key", &self.base_key).finish_non_exhaustive()
    }
}

#[cfg(feature = "memory")]
impl Stash<stash_memory::InMemoryDriver> {
    /// Creates a stash over a fresh in-memory driver.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context, because the
    /// in-memory driver spawns its sweep task at construction.
    #[must_use]
    pub fn new(base_key: impl Into<String>) -> Self {
        Self::with_driver(base_key, stash_memory::InMemoryDriver::new())
    }
}

impl<D> Stash<D> {
    /// Creates a stash over an existing driver.
    pub fn with_driver(base_key: impl Into<String>, driver: D) -> Self {
        Self {
            base_key: base_key.into(),
            driver: Arc::new(driver),
        }
    }

    /// The storage-layer key for a caller-supplied key.
    fn entry_key(&self, key: &str) -> String {
        format!("{}~{key}", self.base_key)
    }

    /// The driver behind this stash.
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D> Stash<D>
where
    D: StashDriver + 'static,
{
    /// Returns the cached value for `key`, or computes, stores, and returns
    /// it.
    ///
    /// On a fresh hit the cached value is returned without running the
    /// computation. When the entry has expired but is within the grace
    /// period, the stale value is returned immediately and the computation
    /// runs once in the background to replace it; a failed refresh is logged
    /// and not retried. On a miss the computation runs in the caller's
    /// future and its result is stored before being returned.
    ///
    /// # Errors
    ///
    /// Fails when the duration phrase does not resolve, the stored entry is
    /// malformed, or the backend fails. On a miss the value is only returned
    /// once it has been stored; a failed store fails the call.
    pub async fn wrap<T, F, Fut>(&self, key: &str, duration: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.try_wrap(key, duration, move || async move { Ok::<T, std::convert::Infallible>(producer().await) })
            .await
    }

    /// Like [`wrap`](Self::wrap), for computations that can fail.
    ///
    /// A computation failure on a miss propagates as
    /// [`Error::Producer`] and nothing is cached. A computation failure
    /// during a background refresh is logged and not retried; the next read
    /// within grace serves stale data and triggers a new refresh.
    ///
    /// # Errors
    ///
    /// Fails when the computation fails on a miss, the duration phrase does
    /// not resolve, the stored entry is malformed, or the backend fails.
    pub async fn try_wrap<T, E, F, Fut>(&self, key: &str, duration: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Into<BoxError> + Send,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let entry_key = self.entry_key(key);
        let response = self.driver.get::<T>(&entry_key, duration).await?;

        match response.data {
            Some(data) if !response.in_grace_period => Ok(data),
            Some(stale) => {
                self.spawn_refresh(entry_key, duration.to_owned(), producer);
                Ok(stale)
            }
            None => {
                let produced = producer().await.map_err(|e| Error::producer(&entry_key, e))?;
                self.driver.set(&entry_key, duration, produced).await
            }
        }
    }

    /// Runs the computation in a detached task and stores the result.
    ///
    /// Fire-and-forget: the caller has already been handed the stale value,
    /// so failures here can only be logged.
    fn spawn_refresh<T, E, F, Fut>(&self, entry_key: String, duration: String, producer: F)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Into<BoxError> + Send,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        drop(tokio::spawn(async move {
            match producer().await {
                Ok(value) => {
                    if let Err(e) = driver.set(&entry_key, &duration, value).await {
                        tracing::error!(key = %entry_key, error = %e, "background refresh could not store result");
                    }
                }
                Err(e) => {
                    let e = e.into();
                    tracing::error!(key = %entry_key, error = %e, "background refresh failed");
                }
            }
        }));
    }

    /// Reads the cached value for `key` without computing anything.
    ///
    /// Returns stale-in-grace data like a regular hit; no refresh is
    /// triggered because there is no computation to run.
    ///
    /// # Errors
    ///
    /// Fails when the stored entry is malformed or the backend fails.
    pub async fn get<T>(&self, key: &str, duration: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.driver.get::<T>(&self.entry_key(key), duration).await?;
        Ok(response.data)
    }

    /// Stores `value` under `key` with an expiry resolved from `duration`,
    /// returning the stored value.
    ///
    /// # Errors
    ///
    /// Fails when the duration phrase does not resolve to a positive
    /// remaining lifetime or the backend fails.
    pub async fn set<T>(&self, key: &str, duration: &str, value: T) -> Result<T>
    where
        T: Serialize + Send,
    {
        self.driver.set(&self.entry_key(key), duration, value).await
    }

    /// Removes the entry for `key`, if any. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails when the backend fails.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.driver.delete(&self.entry_key(key)).await
    }

    /// Removes every entry the driver owns.
    ///
    /// This clears the whole backend, not just this stash's namespace;
    /// other stashes sharing the driver lose their entries too.
    ///
    /// # Errors
    ///
    /// Fails when the backend fails.
    pub async fn clear(&self) -> Result<()> {
        self.driver.clear().await
    }
}
