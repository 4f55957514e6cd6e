// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The Redis driver.
//!
//! Unlike the timestamp-based backends, this driver stores no expiry
//! timestamp at all. Freshness and grace are folded into the key's native
//! countdown: at write time the key's time-to-live is set to
//! `(resolved_expiry - now) + grace_period`, and at read time the remaining
//! countdown is compared against the grace period. A remaining countdown
//! within the grace period means the nominal expiry has passed and the entry
//! is stale-but-servable. Redis deletes the key itself once the countdown
//! runs out, so there is no periodic sweep here.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use stash_driver::{Clock, DriverResponse, DurationResolver, Error, Freshness, Result, StashDriver, grace_inclusive_ttl};

use crate::RedisDriverBuilder;

const RESPONSE_FIELD: &str = "response";
const DURATION_FIELD: &str = "duration";

/// A stash driver backed by a Redis server.
///
/// Each entry is a hash with `response` and `duration` fields; expiration
/// rides on the key's native time-to-live, extended by the grace period so
/// that the server keeps the value servable while it is stale. The driver
/// holds a managed connection that reconnects automatically.
///
/// # Examples
///
/// ```no_run
/// use stash_driver::StashDriver;
/// use stash_redis::RedisDriver;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let driver = RedisDriver::connect("redis://127.0.0.1/").await?;
///
/// driver.set("ns~answer", "in 1 hour", 42).await?;
/// let response = driver.get::<i32>("ns~answer", "in 1 hour").await?;
/// assert_eq!(response.data, Some(42));
/// # Ok::<(), stash_driver::Error>(())
/// # });
/// ```
#[derive(Clone)]
pub struct RedisDriver {
    conn: ConnectionManager,
    grace_period: Duration,
    clock: Clock,
    resolver: Arc<dyn DurationResolver>,
}

impl std::fmt::Debug for RedisDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisDriver")
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

impl RedisDriver {
    /// Connects to the Redis server at `url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the initial connection
    /// cannot be established.
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        Self::builder().connect(url).await
    }

    /// Creates a new builder for configuring a Redis driver.
    #[must_use]
    pub fn builder() -> RedisDriverBuilder {
        RedisDriverBuilder::new()
    }

    pub(crate) async fn from_builder(builder: RedisDriverBuilder, url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::backend)?;
        let conn = ConnectionManager::new(client).await.map_err(Error::backend)?;
        Ok(Self {
            conn,
            grace_period: builder.grace_period,
            clock: builder.clock,
            resolver: builder.resolver,
        })
    }
}

/// Rounds a countdown up to whole seconds for `EXPIRE`.
fn ttl_seconds(ttl: Duration) -> i64 {
    let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

impl StashDriver for RedisDriver {
    async fn get<T>(&self, key: &str, duration: &str) -> Result<DriverResponse<T>>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.conn.clone();

        let (response, stored_duration): (Option<String>, Option<String>) = redis::cmd("HMGET")
            .arg(key)
            .arg(RESPONSE_FIELD)
            .arg(DURATION_FIELD)
            .query_async(&mut conn)
            .await
            .map_err(Error::backend)?;

        let (Some(response), Some(stored_duration)) = (response, stored_duration) else {
            return Ok(DriverResponse::miss());
        };

        if stored_duration != duration {
            tracing::debug!(key, stored = %stored_duration, requested = duration, "duration mismatch, busting entry");
            self.delete(key).await?;
            return Ok(DriverResponse::miss());
        }

        // TTL returns -2 for a missing key (expired since the HMGET) and -1
        // for a key with no countdown, which set() never produces.
        let remaining: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await.map_err(Error::backend)?;
        let remaining = match remaining {
            -2 => return Ok(DriverResponse::miss()),
            -1 => Duration::MAX,
            secs => Duration::from_secs(u64::try_from(secs).unwrap_or(0)),
        };

        match Freshness::from_remaining_ttl(remaining, self.grace_period) {
            Freshness::Expired => Ok(DriverResponse::miss()),
            state => {
                let data = serde_json::from_str(&response).map_err(|e| Error::malformed_entry(key, e))?;
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
        let now = self.clock.now();
        let expires_at = self
            .resolver
            .resolve(duration, now)
            .ok_or_else(|| Error::invalid_duration(duration))?;
        let ttl = grace_inclusive_ttl(now, expires_at, self.grace_period)
            .ok_or_else(|| Error::invalid_duration(duration))?;

        let response = serde_json::to_string(&value).map_err(|e| Error::malformed_entry(key, e))?;

        let mut conn = self.conn.clone();
        redis::pipe()
            .hset(key, RESPONSE_FIELD, response)
            .ignore()
            .hset(key, DURATION_FIELD, duration)
            .ignore()
            .expire(key, ttl_seconds(ttl))
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(Error::backend)?;
        Ok(value)
    }

    /// Deletes `key`, swallowing backend failures.
    ///
    /// A failed delete leaves at worst an entry that expires on its own;
    /// callers must not fail over it.
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let outcome: redis::RedisResult<()> = redis::cmd("DEL").arg(key).query_async(&mut conn).await;
        if let Err(e) = outcome {
            tracing::warn!(key, error = %e, "delete failed");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await.map_err(Error::backend)?;
        Ok(())
    }

    fn grace_period(&self) -> Duration {
        self.grace_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_seconds_rounds_partial_seconds_up() {
        assert_eq!(ttl_seconds(Duration::from_secs(60)), 60);
        assert_eq!(ttl_seconds(Duration::from_millis(60_500)), 61);
        assert_eq!(ttl_seconds(Duration::from_nanos(1)), 1);
    }
}
