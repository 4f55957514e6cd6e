// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The SQLite driver and its periodic sweep.

use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use stash_driver::{Clock, DriverResponse, DurationResolver, Error, Freshness, Result, StashDriver};
use tokio::task::JoinHandle;

use crate::SqliteDriverBuilder;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS stash_entries (
    key        TEXT PRIMARY KEY,
    response   TEXT NOT NULL,
    duration   TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
)";

/// A stash driver backed by an embedded SQLite database.
///
/// Entries survive process restarts when opened against a file. Timestamps
/// are stored as Unix milliseconds; freshness is always judged in Rust with
/// the shared predicate from `stash_driver`, never in SQL, so the read path
/// and the sweep cannot drift apart.
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
/// use stash_sqlite::SqliteDriver;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let driver = SqliteDriver::open_in_memory()?;
///
/// driver.set("ns~answer", "in 1 hour", 42).await?;
/// let response = driver.get::<i32>("ns~answer", "in 1 hour").await?;
/// assert_eq!(response.data, Some(42));
/// # Ok::<(), stash_driver::Error>(())
/// # });
/// ```
pub struct SqliteDriver {
    inner: Arc<Inner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct Inner {
    conn: Mutex<Connection>,
    grace_period: Duration,
    clock: Clock,
    resolver: Arc<dyn DurationResolver>,
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("grace_period", &self.inner.grace_period)
            .finish_non_exhaustive()
    }
}

impl SqliteDriver {
    /// Opens (or creates) the database at `path` with default settings.
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
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().open(path)
    }

    /// Opens a transient in-memory database with default settings.
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
    pub fn open_in_memory() -> Result<Self> {
        Self::builder().open_in_memory()
    }

    /// Creates a new builder for configuring a SQLite driver.
    #[must_use]
    pub fn builder() -> SqliteDriverBuilder {
        SqliteDriverBuilder::new()
    }

    pub(crate) fn from_builder(builder: SqliteDriverBuilder, path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(Error::backend)?;
        conn.execute_batch(SCHEMA).map_err(Error::backend)?;

        let inner = Arc::new(Inner {
            conn: Mutex::new(conn),
            grace_period: builder.grace_period,
            clock: builder.clock,
            resolver: builder.resolver,
        });

        let sweeper = spawn_sweeper(Arc::downgrade(&inner), builder.sweep_interval);

        Ok(Self {
            inner,
            sweeper: Mutex::new(Some(sweeper)),
        })
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

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        self.close();
    }
}

fn to_unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

fn from_unix_millis(millis: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}

impl Inner {
    /// Deletes every entry that is expired and past grace.
    ///
    /// Candidate rows are selected by timestamp but the final decision is
    /// made with the same predicate the read path uses.
    fn sweep(&self) -> Result<()> {
        let now = self.clock.now();
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare_cached("SELECT key, expires_at FROM stash_entries")
            .map_err(Error::backend)?;
        let expired = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(Error::backend)?
            .filter_map(std::result::Result::ok)
            .filter(|(_, expires_at)| {
                Freshness::evaluate(now, from_unix_millis(*expires_at), self.grace_period) == Freshness::Expired
            })
            .map(|(key, _)| key)
            .collect::<Vec<_>>();
        drop(stmt);

        for key in &expired {
            conn.execute("DELETE FROM stash_entries WHERE key = ?1", params![key])
                .map_err(Error::backend)?;
        }
        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "swept expired entries");
        }
        Ok(())
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
            if let Err(e) = inner.sweep() {
                tracing::warn!(error = %e, "sweep pass failed");
            }
        }
    })
}

impl StashDriver for SqliteDriver {
    async fn get<T>(&self, key: &str, duration: &str) -> Result<DriverResponse<T>>
    where
        T: DeserializeOwned,
    {
        let conn = self.inner.conn.lock();

        let row = conn
            .query_row(
                "SELECT response, duration, expires_at FROM stash_entries WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(Error::backend)?;

        let Some((response, stored_duration, expires_at)) = row else {
            return Ok(DriverResponse::miss());
        };

        if stored_duration != duration {
            tracing::debug!(key, stored = %stored_duration, requested = duration, "duration mismatch, busting entry");
            conn.execute("DELETE FROM stash_entries WHERE key = ?1", params![key])
                .map_err(Error::backend)?;
            return Ok(DriverResponse::miss());
        }

        match Freshness::evaluate(self.inner.clock.now(), from_unix_millis(expires_at), self.inner.grace_period) {
            Freshness::Expired => {
                conn.execute("DELETE FROM stash_entries WHERE key = ?1", params![key])
                    .map_err(Error::backend)?;
                Ok(DriverResponse::miss())
            }
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
        let now = self.inner.clock.now();
        let expires_at = self
            .inner
            .resolver
            .resolve(duration, now)
            .filter(|resolved| *resolved > now)
            .ok_or_else(|| Error::invalid_duration(duration))?;

        let response = serde_json::to_string(&value).map_err(|e| Error::malformed_entry(key, e))?;

        self.inner
            .conn
            .lock()
            .execute(
                "INSERT INTO stash_entries (key, response, duration, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                     response = excluded.response,
                     duration = excluded.duration,
                     created_at = excluded.created_at,
                     expires_at = excluded.expires_at",
                params![key, response, duration, to_unix_millis(now), to_unix_millis(expires_at)],
            )
            .map_err(Error::backend)?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner
            .conn
            .lock()
            .execute("DELETE FROM stash_entries WHERE key = ?1", params![key])
            .map_err(Error::backend)?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner
            .conn
            .lock()
            .execute("DELETE FROM stash_entries", [])
            .map_err(Error::backend)?;
        Ok(())
    }

    fn grace_period(&self) -> Duration {
        self.inner.grace_period
    }

    fn len(&self) -> Option<u64> {
        self.inner
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM stash_entries", [], |row| row.get::<_, i64>(0))
            .ok()
            .and_then(|count| u64::try_from(count).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_millis_round_trip() {
        let time = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(from_unix_millis(to_unix_millis(time)), time);
    }

    #[test]
    fn pre_epoch_time_clamps_to_epoch() {
        let before = UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(to_unix_millis(before), 0);
        assert_eq!(from_unix_millis(-5), UNIX_EPOCH);
    }

    #[tokio::test]
    async fn sweep_removes_only_entries_past_grace() {
        let clock = Clock::frozen();
        let driver = SqliteDriver::builder()
            .grace_period(Duration::from_secs(300))
            .clock(clock.clone())
            .open_in_memory()
            .expect("open failed");

        driver.set("keep", "in 2 hours", 1).await.expect("set failed");
        driver.set("stale", "in 1 hour", 2).await.expect("set failed");

        // One hour plus half the grace window: "stale" is expired but in
        // grace, "keep" is fresh. Neither may be swept.
        clock.advance(Duration::from_secs(3600 + 150));
        driver.inner.sweep().expect("sweep failed");
        assert_eq!(driver.len(), Some(2));

        // Past "stale"'s grace window now.
        clock.advance(Duration::from_secs(150));
        driver.inner.sweep().expect("sweep failed");
        assert_eq!(driver.len(), Some(1));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let driver = SqliteDriver::open_in_memory().expect("open failed");
        driver.close();
        driver.close();
    }
}
