// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The record shape persisted by timestamp-based backends.

use std::time::{Duration, SystemTime};

use crate::Freshness;

/// A cache entry as materialized by backends that store explicit timestamps.
///
/// The payload is opaque to the cache: it is the serialized form of whatever
/// the caller stored, with no encoding guarantee beyond "round-trips
/// structurally". The duration phrase is kept verbatim because an entry is
/// only valid for reads presenting the exact phrase it was written with.
///
/// Native-TTL backends do not materialize this record; they persist only the
/// payload and duration phrase and let the store's own countdown stand in
/// for `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    response: String,
    duration: String,
    created_at: SystemTime,
    expires_at: SystemTime,
}

impl StoredEntry {
    /// Creates a new entry from its four persisted fields.
    #[must_use]
    pub fn new(
        response: impl Into<String>,
        duration: impl Into<String>,
        created_at: SystemTime,
        expires_at: SystemTime,
    ) -> Self {
        Self {
            response: response.into(),
            duration: duration.into(),
            created_at,
            expires_at,
        }
    }

    /// The serialized payload.
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// The exact duration phrase supplied when the entry was written.
    #[must_use]
    pub fn duration(&self) -> &str {
        &self.duration
    }

    /// The timestamp of the write that produced this entry.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// The absolute expiry computed by the duration resolver at write time.
    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Whether this entry satisfies a read for the given duration phrase.
    ///
    /// A mismatch means the caller changed their caching policy for the key;
    /// the entry must be deleted regardless of timing.
    #[must_use]
    pub fn matches_duration(&self, duration: &str) -> bool {
        self.duration == duration
    }

    /// Evaluates this entry against the shared freshness predicate.
    #[must_use]
    pub fn freshness(&self, now: SystemTime, grace_period: Duration) -> Freshness {
        Freshness::evaluate(now, self.expires_at, grace_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expires_in: Duration) -> StoredEntry {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        StoredEntry::new("\"payload\"", "in 1 hour", now, now + expires_in)
    }

    #[test]
    fn matches_duration_is_exact() {
        let entry = entry(Duration::from_secs(3600));
        assert!(entry.matches_duration("in 1 hour"));
        assert!(!entry.matches_duration("in 2 hours"));
        assert!(!entry.matches_duration("In 1 Hour"));
    }

    #[test]
    fn freshness_delegates_to_shared_predicate() {
        let entry = entry(Duration::from_secs(3600));
        let grace = Duration::from_secs(300);

        let read_at = entry.created_at() + Duration::from_secs(10);
        assert_eq!(entry.freshness(read_at, grace), Freshness::Fresh);

        let read_at = entry.expires_at() + Duration::from_secs(10);
        assert_eq!(entry.freshness(read_at, grace), Freshness::InGrace);

        let read_at = entry.expires_at() + grace;
        assert_eq!(entry.freshness(read_at, grace), Freshness::Expired);
    }
}
