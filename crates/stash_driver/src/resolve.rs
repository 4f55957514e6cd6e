// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolution of human-readable duration phrases.
//!
//! Drivers consult a [`DurationResolver`] at write time to turn a phrase
//! like `"in 2 hours"` into the absolute expiry timestamp they persist (or
//! encode into a native countdown). Resolution failure is a hard error at
//! the driver layer, never a silent fallback.

use std::time::SystemTime;

/// Translates a duration phrase plus a reference time into an absolute
/// expiry timestamp.
///
/// Returns `None` when the phrase does not resolve; the driver turns this
/// into [`Error::InvalidDuration`](crate::Error::InvalidDuration). Taking
/// the reference time as an argument (rather than reading a clock) keeps
/// resolvers pure and deterministic under test.
pub trait DurationResolver: Send + Sync {
    /// Resolves `phrase` relative to `reference`, or signals invalidity.
    fn resolve(&self, phrase: &str, reference: SystemTime) -> Option<SystemTime>;
}

/// The default resolver, backed by [`humantime`].
///
/// Accepts the forms callers actually write: a bare duration (`"90s"`,
/// `"1 hour"`, `"2 days 6 hours"`), an `"in ..."` prefix, and a `"... later"`
/// suffix. Anything `humantime` cannot parse after that normalization is
/// invalid.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
/// use stash_driver::{DurationResolver, HumanDurations};
///
/// let reference = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
/// let resolved = HumanDurations.resolve("in 2 hours", reference);
/// assert_eq!(resolved, Some(reference + Duration::from_secs(7200)));
///
/// assert!(HumanDurations.resolve("not a real duration", reference).is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanDurations;

impl DurationResolver for HumanDurations {
    fn resolve(&self, phrase: &str, reference: SystemTime) -> Option<SystemTime> {
        let phrase = phrase.trim();
        let phrase = phrase.strip_prefix("in ").unwrap_or(phrase);
        let phrase = phrase.strip_suffix(" later").unwrap_or(phrase);

        // humantime wants units glued to their numbers ("2h", "2hours");
        // collapse interior whitespace so "2 hours" parses too.
        let compact: String = phrase.chars().filter(|c| !c.is_whitespace()).collect();

        let duration = humantime::parse_duration(&compact).ok()?;
        reference.checked_add(duration)
    }
}
