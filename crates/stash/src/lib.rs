// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Key-value caching facade with time-based expiration, grace-period
//! staleness, and fire-and-forget background refresh.
//!
//! A [`Stash`] wraps a storage driver and hands out cached values through
//! [`Stash::wrap`]: a fresh hit skips the computation entirely, an expired
//! entry within its grace period is served stale while one refresh runs in
//! the background, and a miss computes and stores. Entries carry the
//! human-readable duration phrase they were written with (`"in 1 hour"`),
//! and reading with a different phrase invalidates the entry on the spot,
//! so changing the phrase at a call site acts as a deploy-time cache bust.
//!
//! Drivers live in their own crates: `stash_memory` (default),
//! `stash_sqlite`, and `stash_redis`. Custom backends implement
//! [`StashDriver`].
//!
//! # Examples
//!
//! ```
//! use stash::Stash;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let stash = Stash::new("weather");
//!
//! let report = stash
//!     .wrap("oslo", "in 30 minutes", || async {
//!         // An expensive upstream call.
//!         "partly cloudy".to_owned()
//!     })
//!     .await?;
//! assert_eq!(report, "partly cloudy");
//! # Ok::<(), stash::Error>(())
//! # });
//! ```

mod facade;

#[doc(inline)]
pub use facade::Stash;
pub use stash_driver::{DriverResponse, DurationResolver, Error, HumanDurations, Result, StashDriver};
