// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Embedded SQLite driver for the stash caching facade.
//!
//! Entries are persisted in a single `stash_entries` table and survive
//! process restarts when opened against a file. Freshness is judged by the
//! shared predicate from `stash_driver` and a periodic sweep reclaims
//! entries that expire past their grace window without being read again.

mod builder;
mod driver;

#[doc(inline)]
pub use builder::SqliteDriverBuilder;
#[doc(inline)]
pub use driver::SqliteDriver;
