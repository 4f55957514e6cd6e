// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory driver for the stash caching facade.
//!
//! Suitable for testing and lightweight single-process use. Entries are
//! stored with explicit timestamps; freshness is judged by the shared
//! predicate from `stash_driver` and a periodic sweep reclaims entries that
//! expire past their grace window without being read again.

mod builder;
mod driver;

#[doc(inline)]
pub use builder::InMemoryDriverBuilder;
#[doc(inline)]
pub use driver::InMemoryDriver;
