// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Redis driver for the stash caching facade.
//!
//! Entries are stored as hashes and expire through the key's native
//! time-to-live, which is extended by the grace period at write time so the
//! server keeps stale values servable until grace runs out. No sweep task is
//! needed; the server reclaims expired keys on its own.

mod builder;
mod driver;

#[doc(inline)]
pub use builder::RedisDriverBuilder;
#[doc(inline)]
pub use driver::RedisDriver;
