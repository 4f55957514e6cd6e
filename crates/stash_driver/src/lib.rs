// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Core driver abstractions for the stash caching facade.
//!
//! This crate defines the [`StashDriver`] trait that all storage backends
//! must satisfy, along with the shared expiration/grace-period algorithm,
//! the [`DriverResponse`] read result, the [`DurationResolver`] capability,
//! the [`Clock`] time abstraction, and [`Error`] types.
//!
//! # Overview
//!
//! Three backend families implement the contract: in-process maps and
//! embedded databases store explicit expiry timestamps and apply
//! [`Freshness::evaluate`] on every read; remote stores with a native
//! time-to-live countdown encode expiry and grace into a single countdown
//! via [`grace_inclusive_ttl`] and recover freshness with
//! [`Freshness::from_remaining_ttl`]. All of them must present identical
//! observable cache semantics to the facade.
//!
//! # Implementing a driver
//!
//! Implement all required methods of [`StashDriver`], judging freshness
//! with the shared predicate rather than re-deriving the arithmetic:
//!
//! ```
//! use std::time::Duration;
//! use serde::{Serialize, de::DeserializeOwned};
//! use stash_driver::{DriverResponse, Result, StashDriver};
//!
//! struct NullDriver;
//!
//! impl StashDriver for NullDriver {
//!     async fn get<T: DeserializeOwned>(&self, _key: &str, _duration: &str) -> Result<DriverResponse<T>> {
//!         Ok(DriverResponse::miss())
//!     }
//!
//!     async fn set<T: Serialize + Send>(&self, _key: &str, _duration: &str, value: T) -> Result<T> {
//!         Ok(value)
//!     }
//!
//!     async fn delete(&self, _key: &str) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn clear(&self) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn grace_period(&self) -> Duration {
//!         Duration::ZERO
//!     }
//! }
//! ```

mod clock;
mod driver;
mod entry;
pub mod error;
mod freshness;
mod resolve;
mod response;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use clock::Clock;
#[doc(inline)]
pub use driver::{DEFAULT_GRACE_PERIOD, DEFAULT_SWEEP_INTERVAL, StashDriver};
#[doc(inline)]
pub use entry::StoredEntry;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use freshness::{Freshness, grace_inclusive_ttl};
#[doc(inline)]
pub use resolve::{DurationResolver, HumanDurations};
#[doc(inline)]
pub use response::DriverResponse;
