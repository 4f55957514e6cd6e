// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The uniform read result returned by every driver.

/// The result of a driver read.
///
/// `data` is absent on a genuine miss: no entry, expired past the grace
/// period, or a duration-phrase mismatch. When `in_grace_period` is `true`
/// the returned data is stale but still within the configured grace window;
/// the facade serves it immediately and kicks off a background refresh.
///
/// # Examples
///
/// ```
/// use stash_driver::DriverResponse;
///
/// let hit = DriverResponse::fresh(42);
/// assert_eq!(hit.data, Some(42));
/// assert!(!hit.in_grace_period);
///
/// let miss = DriverResponse::<i32>::miss();
/// assert!(miss.data.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverResponse<T> {
    /// The cached value, absent on a miss.
    pub data: Option<T>,
    /// Whether the returned data is stale but within the grace window.
    pub in_grace_period: bool,
}

impl<T> DriverResponse<T> {
    /// Creates a miss response.
    #[must_use]
    pub fn miss() -> Self {
        Self {
            data: None,
            in_grace_period: false,
        }
    }

    /// Creates a response for a fresh (not yet expired) entry.
    #[must_use]
    pub fn fresh(data: T) -> Self {
        Self {
            data: Some(data),
            in_grace_period: false,
        }
    }

    /// Creates a response for an expired entry still within its grace window.
    #[must_use]
    pub fn stale(data: T) -> Self {
        Self {
            data: Some(data),
            in_grace_period: true,
        }
    }
}

impl<T> Default for DriverResponse<T> {
    fn default() -> Self {
        Self::miss()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_has_no_data_and_no_grace() {
        let response = DriverResponse::<String>::miss();
        assert!(response.data.is_none());
        assert!(!response.in_grace_period);
    }

    #[test]
    fn stale_sets_grace_flag() {
        let response = DriverResponse::stale("old".to_string());
        assert_eq!(response.data.as_deref(), Some("old"));
        assert!(response.in_grace_period);
    }

    #[test]
    fn default_is_miss() {
        assert_eq!(DriverResponse::<i32>::default(), DriverResponse::miss());
    }
}
