// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for driver operations.

/// Type alias for boxed error sources.
type Source = Box<dyn std::error::Error + Send + Sync>;

/// An error from a driver or facade operation.
///
/// Missing keys are never errors; they surface as an absent
/// [`DriverResponse::data`](crate::DriverResponse) instead. The variants here
/// cover the cases a caller genuinely has to handle: a duration phrase that
/// does not resolve, a stored representation that cannot be decoded, a failed
/// computation on the miss path, and backend failures passed through
/// unmodified.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The duration phrase failed to resolve to an absolute time, or resolved
    /// to a non-positive remaining lifetime.
    #[error("invalid duration phrase {phrase:?}")]
    InvalidDuration {
        /// The phrase that failed to resolve.
        phrase: String,
    },

    /// A stored entry could not be serialized or deserialized.
    ///
    /// Not expected in normal operation; indicates the stored representation
    /// was produced by an incompatible writer or corrupted in the backend.
    #[error("malformed stored entry for key {key:?}")]
    MalformedEntry {
        /// The storage-layer key of the offending entry.
        key: String,
        /// The underlying codec error.
        #[source]
        source: Source,
    },

    /// The wrapped computation failed on a genuine miss.
    ///
    /// Propagates directly to the `wrap` caller; the failure is never cached.
    #[error("producer failed for key {key:?}")]
    Producer {
        /// The caller-supplied key being computed.
        key: String,
        /// The error raised by the computation.
        #[source]
        source: Source,
    },

    /// The storage backend failed.
    ///
    /// This layer adds no retry or circuit-breaking of its own; backend
    /// errors pass through unchanged.
    #[error("storage backend failure")]
    Backend(#[source] Source),
}

impl Error {
    /// Creates an [`Error::InvalidDuration`] for the given phrase.
    #[must_use]
    pub fn invalid_duration(phrase: impl Into<String>) -> Self {
        Self::InvalidDuration { phrase: phrase.into() }
    }

    /// Creates an [`Error::MalformedEntry`] for the given key.
    pub fn malformed_entry(key: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::MalformedEntry {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Creates an [`Error::Producer`] for the given key.
    pub fn producer(key: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::Producer {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Creates an [`Error::Backend`] from any underlying error.
    pub fn backend(source: impl Into<Source>) -> Self {
        Self::Backend(source.into())
    }
}

/// A specialized [`Result`] type for driver and facade operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_duration_display_names_phrase() {
        let error = Error::invalid_duration("not a real duration");
        assert!(format!("{error}").contains("not a real duration"));
    }

    #[test]
    fn backend_error_preserves_source() {
        let error = Error::backend("connection refused");
        let source = std::error::Error::source(&error).expect("source should be set");
        assert!(format!("{source}").contains("connection refused"));
    }

    #[test]
    fn producer_error_names_key() {
        let error = Error::producer("user:1", "boom");
        assert!(format!("{error}").contains("user:1"));
    }
}
