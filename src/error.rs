//! Error types for the notifier pipeline.
//!
//! `notify` never fails: every outcome is a [`Notice`](crate::Notice), and a
//! failure is recorded on it as a [`NotifyError`]. Only construction can fail
//! outright, with a [`BuildError`].

use serde::Serialize;

/// Network-level failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Create a transport error with a description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What an operator needs to see when a notice cannot be shrunk.
///
/// Carries a prefix of the oversized payload and the serialized size of each
/// notice field on its own, so the offending field stands out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SizeDiagnostic {
    /// First half of the oversized serialization, suffixed with `...`
    pub json: String,
    /// Serialized byte length of `context`
    pub context: usize,
    /// Serialized byte length of `params`
    pub params: usize,
    /// Serialized byte length of `environment`
    pub environment: usize,
    /// Serialized byte length of `session`
    pub session: usize,
    /// Serialized byte length of `errors`
    pub errors: usize,
}

/// A notice could not be truncated below the byte budget at any level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notice exceeds max length of {max_length} bytes and can't be truncated")]
pub struct SizeLimitError {
    /// The byte budget that could not be met
    pub max_length: usize,
    /// Per-field sizes of the last attempt
    pub diagnostic: SizeDiagnostic,
}

/// Why a notice was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// A filter discarded the notice
    #[error("notice was filtered")]
    Filtered,

    /// The notice is too large to send
    #[error(transparent)]
    SizeLimit(#[from] SizeLimitError),

    /// The notice could not be serialized
    #[error("notice could not be encoded: {reason}")]
    Encode {
        /// Serializer message
        reason: String,
    },

    /// The collector rejected the project credentials
    #[error("unauthorized: project id or key is wrong")]
    Unauthorized,

    /// Delivery is paused by the collector's rate limit
    #[error("IP is rate limited")]
    RateLimited,

    /// The collector endpoint does not exist
    #[error("404 Not Found")]
    NotFound,

    /// The collector refused the notice
    #[error("collector rejected notice: {message}")]
    ServerRejected {
        /// Message from the collector's response body
        message: String,
    },

    /// The collector answered with a status outside the protocol
    #[error("unexpected response: code={status} body='{body}'")]
    UnexpectedResponse {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The collector's response body was not the expected JSON
    #[error("invalid response body: {reason}")]
    InvalidResponse {
        /// Parser message
        reason: String,
    },

    /// The transport failed before a response arrived
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The notice was evicted from a full offline queue
    #[error("offline queue is too large")]
    QueueOverflow,

    /// A parked notice was dropped before it could be replayed
    #[error("queued notice was dropped before delivery")]
    Cancelled,
}

impl NotifyError {
    /// True if the notice was discarded by a filter rather than failing.
    pub fn is_filtered(&self) -> bool {
        matches!(self, NotifyError::Filtered)
    }
}

/// Error returned when building a [`Notifier`](crate::Notifier) fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Project id must be non-zero
    #[error("project id is required")]
    MissingProjectId,

    /// Project key must be non-empty
    #[error("project key is required")]
    MissingProjectKey,

    /// Byte budget must be greater than zero
    #[error("max_length must be greater than 0")]
    ZeroMaxLength,

    /// Offline queue must hold at least one job
    #[error("offline queue capacity must be greater than 0")]
    ZeroQueueCapacity,

    /// A blacklist entry could not be compiled
    #[error("invalid key pattern `{pattern}`: {reason}")]
    InvalidKeyPattern {
        /// The pattern as given
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// No transport was configured and no default is available
    #[error("no transport configured")]
    MissingTransport,

    /// The default transport could not be created
    #[error("transport setup failed: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_response_message() {
        let err = NotifyError::UnexpectedResponse {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected response: code=502 body='bad gateway'"
        );
    }

    #[test]
    fn test_size_limit_is_transparent() {
        let err = NotifyError::from(SizeLimitError {
            max_length: 100,
            diagnostic: SizeDiagnostic::default(),
        });
        assert_eq!(
            err.to_string(),
            "notice exceeds max length of 100 bytes and can't be truncated"
        );
        assert!(!err.is_filtered());
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: NotifyError = TransportError::new("connection refused").into();
        assert_eq!(err.to_string(), "transport error: connection refused");
    }
}
