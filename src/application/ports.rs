//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::notice::ErrorReport;
use crate::domain::value::Map;
use crate::error::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;

    /// Get the current wall-clock time, used to stamp history entries.
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A request for the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method
    pub method: &'static str,
    /// Full endpoint URL including the project key
    pub url: String,
    /// Serialized notice
    pub body: String,
    /// Time budget for the whole exchange
    pub timeout: Duration,
}

/// The collector's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Raw response body
    pub body: String,
}

impl TransportResponse {
    /// Create a response with no headers and an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Port for sending serialized notices.
///
/// Implementations resolve with whatever the collector answered, including
/// error statuses. Only a failure to get any answer is a `TransportError`.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Perform one request.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Port for turning a native error into its structured form.
///
/// Must not fail: missing information yields empty fields or an empty backtrace.
pub trait Processor: Send + Sync + Debug {
    /// Structure `error`, whose Rust type name is `type_name` (empty if unknown).
    fn process(&self, type_name: &str, error: &(dyn StdError + 'static)) -> ErrorReport;
}

/// Port for platform-specific behavior composed into the notifier.
pub trait PlatformAdapter: Send + Sync + Debug {
    /// Stamp platform details into a notice's context.
    fn report_platform_context(&self, context: &mut Map);

    /// Called when the notifier goes offline.
    fn on_offline(&self) {}

    /// Called when the notifier comes back online, before queued notices replay.
    fn on_online(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = TransportResponse::new(429).with_header("x-ratelimit-delay", "5");
        assert_eq!(response.header("X-RateLimit-Delay"), Some("5"));
        assert_eq!(response.header("Retry-After"), None);
    }

    #[test]
    fn test_first_header_wins() {
        let response = TransportResponse::new(200)
            .with_header("X-Id", "1")
            .with_header("x-id", "2");
        assert_eq!(response.header("x-id"), Some("1"));
    }
}
