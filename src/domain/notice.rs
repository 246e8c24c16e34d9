//! The notice: one reported error occurrence.

use crate::domain::value::Map;
use crate::error::NotifyError;
use serde::{Deserialize, Serialize};

/// One stack entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Function name, empty if unknown
    pub function: String,
    /// Source file, empty if unknown
    pub file: String,
    /// 1-based line, 0 if unknown
    pub line: u32,
    /// 1-based column, 0 if unknown
    pub column: u32,
}

impl Frame {
    /// Create a frame.
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
            column,
        }
    }
}

/// An error in the structured form the collector understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error type, empty if unknown
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    pub message: String,
    /// Stack, innermost frame first
    pub backtrace: Vec<Frame>,
}

impl ErrorReport {
    /// Create a report without a backtrace.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    /// Append a frame to the backtrace.
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.backtrace.push(frame);
        self
    }

    /// True if the type carries no information (empty or plain `Error`).
    pub fn has_generic_type(&self) -> bool {
        self.error_type.is_empty() || self.error_type == "Error"
    }
}

/// The payload describing one reported error.
///
/// Built once per `notify` call. Filters may rewrite it; once handed to
/// delivery it is only annotated with the outcome (`id` or `error`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Notice {
    /// Collector-assigned id, set after successful delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Structured errors; exactly one when built by the notifier
    pub errors: Vec<ErrorReport>,
    /// Free-form context, including scope context and history
    pub context: Map,
    /// Request or call parameters
    pub params: Map,
    /// Process environment
    pub environment: Map,
    /// Session state
    pub session: Map,
    /// Outcome of the pipeline when the notice was not delivered
    #[serde(skip)]
    pub error: Option<NotifyError>,
}

impl Notice {
    /// Create a notice for a single error with empty fields.
    pub fn new(error: ErrorReport) -> Self {
        Self {
            errors: vec![error],
            ..Self::default()
        }
    }

    /// Create an empty notice that carries only a failure.
    pub fn failed(error: NotifyError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// True if the notice reached the collector.
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }

    /// True if a filter discarded the notice.
    pub fn is_filtered(&self) -> bool {
        self.error.as_ref().is_some_and(NotifyError::is_filtered)
    }
}
