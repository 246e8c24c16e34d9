//! Input to the notifier: an error plus the data reported with it.

use crate::domain::notice::ErrorReport;
use crate::domain::value::{Map, Value};
use std::error::Error as StdError;
use std::sync::Arc;

/// The error carried by a [`Report`].
#[derive(Debug, Clone)]
pub enum ReportedError {
    /// A native error, structured later by the configured processor
    Native {
        /// Short Rust type name of the error, empty if unknown
        type_name: String,
        /// The error itself
        error: Arc<dyn StdError + Send + Sync>,
    },
    /// An error that is already structured
    Structured(ErrorReport),
}

/// An error to report, with the data to attach to its notice.
#[derive(Debug, Clone)]
pub struct Report {
    /// The error
    pub error: ReportedError,
    /// Merged over the scope context
    pub context: Map,
    /// Becomes `notice.params`
    pub params: Map,
    /// Becomes `notice.environment`
    pub environment: Map,
    /// Becomes `notice.session`
    pub session: Map,
}

impl Report {
    /// Report a native error. The Rust type name becomes the error type.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::with_error(ReportedError::Native {
            type_name: short_type_name(std::any::type_name::<E>()).to_string(),
            error: Arc::new(error),
        })
    }

    /// Report a boxed error whose concrete type is unknown.
    pub fn from_boxed(error: Box<dyn StdError + Send + Sync>) -> Self {
        Self::with_error(ReportedError::Native {
            type_name: String::new(),
            error: Arc::from(error),
        })
    }

    /// Report an error that is already structured.
    pub fn structured(report: ErrorReport) -> Self {
        Self::with_error(ReportedError::Structured(report))
    }

    fn with_error(error: ReportedError) -> Self {
        Self {
            error,
            context: Map::new(),
            params: Map::new(),
            environment: Map::new(),
            session: Map::new(),
        }
    }

    /// Add a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add an environment entry.
    pub fn with_environment(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Add a session entry.
    pub fn with_session(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.session.insert(key.into(), value.into());
        self
    }
}

impl<E> From<E> for Report
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Report::new(error)
    }
}

impl From<ErrorReport> for Report {
    fn from(report: ErrorReport) -> Self {
        Report::structured(report)
    }
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
