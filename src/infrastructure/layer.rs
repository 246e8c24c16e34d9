//! Tracing integration layer.
//!
//! Provides a `tracing_subscriber::Layer` that records application log events
//! as history breadcrumbs on a [`Notifier`], so the next notice shows what
//! was logged before the error.
//!
//! ```rust,no_run
//! use error_notifier::{HistoryLayer, Notifier, Transport};
//! use tracing_subscriber::prelude::*;
//! use std::sync::Arc;
//!
//! # fn transport() -> Arc<dyn Transport> { unimplemented!() }
//! let notifier = Notifier::builder(1, "project-key")
//!     .with_transport(transport())
//!     .build()
//!     .unwrap();
//!
//! tracing_subscriber::registry()
//!     .with(HistoryLayer::new(notifier.clone()))
//!     .init();
//! ```

use crate::application::notifier::Notifier;
use crate::domain::history::HistoryEntry;
use crate::domain::value::Value;
use crate::infrastructure::visitor::FieldVisitor;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Target prefix of this crate's own events, which are never recorded.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// History entry type for log events.
pub const LOG_ENTRY_TYPE: &str = "log";

/// Records log events as `log` history entries.
///
/// Each entry carries `severity`, `target` and `message` plus the event's
/// own fields. Events below the minimum level, from this crate, or from an
/// ignored target are skipped.
#[derive(Debug, Clone)]
pub struct HistoryLayer {
    notifier: Notifier,
    min_level: Level,
    ignored_targets: Vec<String>,
}

impl HistoryLayer {
    /// Record events at INFO and above.
    pub fn new(notifier: Notifier) -> Self {
        Self {
            notifier,
            min_level: Level::INFO,
            ignored_targets: Vec::new(),
        }
    }

    /// Set the least severe level that is recorded.
    ///
    /// Default: INFO
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Skip events whose target is one of `targets` or a module below it.
    pub fn with_ignored_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_targets
            .extend(targets.into_iter().map(Into::into).filter(|t| !t.is_empty()));
        self
    }

    fn records(&self, level: &Level, target: &str) -> bool {
        if *level > self.min_level {
            return false;
        }
        if is_within(target, OWN_TARGET) {
            return false;
        }
        !self
            .ignored_targets
            .iter()
            .any(|ignored| is_within(target, ignored))
    }
}

/// True if `target` is `prefix` or a module path below it.
fn is_within(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

impl<S> Layer<S> for HistoryLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.records(metadata.level(), metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let (message, fields) = visitor.into_parts();

        let mut entry = HistoryEntry::new(LOG_ENTRY_TYPE);
        entry.fields = fields;
        entry.fields.insert(
            "severity".to_string(),
            Value::from(metadata.level().as_str().to_ascii_lowercase()),
        );
        entry
            .fields
            .insert("target".to_string(), Value::from(metadata.target()));
        entry
            .fields
            .insert("message".to_string(), Value::from(message.unwrap_or_default()));

        self.notifier.push_history(entry);
    }
}
