//! Ordered notice filters.
//!
//! A filter receives a notice and returns it (possibly rewritten) or `None`
//! to discard it. The chain runs filters in registration order and stops at
//! the first `None`.
//!
//! Built-in filters, in their fixed order:
//! 1. [`noise_filter`] drops known-meaningless errors
//! 2. [`DebounceFilter`] drops an immediate repeat of the previous error
//! 3. [`uncaught_message_filter`] splits `Uncaught Type: message`
//! 4. [`bracketed_tag_filter`] splits `[$tag] message`
//! 5. [`EnvironmentFilter`] stamps the environment name, when configured
//! 6. [`identity_filter`] terminates the built-ins
//!
//! Platform and user filters are appended after the built-ins.

use crate::application::ports::{Clock, PlatformAdapter};
use crate::domain::notice::Notice;
use crate::domain::signature::NoticeSignature;
use crate::domain::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// How long a debounced signature is remembered.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

/// Messages that carry no information when the error has no type.
const NOISE_MESSAGES: &[&str] = &["Script error", "Script error.", "InvalidAccessError"];

/// File name of frames without a real source location.
const ANONYMOUS_FILE: &str = "<anonymous>";

static UNCAUGHT_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^Uncaught\s(.+?):\s(.+)$").ok());

static BRACKETED_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\[(\$.+)\]\s([\s\S]+)$").ok());

/// A notice transform or veto.
pub trait Filter: Send + Sync {
    /// Return the notice to keep it, or `None` to discard it.
    fn filter(&self, notice: Notice) -> Option<Notice>;
}

impl<F> Filter for F
where
    F: Fn(Notice) -> Option<Notice> + Send + Sync,
{
    fn filter(&self, notice: Notice) -> Option<Notice> {
        self(notice)
    }
}

/// Filters applied in registration order.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain holding the built-in filters.
    ///
    /// The environment filter is only registered when `environment` is set.
    pub fn with_builtin(clock: Arc<dyn Clock>, environment: Option<&str>) -> Self {
        let mut chain = Self::new();
        chain.push(noise_filter);
        chain.push(DebounceFilter::new(clock));
        chain.push(uncaught_message_filter);
        chain.push(bracketed_tag_filter);
        if let Some(environment) = environment {
            chain.push(EnvironmentFilter::new(environment));
        }
        chain.push(identity_filter);
        chain
    }

    /// Append a filter.
    pub fn push(&mut self, filter: impl Filter + 'static) {
        self.filters.push(Arc::new(filter));
    }

    /// Run the chain. `None` means some filter discarded the notice.
    pub fn apply(&self, notice: Notice) -> Option<Notice> {
        self.filters
            .iter()
            .try_fold(notice, |notice, filter| filter.filter(notice))
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True if no filter is registered.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Drop errors known to carry no useful information.
///
/// Matches an untyped error with a denylisted message, or an error whose
/// innermost frame has no real source file.
pub fn noise_filter(notice: Notice) -> Option<Notice> {
    let Some(error) = notice.errors.first() else {
        return Some(notice);
    };

    if error.error_type.is_empty() && NOISE_MESSAGES.contains(&error.message.as_str()) {
        return None;
    }
    if error
        .backtrace
        .first()
        .is_some_and(|frame| frame.file == ANONYMOUS_FILE)
    {
        return None;
    }

    Some(notice)
}

/// Drops a notice whose errors repeat the last accepted notice's errors.
///
/// The last signature is forgotten once the window has passed since it was
/// accepted; dropped repeats do not extend the window.
#[derive(Debug)]
pub struct DebounceFilter {
    clock: Arc<dyn Clock>,
    window: Duration,
    last: Mutex<Option<(NoticeSignature, Instant)>>,
}

impl DebounceFilter {
    /// Create a debounce filter with the default window.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_window(clock, DEBOUNCE_WINDOW)
    }

    /// Create a debounce filter with a custom window.
    pub fn with_window(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            clock,
            window,
            last: Mutex::new(None),
        }
    }
}

impl Filter for DebounceFilter {
    fn filter(&self, notice: Notice) -> Option<Notice> {
        let signature = NoticeSignature::new(&notice.errors);
        let now = self.clock.now();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((previous, accepted_at)) = *last {
            if previous == signature && now.duration_since(accepted_at) < self.window {
                tracing::trace!(%signature, "debounced repeated notice");
                return None;
            }
        }

        *last = Some((signature, now));
        Some(notice)
    }
}

/// Split `Uncaught Type: message` into type and message for untyped errors.
pub fn uncaught_message_filter(mut notice: Notice) -> Option<Notice> {
    split_generic_messages(&mut notice, &UNCAUGHT_RE);
    Some(notice)
}

/// Split `[$tag] message` into type and message for untyped errors.
pub fn bracketed_tag_filter(mut notice: Notice) -> Option<Notice> {
    split_generic_messages(&mut notice, &BRACKETED_RE);
    Some(notice)
}

fn split_generic_messages(notice: &mut Notice, re: &Option<Regex>) {
    let Some(re) = re else { return };
    for error in notice.errors.iter_mut().filter(|e| e.has_generic_type()) {
        let split = re.captures(&error.message).and_then(|caps| {
            let error_type = caps.get(1)?.as_str().to_string();
            let message = caps.get(2)?.as_str().to_string();
            Some((error_type, message))
        });
        if let Some((error_type, message)) = split {
            error.error_type = error_type;
            error.message = message;
        }
    }
}

/// Stamps `context.environment`.
#[derive(Debug, Clone)]
pub struct EnvironmentFilter {
    environment: String,
}

impl EnvironmentFilter {
    /// Create a filter for the given environment name.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }
}

impl Filter for EnvironmentFilter {
    fn filter(&self, mut notice: Notice) -> Option<Notice> {
        notice.context.insert(
            "environment".to_string(),
            Value::from(self.environment.as_str()),
        );
        Some(notice)
    }
}

/// Returns the notice unchanged.
pub fn identity_filter(notice: Notice) -> Option<Notice> {
    Some(notice)
}

/// Stamps platform details through a [`PlatformAdapter`].
#[derive(Debug, Clone)]
pub struct PlatformFilter {
    adapter: Arc<dyn PlatformAdapter>,
}

impl PlatformFilter {
    /// Create a filter for the given adapter.
    pub fn new(adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self { adapter }
    }
}

impl Filter for PlatformFilter {
    fn filter(&self, mut notice: Notice) -> Option<Notice> {
        self.adapter.report_platform_context(&mut notice.context);
        Some(notice)
    }
}
