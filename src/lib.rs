//! # error-notifier
//!
//! Error reporting client: structures errors into notices, attaches scope
//! context and breadcrumbs, filters, shrinks and delivers them to a
//! collector.
//!
//! Every notify call resolves to a [`Notice`]. Nothing in the pipeline
//! panics or returns early to the caller; when a notice is not delivered
//! the reason is on `notice.error`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use error_notifier::{HistoryLayer, Notifier, Report};
//! use tracing_subscriber::prelude::*;
//! use std::time::Duration;
//!
//! # #[cfg(feature = "reqwest-transport")]
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let notifier = Notifier::builder(12345, "project-key")
//!         .with_environment("production")
//!         .with_keys_blacklist(["/password/", "/secret/", "api_token"])
//!         .build()?;
//!
//!     // Record log events as breadcrumbs
//!     tracing_subscriber::registry()
//!         .with(HistoryLayer::new(notifier.clone()))
//!         .init();
//!
//!     notifier.set_context_value("component", "billing");
//!
//!     let err = std::io::Error::new(std::io::ErrorKind::Other, "ledger unavailable");
//!     let notice = notifier
//!         .notify(Report::new(err).with_param("invoice", 1042))
//!         .await;
//!     println!("delivered as {:?}", notice.id);
//!
//!     notifier.flush(Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! # #[cfg(not(feature = "reqwest-transport"))]
//! # fn main() {}
//! ```
//!
//! ## Features
//!
//! ### Pipeline
//! - **Processing**: native errors are structured by a [`Processor`]; structured
//!   [`ErrorReport`]s pass through untouched
//! - **Filters**: built-in noise, debounce and message-splitting filters, then
//!   platform and user filters ([`FilterChain`])
//! - **Size reduction**: attached data is truncated at increasing levels until
//!   the serialized notice fits the byte budget ([`SizeReducer`])
//! - **Delivery**: one POST per notice with collector rate limits honored
//!   ([`DeliveryQueue`], [`RateLimiter`])
//!
//! ### Scope
//! - **Context**: key-value context merged into every notice
//! - **History**: the last 20 breadcrumbs, with consecutive repeats counted
//! - **Isolation**: [`Notifier::scope`] returns an independent copy for
//!   per-request reporting with [`Notifier::notify_with_scope`]
//!
//! ### Offline mode
//! While offline, notify calls are parked in a bounded queue (100 by default,
//! oldest evicted). Going back online replays them in order.
//!
//! ### Cargo features
//! - `reqwest-transport`: HTTP delivery through `reqwest`. Without it a
//!   [`Transport`] must be supplied to the builder.
//!
//! ## Filters
//!
//! ```rust,no_run
//! # use error_notifier::{Notice, Notifier};
//! # fn attach(notifier: &Notifier) {
//! // Drop everything from health checks, tag the rest
//! notifier.add_filter(|mut notice: Notice| {
//!     if notice.context.get("route").and_then(|v| v.as_str()) == Some("/healthz") {
//!         return None;
//!     }
//!     notice.context.insert("region".to_string(), "eu-west-1".into());
//!     Some(notice)
//! });
//! # }
//! ```
//!
//! ## Observability
//!
//! ```rust,no_run
//! # use error_notifier::Notifier;
//! # fn report(notifier: &Notifier) {
//! let snapshot = notifier.metrics().snapshot();
//! println!(
//!     "sent: {}, filtered: {}, failed: {} ({:.1}%)",
//!     snapshot.notices_sent,
//!     snapshot.notices_filtered,
//!     snapshot.notices_failed,
//!     snapshot.failure_rate() * 100.0
//! );
//! # }
//! ```
//!
//! The crate logs its own decisions through `tracing` under the
//! `error_notifier` target. [`HistoryLayer`] never records those events.

// Domain layer - pure data and algorithms
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

pub mod error;

// Re-export commonly used types for convenience
pub use domain::{
    blacklist::{KeyBlacklist, KeyPattern, FILTERED},
    history::HistoryEntry,
    notice::{ErrorReport, Frame, Notice},
    report::{Report, ReportedError},
    signature::NoticeSignature,
    truncator::{Limits, Truncator},
    value::{AccessError, Map, OpaqueObject, Value},
};

pub use application::{
    delivery::{DeliveryJob, DeliveryQueue, OfflineQueue},
    filters::{DebounceFilter, EnvironmentFilter, Filter, FilterChain, PlatformFilter},
    metrics::{Metrics, MetricsSnapshot},
    notifier::{Notifier, NotifierBuilder, NotifierConfig},
    ports::{Clock, PlatformAdapter, Processor, Transport, TransportRequest, TransportResponse},
    rate_limiter::RateLimiter,
    scope::Scope,
    size_reducer::{Reduced, SizeReducer},
};

pub use infrastructure::{
    clock::SystemClock,
    layer::HistoryLayer,
    platform::{ClientPlatform, ServerPlatform},
    processor::DisplayProcessor,
};

#[cfg(feature = "reqwest-transport")]
pub use infrastructure::reqwest_transport::ReqwestTransport;

pub use error::{BuildError, NotifyError, SizeDiagnostic, SizeLimitError, TransportError};
