//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Error structuring and platform details
//! - Tracing integration (history breadcrumbs from log events)
//! - HTTP delivery (`reqwest-transport` feature)

pub mod clock;
pub mod layer;
pub mod platform;
pub mod processor;
pub(crate) mod visitor;

#[cfg(feature = "reqwest-transport")]
pub mod reqwest_transport;

/// Mock implementations for testing.
///
/// Only available with the `test-helpers` feature or in test builds. It
/// provides a controllable clock and a scripted transport for driving the
/// notifier pipeline.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// error-notifier = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
