//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Size reduction against the byte budget
//! - The filter chain and its built-in filters
//! - Scope (context and history)
//! - Delivery, rate limiting and the offline queue
//! - The notifier pipeline tying them together
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod delivery;
pub mod filters;
pub mod metrics;
pub mod notifier;
pub mod ports;
pub mod rate_limiter;
pub mod scope;
pub mod size_reducer;
