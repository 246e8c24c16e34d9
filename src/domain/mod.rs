//! Domain layer - pure data and algorithms with no I/O.
//!
//! This layer contains the core concepts of the notifier:
//! - The value model for attached data
//! - Notices, structured errors and reports
//! - Key blacklisting and value truncation
//! - Notice signatures and history entries
//!
//! All types in this layer are pure and easily testable.

pub mod blacklist;
pub mod history;
pub mod notice;
pub mod report;
pub mod signature;
pub mod truncator;
pub mod value;
