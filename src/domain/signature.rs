//! Notice signature computation for duplicate suppression.
//!
//! Two notices share a signature when their structured errors are identical:
//! same types, messages and backtraces, in the same order. Context, params,
//! environment and session do not take part.

use crate::domain::notice::ErrorReport;
use ahash::AHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a class of notices with identical errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoticeSignature(u64);

impl NoticeSignature {
    /// Compute a signature over a list of errors.
    pub fn new(errors: &[ErrorReport]) -> Self {
        let mut hasher = AHasher::default();
        errors.hash(&mut hasher);
        NoticeSignature(hasher.finish())
    }

    /// Get the raw hash value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NoticeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notice::Frame;

    fn report(message: &str) -> ErrorReport {
        ErrorReport::new("TypeError", message).with_frame(Frame::new("handler", "app.rs", 10, 4))
    }

    #[test]
    fn test_identical_errors_produce_same_signature() {
        let sig1 = NoticeSignature::new(&[report("boom")]);
        let sig2 = NoticeSignature::new(&[report("boom")]);
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_different_messages_produce_different_signatures() {
        let sig1 = NoticeSignature::new(&[report("boom")]);
        let sig2 = NoticeSignature::new(&[report("bang")]);
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn test_backtrace_takes_part() {
        let plain = ErrorReport::new("TypeError", "boom");
        assert_ne!(
            NoticeSignature::new(&[plain]),
            NoticeSignature::new(&[report("boom")])
        );
    }

    #[test]
    fn test_error_order_matters() {
        let a = report("a");
        let b = report("b");
        assert_ne!(
            NoticeSignature::new(&[a.clone(), b.clone()]),
            NoticeSignature::new(&[b, a])
        );
    }

    #[test]
    fn test_display_format() {
        let sig = NoticeSignature::new(&[report("boom")]);
        assert_eq!(sig.to_string().len(), 16);
    }
}
