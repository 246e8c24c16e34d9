//! Default error structuring.

use crate::application::ports::Processor;
use crate::domain::notice::ErrorReport;
use std::error::Error as StdError;

/// Structures an error from its type name and `Display` output.
///
/// Rust errors carry no portable stack, so the backtrace is left empty.
/// The `source()` chain is appended to the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayProcessor;

impl DisplayProcessor {
    /// Create a new processor.
    pub fn new() -> Self {
        Self
    }
}

impl Processor for DisplayProcessor {
    fn process(&self, type_name: &str, error: &(dyn StdError + 'static)) -> ErrorReport {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ErrorReport::new(type_name, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("loading config failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_message_includes_source_chain() {
        let error = Outer(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"));
        let report = DisplayProcessor::new().process("Outer", &error);

        assert_eq!(report.error_type, "Outer");
        assert_eq!(report.message, "loading config failed: no such file");
        assert!(report.backtrace.is_empty());
    }

    #[test]
    fn test_plain_error() {
        let error: Box<dyn StdError + Send + Sync> = "boom".into();
        let report = DisplayProcessor::new().process("", error.as_ref());
        assert_eq!(report.error_type, "");
        assert_eq!(report.message, "boom");
    }
}
