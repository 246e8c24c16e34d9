//! Fitting a notice into the collector's byte budget.
//!
//! Errors are bounded once at the most permissive level. The four free-form
//! fields are then truncated at increasing levels, in place, until the
//! serialized notice is shorter than the budget.

use crate::domain::blacklist::KeyBlacklist;
use crate::domain::notice::Notice;
use crate::domain::truncator::{Truncator, MAX_LEVEL};
use crate::error::{NotifyError, SizeDiagnostic, SizeLimitError};
use serde::Serialize;

/// Default byte budget for a serialized notice.
pub const DEFAULT_MAX_LENGTH: usize = 64_000;

/// A notice serialized within budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduced {
    /// The JSON payload
    pub body: String,
    /// The truncation level that made it fit
    pub level: u8,
}

/// Multi-pass truncation against a byte budget.
#[derive(Debug, Clone)]
pub struct SizeReducer {
    max_length: usize,
    blacklist: KeyBlacklist,
}

impl SizeReducer {
    /// Create a reducer with a byte budget and key blacklist.
    pub fn new(max_length: usize, blacklist: KeyBlacklist) -> Self {
        Self {
            max_length,
            blacklist,
        }
    }

    /// The byte budget.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// The key blacklist applied at every level.
    pub fn blacklist(&self) -> &KeyBlacklist {
        &self.blacklist
    }

    /// Truncate `notice` in place until it serializes below the budget.
    ///
    /// # Errors
    /// `NotifyError::SizeLimit` with a per-field diagnostic if even the most
    /// aggressive level does not fit; `NotifyError::Encode` if serialization fails.
    pub fn reduce(&self, notice: &mut Notice) -> Result<Reduced, NotifyError> {
        let base = Truncator::new(0, &self.blacklist);
        for error in &mut notice.errors {
            base.truncate_report(error);
        }

        let mut body = String::new();
        for level in 0..=MAX_LEVEL {
            let truncator = Truncator::new(level, &self.blacklist);
            notice.context = truncator.truncate_map(&notice.context);
            notice.params = truncator.truncate_map(&notice.params);
            notice.environment = truncator.truncate_map(&notice.environment);
            notice.session = truncator.truncate_map(&notice.session);

            body = encode(notice)?;
            if body.len() < self.max_length {
                tracing::trace!(level, length = body.len(), "notice fits byte budget");
                return Ok(Reduced { body, level });
            }
        }

        Err(SizeLimitError {
            max_length: self.max_length,
            diagnostic: diagnose(notice, &body)?,
        }
        .into())
    }
}

impl Default for SizeReducer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH, KeyBlacklist::default())
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, NotifyError> {
    serde_json::to_string(value).map_err(|e| NotifyError::Encode {
        reason: e.to_string(),
    })
}

fn diagnose(notice: &Notice, body: &str) -> Result<SizeDiagnostic, NotifyError> {
    let mut half = body.len() / 2;
    while !body.is_char_boundary(half) {
        half -= 1;
    }

    Ok(SizeDiagnostic {
        json: format!("{}...", &body[..half]),
        context: encode(&notice.context)?.len(),
        params: encode(&notice.params)?.len(),
        environment: encode(&notice.environment)?.len(),
        session: encode(&notice.session)?.len(),
        errors: encode(&notice.errors)?.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notice::ErrorReport;
    use crate::domain::value::Value;

    fn notice() -> Notice {
        let mut notice = Notice::new(ErrorReport::new("TypeError", "boom"));
        notice.context.insert("severity".into(), Value::from("error"));
        notice
    }

    #[test]
    fn test_small_notice_fits_at_level_zero_unchanged() {
        let mut notice = notice();
        notice.params.insert("id".into(), Value::from(42));
        let expected = serde_json::to_string(&notice).unwrap();

        let reduced = SizeReducer::default().reduce(&mut notice).unwrap();
        assert_eq!(reduced.level, 0);
        assert_eq!(reduced.body, expected);
    }

    #[test]
    fn test_blacklist_applies_even_when_small() {
        let mut notice = notice();
        notice.params.insert("password".into(), Value::from("hunter2"));

        let reduced = SizeReducer::default().reduce(&mut notice).unwrap();
        assert!(reduced.body.contains(r#""password":"[Filtered]""#));
        assert!(!reduced.body.contains("hunter2"));
    }

    #[test]
    fn test_large_params_trigger_higher_level() {
        let mut notice = notice();
        for i in 0..100 {
            notice
                .params
                .insert(format!("field{:03}", i), Value::from("v".repeat(1000)));
        }

        let reduced = SizeReducer::new(10_000, KeyBlacklist::empty())
            .reduce(&mut notice)
            .unwrap();
        assert!(reduced.level > 0);
        assert!(reduced.body.len() < 10_000);
    }

    #[test]
    fn test_long_error_message_is_cut_at_level_zero() {
        let mut notice = Notice::new(ErrorReport::new("E", "m".repeat(4000)));
        SizeReducer::default().reduce(&mut notice).unwrap();
        assert_eq!(notice.errors[0].message.len(), 1024 + 3);
    }

    #[test]
    fn test_unfittable_notice_reports_diagnostic() {
        let mut notice = notice();
        notice.errors[0].message = "x".repeat(600);

        let err = SizeReducer::new(100, KeyBlacklist::empty())
            .reduce(&mut notice)
            .unwrap_err();

        match err {
            NotifyError::SizeLimit(SizeLimitError {
                max_length,
                diagnostic,
            }) => {
                assert_eq!(max_length, 100);
                assert!(diagnostic.json.ends_with("..."));
                assert!(diagnostic.errors > 600);
                assert_eq!(diagnostic.params, 2);
                assert!(diagnostic.context > 2);
            }
            other => panic!("expected size limit error, got {:?}", other),
        }
    }
}
