//! Breadcrumbs: recent events attached to every notice.

use crate::domain::value::{Map, Value};
use chrono::{DateTime, SecondsFormat, Utc};

/// One breadcrumb.
///
/// `fields` is free-form. Two entries are repeats of each other when their
/// type and fields are equal; the date and repeat count are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Kind of event, e.g. `log` or `navigation`
    pub entry_type: String,
    /// When the event happened; stamped on insertion if absent
    pub date: Option<DateTime<Utc>>,
    /// Event payload
    pub fields: Map,
    /// How many times the event occurred in a row, absent for one occurrence
    pub repeat_count: Option<u32>,
}

impl HistoryEntry {
    /// Create an entry of the given type with no fields.
    pub fn new(entry_type: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            date: None,
            fields: Map::new(),
            repeat_count: None,
        }
    }

    /// Add a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set the event time.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// True if `other` describes the same event.
    pub fn is_repeat_of(&self, other: &HistoryEntry) -> bool {
        self.entry_type == other.entry_type && self.fields == other.fields
    }

    /// Count one more occurrence: an absent count becomes 2.
    pub fn record_repeat(&mut self) {
        self.repeat_count = Some(self.repeat_count.map_or(2, |n| n.saturating_add(1)));
    }

    /// Render the entry as it appears in `context.history`.
    pub fn to_value(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("type".to_string(), Value::from(self.entry_type.as_str()));
        if let Some(date) = self.date {
            out.insert(
                "date".to_string(),
                Value::from(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        if let Some(n) = self.repeat_count {
            out.insert("num".to_string(), Value::from(n));
        }
        Value::object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_repeat_ignores_date_and_count() {
        let a = HistoryEntry::new("log").with_field("message", "retrying");
        let mut b = a.clone().with_date(Utc::now());
        b.record_repeat();
        assert!(a.is_repeat_of(&b));

        let c = HistoryEntry::new("log").with_field("message", "connected");
        assert!(!a.is_repeat_of(&c));
        assert!(!a.is_repeat_of(&HistoryEntry::new("navigation").with_field("message", "retrying")));
    }

    #[test]
    fn test_record_repeat_counts_from_two() {
        let mut entry = HistoryEntry::new("log");
        entry.record_repeat();
        assert_eq!(entry.repeat_count, Some(2));
        entry.record_repeat();
        assert_eq!(entry.repeat_count, Some(3));
    }

    #[test]
    fn test_to_value() {
        let date = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let mut entry = HistoryEntry::new("log")
            .with_field("message", "retrying")
            .with_date(date);
        entry.record_repeat();

        let json = serde_json::to_value(entry.to_value()).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "log",
                "message": "retrying",
                "date": "2021-03-04T05:06:07.000Z",
                "num": 2
            })
        );
    }
}
