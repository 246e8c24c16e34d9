//! Context and breadcrumb history attached to future notices.

use crate::domain::history::HistoryEntry;
use crate::domain::value::{Map, Value};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Maximum number of history entries kept.
pub const HISTORY_CAPACITY: usize = 20;

/// Mutable context map plus a bounded, deduplicating history.
///
/// Cloning produces an isolated scope: the context values are deep-copied
/// and the history is snapshotted, so neither side observes later changes
/// to the other.
#[derive(Debug, Default)]
pub struct Scope {
    context: Map,
    history: VecDeque<HistoryEntry>,
}

impl Scope {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `context` into the scope's context; later keys win.
    pub fn set_context(&mut self, context: Map) {
        self.context.extend(context);
    }

    /// Set one context key.
    pub fn set_context_value(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(key.into(), value.into());
    }

    /// A copy of the context, with the history under `history` when non-empty.
    pub fn context(&self) -> Map {
        let mut context = self.context.clone();
        if !self.history.is_empty() {
            let history = self.history.iter().map(HistoryEntry::to_value).collect();
            context.insert("history".to_string(), Value::array(history));
        }
        context
    }

    /// Record a breadcrumb stamped with the current time if it has none.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.push_history_at(entry, Utc::now());
    }

    /// Record a breadcrumb, stamping it with `now` if it has no date.
    ///
    /// A repeat of the most recent entry bumps that entry's repeat count
    /// instead of appending.
    pub fn push_history_at(&mut self, mut entry: HistoryEntry, now: DateTime<Utc>) {
        if let Some(last) = self.history.back_mut() {
            if last.is_repeat_of(&entry) {
                last.record_repeat();
                return;
            }
        }

        entry.date.get_or_insert(now);
        self.history.push_back(entry);
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
    }

    /// The history in insertion order.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    /// Number of history entries.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            context: self
                .context
                .iter()
                .map(|(key, value)| (key.clone(), value.deep_copy()))
                .collect(),
            history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn click(target: &str) -> HistoryEntry {
        HistoryEntry::new("click").with_field("target", target)
    }

    #[test]
    fn test_set_context_merges_last_write_wins() {
        let mut scope = Scope::new();
        scope.set_context_value("user", "alice");
        scope.set_context_value("component", "api");

        let mut update = Map::new();
        update.insert("user".into(), Value::from("bob"));
        scope.set_context(update);

        let context = scope.context();
        assert_eq!(context.get("user"), Some(&Value::from("bob")));
        assert_eq!(context.get("component"), Some(&Value::from("api")));
        assert!(!context.contains_key("history"));
    }

    #[test]
    fn test_repeated_entry_increments_count() {
        let mut scope = Scope::new();
        scope.push_history(click("#btn"));
        scope.push_history(click("#btn"));

        assert_eq!(scope.history_len(), 1);
        let entry = scope.history().next().unwrap();
        assert_eq!(entry.repeat_count, Some(2));

        scope.push_history(click("#btn"));
        assert_eq!(scope.history().next().unwrap().repeat_count, Some(3));
    }

    #[test]
    fn test_only_adjacent_entries_are_deduplicated() {
        let mut scope = Scope::new();
        scope.push_history(click("#a"));
        scope.push_history(click("#b"));
        scope.push_history(click("#a"));
        assert_eq!(scope.history_len(), 3);
    }

    #[test]
    fn test_date_is_stamped_when_absent() {
        let now = Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap();
        let earlier = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();

        let mut scope = Scope::new();
        scope.push_history_at(click("#a"), now);
        scope.push_history_at(click("#b").with_date(earlier), now);

        let dates: Vec<_> = scope.history().map(|e| e.date).collect();
        assert_eq!(dates, vec![Some(now), Some(earlier)]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut scope = Scope::new();
        for i in 0..25 {
            scope.push_history(click(&format!("#{}", i)));
        }

        assert_eq!(scope.history_len(), HISTORY_CAPACITY);
        let first = scope.history().next().unwrap();
        assert_eq!(first.fields.get("target"), Some(&Value::from("#5")));
    }

    #[test]
    fn test_context_attaches_history() {
        let mut scope = Scope::new();
        scope.push_history(click("#btn"));

        let context = scope.context();
        let history = context.get("history").unwrap();
        assert_eq!(history.len(), Some(1));
        assert_eq!(
            history.at(0).unwrap().get("type"),
            Some(Value::from("click"))
        );
    }

    #[test]
    fn test_clone_is_isolated() {
        let nested = Value::empty_object();
        let mut base = Scope::new();
        base.set_context_value("request", nested.clone());
        base.push_history(click("#a"));

        let mut derived = base.clone();
        derived.push_history(click("#b"));
        derived.set_context_value("user", "bob");
        derived
            .context()
            .get("request")
            .unwrap()
            .insert("path", Value::from("/x"));

        base.push_history(click("#c"));

        assert_eq!(base.history_len(), 2);
        assert_eq!(derived.history_len(), 2);
        assert!(!base.context().contains_key("user"));
        assert_eq!(nested.len(), Some(0));
    }
}
