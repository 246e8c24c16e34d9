//! Size-bounding of arbitrary value trees.
//!
//! The truncator walks a value tree and produces a new, bounded tree:
//! - strings are cut to a maximum length and suffixed with `...`
//! - arrays and objects are cut to a maximum breadth
//! - nesting below a maximum depth is replaced with a `[Truncated <Type>]` sentinel
//! - values of blacklisted keys are replaced with `[Filtered]`
//! - a container reached a second time is replaced with `[Circular ~<path>]`
//!
//! All four limits are scaled down by a level: `limit >> level`, never below 1.
//! Truncation never fails; anything that cannot be expanded becomes a sentinel.

use crate::domain::blacklist::{KeyBlacklist, FILTERED};
use crate::domain::notice::ErrorReport;
use crate::domain::value::{error_repr, Map, Value};

/// Most aggressive truncation level.
pub const MAX_LEVEL: u8 = 7;

const MAX_STRING_LENGTH: usize = 1024;
const MAX_OBJECT_LENGTH: usize = 128;
const MAX_ARRAY_LENGTH: usize = 128;
const MAX_DEPTH: usize = 8;

/// Key under which an opaque object's type name is recorded.
pub const TYPE_TAG: &str = "__type";

fn scale(limit: usize, level: u8) -> usize {
    limit.checked_shr(u32::from(level)).unwrap_or(0).max(1)
}

/// Size limits for one truncation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum string length in characters
    pub max_string_length: usize,
    /// Maximum number of object fields kept
    pub max_object_length: usize,
    /// Maximum number of array elements kept
    pub max_array_length: usize,
    /// Maximum container nesting
    pub max_depth: usize,
}

impl Limits {
    /// Limits at `level`, where 0 is the most permissive.
    pub fn at_level(level: u8) -> Self {
        Self {
            max_string_length: scale(MAX_STRING_LENGTH, level),
            max_object_length: scale(MAX_OBJECT_LENGTH, level),
            max_array_length: scale(MAX_ARRAY_LENGTH, level),
            max_depth: scale(MAX_DEPTH, level),
        }
    }
}

/// Bounds value trees at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct Truncator<'a> {
    limits: Limits,
    blacklist: &'a KeyBlacklist,
}

impl<'a> Truncator<'a> {
    /// Create a truncator for `level` (clamped to [`MAX_LEVEL`]).
    pub fn new(level: u8, blacklist: &'a KeyBlacklist) -> Self {
        Self {
            limits: Limits::at_level(level.min(MAX_LEVEL)),
            blacklist,
        }
    }

    /// The limits in effect.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Truncate a single value.
    pub fn truncate(&self, value: &Value) -> Value {
        Walk::new(self).truncate(value, "", 0)
    }

    /// Truncate a notice field, treating the map as the root object.
    pub fn truncate_map(&self, map: &Map) -> Map {
        let mut walk = Walk::new(self);
        let root = walk.enter(None, "");
        let entries = map
            .iter()
            .map(|(key, value)| (key.clone(), Some(value.clone())))
            .collect();
        let out = walk.truncate_fields(entries, 1);
        walk.leave(root);
        out
    }

    /// Cut a string to the maximum length.
    pub fn truncate_string(&self, s: &str) -> String {
        match s.char_indices().nth(self.limits.max_string_length) {
            Some((cut, _)) => format!("{}...", &s[..cut]),
            None => s.to_string(),
        }
    }

    /// Bound a structured error in place.
    pub fn truncate_report(&self, report: &mut ErrorReport) {
        report.error_type = self.truncate_string(&report.error_type);
        report.message = self.truncate_string(&report.message);
        report.backtrace.truncate(self.limits.max_array_length);
        for frame in &mut report.backtrace {
            frame.function = self.truncate_string(&frame.function);
            frame.file = self.truncate_string(&frame.file);
        }
    }
}

/// A container visited during one walk.
struct Seen {
    identity: Option<usize>,
    key: String,
    parent: Option<usize>,
}

/// State of a single truncation call.
struct Walk<'t, 'a> {
    truncator: &'t Truncator<'a>,
    max_depth: usize,
    seen: Vec<Seen>,
    stack: Vec<usize>,
}

impl<'t, 'a> Walk<'t, 'a> {
    fn new(truncator: &'t Truncator<'a>) -> Self {
        Self {
            truncator,
            max_depth: truncator.limits.max_depth,
            seen: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn truncate(&mut self, value: &Value, key: &str, depth: usize) -> Value {
        match value {
            Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::Function(_)
            | Value::Date(_)
            | Value::Pattern(_) => value.clone(),
            Value::String(s) => Value::String(self.truncator.truncate_string(s)),
            Value::Error { type_name, message } => {
                Value::String(self.truncator.truncate_string(&error_repr(type_name, message)))
            }
            Value::Array(_) | Value::Object(_) | Value::Opaque(_) => {
                self.expand(value, key, depth)
            }
        }
    }

    fn expand(&mut self, value: &Value, key: &str, depth: usize) -> Value {
        let identity = value.identity();
        if let Some(index) = self.seen.iter().position(|s| s.identity == identity) {
            return Value::String(format!("[Circular {}]", self.path(index)));
        }

        let depth = depth + 1;
        if depth > self.max_depth {
            return Value::String(format!("[Truncated {}]", value.type_name()));
        }

        let node = self.enter(identity, key);
        let out = match value {
            Value::Array(array) => {
                // A poisoned container reads as empty.
                let elements = array.read().map(|e| e.clone()).unwrap_or_default();
                self.truncate_elements(&elements, depth)
            }
            Value::Object(object) => {
                let entries = object
                    .read()
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|(k, v)| (k.clone(), Some(v.clone())))
                            .collect()
                    })
                    .unwrap_or_default();
                Value::object(self.truncate_fields(entries, depth))
            }
            Value::Opaque(opaque) => {
                let entries = opaque
                    .keys()
                    .into_iter()
                    .map(|k| {
                        let read = opaque.get(&k).ok().flatten();
                        (k, read)
                    })
                    .collect();

                // Opaque objects are always expanded exactly one level.
                let saved = self.max_depth;
                self.max_depth = 0;
                let mut fields = self.truncate_fields(entries, depth);
                self.max_depth = saved;

                fields.insert(TYPE_TAG.to_string(), Value::from(opaque.type_name()));
                Value::object(fields)
            }
            _ => value.clone(),
        };
        self.leave(node);
        out
    }

    fn truncate_elements(&mut self, elements: &[Value], depth: usize) -> Value {
        let max = self.truncator.limits.max_array_length;
        let out = elements
            .iter()
            .take(max)
            .enumerate()
            .map(|(i, element)| self.truncate(element, &i.to_string(), depth))
            .collect();
        Value::array(out)
    }

    /// Entries with a `None` value are absent (or could not be read) and are skipped.
    fn truncate_fields(&mut self, entries: Vec<(String, Option<Value>)>, depth: usize) -> Map {
        let max = self.truncator.limits.max_object_length;
        let mut out = Map::new();
        let mut length = 0;

        for (key, value) in entries {
            if self.truncator.blacklist.is_blacklisted(&key) {
                out.insert(key, Value::from(FILTERED));
                continue;
            }
            let value = match value {
                None | Some(Value::Function(_)) => continue,
                Some(value) => value,
            };

            let truncated = self.truncate(&value, &key, depth);
            out.insert(key, truncated);
            length += 1;
            if length >= max {
                break;
            }
        }

        out
    }

    fn enter(&mut self, identity: Option<usize>, key: &str) -> usize {
        self.seen.push(Seen {
            identity,
            key: key.to_string(),
            parent: self.stack.last().copied(),
        });
        let index = self.seen.len() - 1;
        self.stack.push(index);
        index
    }

    fn leave(&mut self, index: usize) {
        if self.stack.last() == Some(&index) {
            self.stack.pop();
        }
    }

    /// Dotted key path from the root to a visited container, e.g. `~.user.profile`.
    fn path(&self, index: usize) -> String {
        let mut keys = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            keys.push(self.seen[i].key.as_str());
            cursor = self.seen[i].parent;
        }
        keys.reverse();
        format!("~{}", keys.join("."))
    }
}

/// Truncate a value at `level` with the given blacklist.
pub fn truncate(value: &Value, level: u8, blacklist: &KeyBlacklist) -> Value {
    Truncator::new(level, blacklist).truncate(value)
}
