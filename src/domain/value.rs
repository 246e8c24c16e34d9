//! Loosely-typed value tree attached to notices.
//!
//! Applications hand the notifier arbitrary data (context, params, session
//! state ...). `Value` models that data as a closed set of kinds so the
//! truncator can apply one rule per kind.
//!
//! Arrays and objects are shared, mutable containers: cloning a `Value` clones
//! the handle, not the contents. This makes it possible to represent graphs
//! with cycles (`a.self = a`), which the truncator detects by container identity.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Keyed collection of values, used for notice fields and object contents.
pub type Map = BTreeMap<String, Value>;

/// Shared handle to an array's elements.
pub type SharedArray = Arc<RwLock<Vec<Value>>>;

/// Shared handle to an object's fields.
pub type SharedObject = Arc<RwLock<Map>>;

/// Error raised when an attribute of an opaque object cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attribute `{key}` is not readable: {reason}")]
pub struct AccessError {
    /// The attribute that faulted
    pub key: String,
    /// Why the read failed
    pub reason: String,
}

impl AccessError {
    /// Create a new access error for `key`.
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A platform-specific object the notifier knows nothing about.
///
/// Attribute reads may fault (permission checks, proxies, handles that went
/// away). The truncator treats a faulting read as an absent attribute.
pub trait OpaqueObject: Send + Sync + fmt::Debug {
    /// Name of the underlying type, used to tag the truncated output.
    fn type_name(&self) -> &str;

    /// Attribute names in enumeration order.
    fn keys(&self) -> Vec<String>;

    /// Read one attribute. `Ok(None)` means the attribute is absent.
    fn get(&self, key: &str) -> Result<Option<Value>, AccessError>;
}

/// A node in the value tree.
#[derive(Clone)]
pub enum Value {
    /// Absent or null value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer or finite float
    Number(serde_json::Number),
    /// Text
    String(String),
    /// A callable, identified by name. Never serialized with content.
    Function(String),
    /// Point in time
    Date(DateTime<Utc>),
    /// Compiled pattern
    Pattern(Regex),
    /// An error value, rendered as `"<type>: <message>"` when truncated
    Error {
        /// Error type name
        type_name: String,
        /// Error message
        message: String,
    },
    /// Shared array
    Array(SharedArray),
    /// Shared object
    Object(SharedObject),
    /// Platform-specific object with fallible attribute access
    Opaque(Arc<dyn OpaqueObject>),
}

impl Value {
    /// Create a new shared array.
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(elements)))
    }

    /// Create a new shared object.
    pub fn object(fields: Map) -> Self {
        Value::Object(Arc::new(RwLock::new(fields)))
    }

    /// Create an empty shared object.
    pub fn empty_object() -> Self {
        Self::object(Map::new())
    }

    /// Create a function value.
    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(name.into())
    }

    /// Create an error value.
    pub fn error(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Wrap a platform-specific object.
    pub fn opaque(object: impl OpaqueObject + 'static) -> Self {
        Value::Opaque(Arc::new(object))
    }

    /// Identity of a container value, `None` for scalars.
    ///
    /// Two values share an identity exactly when they are handles to the
    /// same container.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(array) => Some(Arc::as_ptr(array) as *const () as usize),
            Value::Object(object) => Some(Arc::as_ptr(object) as *const () as usize),
            Value::Opaque(opaque) => Some(Arc::as_ptr(opaque) as *const () as usize),
            _ => None,
        }
    }

    /// Name of the value's type as shown in truncation sentinels.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Function(_) => "Function",
            Value::Date(_) => "Date",
            Value::Pattern(_) => "RegExp",
            Value::Error { .. } => "Error",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Opaque(opaque) => opaque.type_name(),
        }
    }

    /// Returns the string contents if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Insert a field into an object value.
    ///
    /// Returns false if this value is not an object.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(object) => {
                object
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Append an element to an array value.
    ///
    /// Returns false if this value is not an array.
    pub fn push(&self, value: Value) -> bool {
        match self {
            Value::Array(array) => {
                array
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(value);
                true
            }
            _ => false,
        }
    }

    /// Read a field of an object value.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(object) => object
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned(),
            _ => None,
        }
    }

    /// Read an element of an array value.
    pub fn at(&self, index: usize) -> Option<Value> {
        match self {
            Value::Array(array) => array
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(index)
                .cloned(),
            _ => None,
        }
    }

    /// Number of elements or fields in a container, `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(array) => Some(array.read().unwrap_or_else(PoisonError::into_inner).len()),
            Value::Object(object) => {
                Some(object.read().unwrap_or_else(PoisonError::into_inner).len())
            }
            _ => None,
        }
    }

    /// Copy the value tree into fresh containers.
    ///
    /// Shared and cyclic references inside the tree are reproduced between
    /// the copies. Opaque objects stay shared.
    pub fn deep_copy(&self) -> Value {
        self.deep_copy_with(&mut HashMap::new())
    }

    fn deep_copy_with(&self, copies: &mut HashMap<usize, Value>) -> Value {
        let identity = match (self, self.identity()) {
            (Value::Array(_) | Value::Object(_), Some(identity)) => identity,
            _ => return self.clone(),
        };
        if let Some(copy) = copies.get(&identity) {
            return copy.clone();
        }

        match self {
            Value::Array(array) => {
                let copy = Value::array(Vec::new());
                copies.insert(identity, copy.clone());
                let elements = array.read().unwrap_or_else(PoisonError::into_inner).clone();
                for element in &elements {
                    copy.push(element.deep_copy_with(copies));
                }
                copy
            }
            Value::Object(object) => {
                let copy = Value::empty_object();
                copies.insert(identity, copy.clone());
                let fields = object.read().unwrap_or_else(PoisonError::into_inner).clone();
                for (key, value) in &fields {
                    copy.insert(key.clone(), value.deep_copy_with(copies));
                }
                copy
            }
            _ => self.clone(),
        }
    }
}

/// String form of an error value: `"Type: message"`, or whichever part is present.
pub(crate) fn error_repr(type_name: &str, message: &str) -> String {
    match (type_name.is_empty(), message.is_empty()) {
        (true, _) => message.to_string(),
        (false, true) => type_name.to_string(),
        (false, false) => format!("{}: {}", type_name, message),
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    /// Scalars compare by value, containers by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Pattern(a), Value::Pattern(b)) => a.as_str() == b.as_str(),
            (
                Value::Error {
                    type_name: ta,
                    message: ma,
                },
                Value::Error {
                    type_name: tb,
                    message: mb,
                },
            ) => ta == tb && ma == mb,
            (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
            | (Value::Opaque(_), Value::Opaque(_)) => self.identity() == other.identity(),
            _ => false,
        }
    }
}

// Containers are printed shallowly so that cyclic graphs can be debugged.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Function(name) => f.debug_tuple("Function").field(name).finish(),
            Value::Date(date) => f.debug_tuple("Date").field(date).finish(),
            Value::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Value::Error { type_name, message } => f
                .debug_struct("Error")
                .field("type_name", type_name)
                .field("message", message)
                .finish(),
            Value::Array(_) => f
                .debug_struct("Array")
                .field("len", &self.len().unwrap_or(0))
                .finish(),
            Value::Object(object) => {
                let keys: Vec<String> = object
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .keys()
                    .cloned()
                    .collect();
                f.debug_struct("Object").field("keys", &keys).finish()
            }
            Value::Opaque(opaque) => f
                .debug_struct("Opaque")
                .field("type_name", &opaque.type_name())
                .finish(),
        }
    }
}

/// Serializes the value as JSON-compatible data.
///
/// Serialization follows container contents and therefore must only be
/// applied to trees that went through the truncator, which breaks cycles.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Function(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(date) => {
                serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Pattern(re) => serializer.serialize_str(&format!("/{}/", re.as_str())),
            Value::Error { type_name, message } => {
                serializer.serialize_str(&error_repr(type_name, message))
            }
            Value::Array(array) => {
                let elements = array.read().unwrap_or_else(PoisonError::into_inner);
                let mut seq = serializer.serialize_seq(Some(elements.len()))?;
                for element in elements.iter() {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Value::Object(object) => {
                let fields = object.read().unwrap_or_else(PoisonError::into_inner);
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Opaque(opaque) => {
                serializer.serialize_str(&format!("[{}]", opaque.type_name()))
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(elements) => {
                Value::array(elements.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl From<Regex> for Value {
    fn from(re: Regex) -> Self {
        Value::Pattern(re)
    }
}

impl From<Map> for Value {
    fn from(fields: Map) -> Self {
        Value::object(fields)
    }
}

impl From<Vec<Value>> for Value {
    fn from(elements: Vec<Value>) -> Self {
        Value::array(elements)
    }
}

/// Convert a JSON object into a notice field map.
///
/// Non-object JSON values produce an empty map.
pub fn map_from_json(value: serde_json::Value) -> Map {
    match value {
        serde_json::Value::Object(fields) => fields
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect(),
        _ => Map::new(),
    }
}
