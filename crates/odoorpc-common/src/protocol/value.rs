//! XML-RPC value model
//!
//! [`Value`] is the native side of the wire codec: one variant per XML-RPC
//! primitive plus an [`Value::Opaque`] escape hatch for well-formed elements
//! the decoder does not interpret.
//!
//! # Conversions
//!
//! `From` is implemented for the usual Rust scalars, `Vec<T>`, `Option<T>`,
//! `BTreeMap<String, T>` and `serde_json::Value`. Anything else should be
//! turned into a string by the caller via [`Value::display`], which is the
//! documented lossy fallback.

use std::collections::BTreeMap;
use std::fmt;

/// Mapping type used for `<struct>` values.
///
/// Member order is not significant on the wire, so a sorted map keeps the
/// encoder output deterministic.
pub type Struct = BTreeMap<String, Value>;

/// A value in the XML-RPC type system
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `<nil/>`
    Nil,
    /// `<string>`
    String(String),
    /// `<int>`, `<i4>` or `<i8>`
    Int(i64),
    /// `<double>`
    Double(f64),
    /// `<boolean>`
    Bool(bool),
    /// `<array><data>`
    Array(Vec<Value>),
    /// `<struct>`
    Struct(Struct),
    /// A well-formed typed element the codec does not interpret
    /// (e.g. `dateTime.iso8601`, `base64`). Re-encodes as the same element.
    Opaque { tag: String, text: String },
}

impl Value {
    /// Lossy fallback for native shapes with no wire representation.
    pub fn display(value: impl fmt::Display) -> Self {
        Value::String(value.to_string())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Looks up a struct member by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_struct().and_then(|members| members.get(key))
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

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Nil, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(members: BTreeMap<String, T>) -> Self {
        Value::Struct(members.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                // u64 beyond i64::MAX and real numbers both land here
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(members) => Value::Struct(
                members.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Value::Nil => Json::Null,
            Value::String(s) => Json::String(s),
            Value::Int(i) => Json::from(i),
            // NaN and infinities have no JSON form
            Value::Double(d) => serde_json::Number::from_f64(d).map_or(Json::Null, Json::Number),
            Value::Bool(b) => Json::Bool(b),
            Value::Array(items) => Json::Array(items.into_iter().map(Json::from).collect()),
            Value::Struct(members) => Json::Object(
                members.into_iter().map(|(k, v)| (k, Json::from(v))).collect(),
            ),
            Value::Opaque { text, .. } => Json::String(text),
        }
    }
}
