//! Loosely-typed values.
//!
//! Caveats, facts and policies are free-form trees on the wire. They are
//! carried through the crate as [`Value`], a small tagged union that is
//! independent of whichever codec produced it. Conversions from codec node
//! types ([`Ipld`] for DAG-CBOR, [`serde_json::Value`] for compact tokens)
//! live here and nowhere else.

use base64::prelude::*;
use ipld_core::ipld::Ipld;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::collections::BTreeMap;

/// A map of string keys to [`Value`]s, as used for caveats and headers.
pub type ValueMap = BTreeMap<String, Value>;

/// A self-describing value decoded from a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null, or a node kind that has no counterpart here.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string. Content links are carried as their string form.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed map.
    Map(ValueMap),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the string, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view. Floats with no fractional part are accepted.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric view covering both integers and floats.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow the bytes, if this is a byte string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow the list, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the map, if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` when this is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::Map(value)
    }
}

impl From<&Ipld> for Value {
    fn from(node: &Ipld) -> Self {
        match node {
            Ipld::Null => Value::Null,
            Ipld::Bool(b) => Value::Bool(*b),
            // Integers outside the i64 range have no counterpart.
            Ipld::Integer(i) => i64::try_from(*i).map_or(Value::Null, Value::Int),
            Ipld::Float(f) => Value::Float(*f),
            Ipld::String(s) => Value::String(s.clone()),
            Ipld::Bytes(b) => Value::Bytes(b.clone()),
            Ipld::List(items) => Value::List(items.iter().map(Value::from).collect()),
            Ipld::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
            Ipld::Link(cid) => Value::String(cid.to_string()),
        }
    }
}

impl From<Ipld> for Value {
    fn from(node: Ipld) -> Self {
        Value::from(&node)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(node: &serde_json::Value) -> Self {
        match node {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(node: serde_json::Value) -> Self {
        Value::from(&node)
    }
}

/// Bytes serialize in the DAG-JSON shape `{"/": {"bytes": "<base64>"}}`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                let mut inner = BTreeMap::new();
                inner.insert("bytes", BASE64_STANDARD_NO_PAD.encode(bytes));
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("/", &inner)?;
                map.end()
            }
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}
