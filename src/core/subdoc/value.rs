// src/core/subdoc/value.rs

//! The in-memory JSON tree a sub-document command works on.
//!
//! The tree owns its children exclusively and lives only for the duration of
//! one command. Numbers keep their literal text, so re-serializing a document
//! never reformats values the command did not touch.

use crate::core::SubdocError;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;

/// A JSON value. Object members keep their insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Parses a stored document. Anything but a single JSON object or array is
    /// reported as `DocNotJson`.
    pub fn parse_document(bytes: &[u8]) -> Result<Value, SubdocError> {
        match parse_single(bytes) {
            Some(value) if value.is_container() => Ok(value),
            _ => Err(SubdocError::DocNotJson),
        }
    }

    /// Parses a client fragment that must contain exactly one JSON value.
    pub fn parse_fragment(bytes: &[u8]) -> Result<Value, SubdocError> {
        parse_single(bytes).ok_or(SubdocError::ValueCantInsert)
    }

    /// Parses a client fragment holding one or more comma separated values,
    /// as accepted by the array push and insert operations.
    pub fn parse_fragment_list(bytes: &[u8]) -> Result<Vec<Value>, SubdocError> {
        let mut wrapped = Vec::with_capacity(bytes.len() + 2);
        wrapped.push(b'[');
        wrapped.extend_from_slice(bytes);
        wrapped.push(b']');
        match parse_single(&wrapped) {
            Some(Value::Array(items)) if !items.is_empty() => Ok(items),
            _ => Err(SubdocError::ValueCantInsert),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_container()
    }

    /// Number of levels this value occupies: 1 for scalars and empty
    /// containers, otherwise one more than the deepest child.
    pub fn depth(&self) -> usize {
        let children = match self {
            Value::Array(items) => items.iter().map(Value::depth).max(),
            Value::Object(map) => map.values().map(Value::depth).max(),
            _ => None,
        };
        1 + children.unwrap_or(0)
    }

    /// Compact serialization, without insignificant whitespace.
    pub fn to_json_bytes(&self) -> Result<Bytes, SubdocError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| SubdocError::Internal(format!("JSON serialization failed: {e}")))
    }
}

fn parse_single(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .map(Value::from)
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}
