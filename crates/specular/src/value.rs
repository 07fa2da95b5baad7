//! Leaf values and lookup results

use serde_json::{json, Value};

/// Result of looking up a value in a spec or namespace
///
/// Distinguishes a path that does not exist from a node that exists
/// without a concrete value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// Nothing at the path
    NotFound,
    /// Node exists but holds no value
    Any,
    /// Node holds a concrete value
    Value(&'a Value),
}

impl<'a> Lookup<'a> {
    /// Build from an optional node value
    #[inline]
    #[must_use]
    pub fn from_value(value: Option<&'a Value>) -> Self {
        value.map_or(Self::Any, Self::Value)
    }

    /// Whether the path exists
    #[inline]
    #[must_use]
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    /// Whether the path exists without a value
    #[inline]
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// The concrete value, if any
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Concrete value, or `default` when the node exists without one,
    /// or `missing` when nothing exists at the path
    #[must_use]
    pub fn or(self, default: Value, missing: Value) -> Value {
        match self {
            Self::NotFound => missing,
            Self::Any => default,
            Self::Value(v) => v.clone(),
        }
    }
}

impl PartialEq<Value> for Lookup<'_> {
    fn eq(&self, other: &Value) -> bool {
        matches!(self, Self::Value(v) if *v == other)
    }
}

/// Value wrapper that is never recursed into when normalizing
///
/// `Data(json!({"one": 1}))` sets the whole object as a leaf value rather
/// than creating a child named `one`.
#[derive(Debug, Clone, PartialEq)]
pub struct Data(pub Value);

impl From<Data> for Value {
    fn from(data: Data) -> Self {
        json!({ "=": data.0 })
    }
}

/// Truthiness of a JSON value
///
/// `null`, `false`, zero, and empty strings, arrays and objects are false.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
