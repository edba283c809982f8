//! Dynamic values carried by condition cells, update payloads and result rows.

use std::fmt;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::relation::ConditionRelation;

/// A row of column → value pairs, in column order.
pub type Row = IndexMap<String, Value>;

static DIGITAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("static regex must compile"));

/// Returns `true` when the text is made of ASCII digits only.
///
/// Such values are emitted bare in INSERT and UPDATE statements.
pub fn is_digital(text: &str) -> bool {
    DIGITAL_RE.is_match(text)
}

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    IntSet(IndexSet<i64>),
    StrSet(IndexSet<String>),
    /// A nested relation: function-call predicates or JSON path updates.
    Table(ConditionRelation),
    /// An arbitrary JSON document, serialized before rendering.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Value::IntSet(_) | Value::StrSet(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Set members as plain strings, in insertion order.
    pub fn set_members(&self) -> Vec<String> {
        match self {
            Value::IntSet(set) => set.iter().map(|n| n.to_string()).collect(),
            Value::StrSet(set) => set.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Convert a JSON value.
    ///
    /// Arrays of integers or strings become sets; objects whose values are all
    /// objects become nested relations; any other object or array is kept as a
    /// JSON document.
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            J::String(s) => Value::String(s),
            J::Array(items) => {
                if items.iter().all(|v| v.is_i64()) {
                    Value::IntSet(items.iter().filter_map(|v| v.as_i64()).collect())
                } else if items.iter().all(|v| v.is_string()) {
                    Value::StrSet(
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                    )
                } else {
                    Value::Json(J::Array(items))
                }
            }
            J::Object(map) => {
                if !map.is_empty() && map.values().all(|v| v.is_object()) {
                    Value::Table(ConditionRelation::from_json_object(map))
                } else {
                    Value::Json(J::Object(map))
                }
            }
        }
    }

    /// Convert into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(n) => J::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::String(s) => J::String(s.clone()),
            Value::IntSet(set) => J::Array(set.iter().map(|n| J::from(*n)).collect()),
            Value::StrSet(set) => J::Array(set.iter().map(|s| J::String(s.clone())).collect()),
            Value::Table(table) => table.to_json(),
            Value::Json(json) => json.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) if !n.is_finite() => write!(f, "NULL"),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::IntSet(_) | Value::StrSet(_) => write!(f, "{}", self.set_members().join(",")),
            Value::Table(_) | Value::Json(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from_json)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntSet(v.into_iter().collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StrSet(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StrSet(v.into_iter().collect())
    }
}

impl From<ConditionRelation> for Value {
    fn from(v: ConditionRelation) -> Self {
        Value::Table(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from(30i64), Value::Int(30));
        assert_eq!(Value::from("bob"), Value::String("bob".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(vec![3i64, 1, 3]).to_string(), "3,1");
    }

    #[test]
    fn test_is_digital() {
        assert!(is_digital("12345"));
        assert!(!is_digital("12.5"));
        assert!(!is_digital("-3"));
        assert!(!is_digital(""));
        assert!(!is_digital("12a"));
    }

    #[test]
    fn test_from_json_shapes() {
        assert_eq!(Value::from_json(json!([1, 2])), Value::from(vec![1i64, 2]));
        assert_eq!(Value::from_json(json!(["a", "b"])), Value::from(vec!["a", "b"]));
        assert!(matches!(Value::from_json(json!([1, "a"])), Value::Json(_)));
        assert!(matches!(Value::from_json(json!({"a": 1})), Value::Json(_)));
        assert!(matches!(
            Value::from_json(json!({"ext": {"name": "jack"}})),
            Value::Table(_)
        ));
        assert_eq!(Value::from_json(json!(2.5)), Value::Float(2.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Bool(true).to_string(), "1");
        assert_eq!(Value::Json(json!({"a": 1})).to_string(), r#"{"a":1}"#);
        assert_eq!(Value::from(vec!["x", "y"]).to_string(), "x,y");
        assert_eq!(Value::Float(f64::NAN).to_string(), "NULL");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "NULL");
    }
}
