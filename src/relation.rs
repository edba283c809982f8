//! Sparse column → operator → value relation used as the condition algebra.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::naming;
use crate::value::Value;

/// Column key marking function-call predicates.
pub const T_FUNC: &str = "T_FUNC";

/// Soft-delete marker column.
pub const DELETED_FLAG_FIELD: &str = "is_deleted";

/// Operator key that, under [`DELETED_FLAG_FIELD`], disables the implicit
/// not-deleted filter. Its value is ignored.
pub const EXCLUSION_DELETED_FLAG: &str = "EXCLUSION_DELETED_CONDITION_FLAG";

/// Prefix on a JSON key in an update payload meaning `JSON_REMOVE`.
pub const REMOVE_JSON_FIELD_PREFIX: char = '-';

/// An ordered sparse relation of condition cells.
///
/// ```
/// use leaf_sql::prelude::*;
///
/// let condition = ConditionRelation::new()
///     .with("created_at", Operator::Ge, 1_600_000_000i64)
///     .with("created_at", Operator::Le, 1_700_000_000i64)
///     .with("username", Operator::RightLike, "jetty");
/// assert_eq!(condition.len(), 3);
/// assert_eq!(condition.columns().count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionRelation {
    rows: IndexMap<String, IndexMap<String, Value>>,
}

impl ConditionRelation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cell, replacing the value of an existing (column, operator) pair in place.
    pub fn put(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.rows
            .entry(column.into())
            .or_default()
            .insert(operator.into(), value.into());
        self
    }

    /// Builder form of [`put`](Self::put).
    pub fn with(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.put(column, operator, value);
        self
    }

    /// Build a relation from object-shaped field names, converting them to column names.
    pub fn from_fields<I, F, O, V>(cells: I) -> Self
    where
        I: IntoIterator<Item = (F, O, V)>,
        F: AsRef<str>,
        O: Into<String>,
        V: Into<Value>,
    {
        let mut relation = Self::new();
        for (field, operator, value) in cells {
            relation.put(naming::to_column_name(field.as_ref()), operator, value);
        }
        relation
    }

    /// Mark the relation so the implicit `is_deleted` filter is not applied.
    pub fn include_deleted(self) -> Self {
        self.with(DELETED_FLAG_FIELD, EXCLUSION_DELETED_FLAG, Value::Null)
    }

    /// Remove a cell, keeping the order of the remaining cells.
    pub fn remove(&mut self, column: &str, operator: &str) -> Option<Value> {
        let row = self.rows.get_mut(column)?;
        let removed = row.shift_remove(operator);
        if row.is_empty() {
            self.rows.shift_remove(column);
        }
        removed
    }

    pub fn get(&self, column: &str, operator: &str) -> Option<&Value> {
        self.rows.get(column).and_then(|row| row.get(operator))
    }

    pub fn contains(&self, column: &str, operator: &str) -> bool {
        self.get(column, operator).is_some()
    }

    /// Operator → value cells of one column.
    pub fn row(&self, column: &str) -> Option<&IndexMap<String, Value>> {
        self.rows.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &IndexMap<String, Value>)> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every cell as `(column, operator, value)`, in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.rows.iter().flat_map(|(column, row)| {
            row.iter()
                .map(move |(op, value)| (column.as_str(), op.as_str(), value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.rows.values().map(IndexMap::len).sum()
    }

    pub(crate) fn from_json_object(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut relation = Self::new();
        for (column, cells) in map {
            if let serde_json::Value::Object(cells) = cells {
                for (operator, value) in cells {
                    relation.put(column.clone(), operator, Value::from_json(value));
                }
            }
        }
        relation
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .rows
            .iter()
            .map(|(column, row)| {
                let cells = row
                    .iter()
                    .map(|(op, value)| (op.clone(), value.to_json()))
                    .collect();
                (column.clone(), serde_json::Value::Object(cells))
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_preserves_order_and_replaces_in_place() {
        let mut rel = ConditionRelation::new();
        rel.put("b", "EQ", 1i64).put("a", "EQ", 2i64).put("b", "EQ", 3i64);
        let cells: Vec<_> = rel.cells().map(|(c, o, v)| (c, o, v.clone())).collect();
        assert_eq!(
            cells,
            vec![("b", "EQ", Value::Int(3)), ("a", "EQ", Value::Int(2))]
        );
    }

    #[test]
    fn test_remove_drops_empty_rows() {
        let mut rel = ConditionRelation::new().include_deleted();
        assert!(rel.contains(DELETED_FLAG_FIELD, EXCLUSION_DELETED_FLAG));
        assert_eq!(
            rel.remove(DELETED_FLAG_FIELD, EXCLUSION_DELETED_FLAG),
            Some(Value::Null)
        );
        assert!(rel.is_empty());
        assert_eq!(rel.remove("nope", "EQ"), None);
    }

    #[test]
    fn test_from_fields_converts_names() {
        let rel = ConditionRelation::from_fields([("createdAt", "GE", 10i64)]);
        assert!(rel.contains("created_at", "GE"));
    }

    #[test]
    fn test_deserialize_nested() {
        let rel: ConditionRelation = serde_json::from_str(
            r#"{"age": {"GE": 18, "LE": 30}, "T_FUNC": {"concat": {"username, '-', nickname": {"RIGHT_LIKE": "77"}}}}"#,
        )
        .unwrap();
        assert_eq!(rel.len(), 3);
        assert!(matches!(rel.get(T_FUNC, "concat"), Some(Value::Table(_))));
        assert_eq!(rel.columns().collect::<Vec<_>>(), vec!["age", T_FUNC]);
    }
}
