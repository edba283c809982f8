//! Typed condition model: the operator vocabulary and the rendered condition variants.
//!
//! Relations carry operators as plain strings; they are resolved to
//! [`Operator`] here, so an unknown operator fails when a relation is
//! translated rather than when the SQL reaches the database.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{SqlError, SqlResult};
use crate::escape::{check, escape_raw_string, escape_string};
use crate::naming::{qualify, to_column_name};
use crate::relation::{ConditionRelation, T_FUNC};
use crate::value::{is_digital, Value};

/// Comparison operators accepted in condition relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    StrEq,
    StrNotEq,
    StrGt,
    StrGe,
    StrLt,
    StrLe,
    StrIn,
    StrNotIn,
    /// Prefix-anchored `LIKE 'v%'`.
    RightLike,
    /// Suffix-anchored `LIKE '%v'`.
    LeftLike,
    /// `LIKE '%v%'`.
    Like,
    /// `NOT LIKE '%v%'`.
    NotLike,
}

impl Operator {
    pub const ALL: [Operator; 20] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::In,
        Operator::NotIn,
        Operator::StrEq,
        Operator::StrNotEq,
        Operator::StrGt,
        Operator::StrGe,
        Operator::StrLt,
        Operator::StrLe,
        Operator::StrIn,
        Operator::StrNotIn,
        Operator::RightLike,
        Operator::LeftLike,
        Operator::Like,
        Operator::NotLike,
    ];

    /// Vocabulary name, e.g. `STR_EQ`.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::NotEq => "NOT_EQ",
            Operator::Gt => "GT",
            Operator::Ge => "GE",
            Operator::Lt => "LT",
            Operator::Le => "LE",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::StrEq => "STR_EQ",
            Operator::StrNotEq => "STR_NOT_EQ",
            Operator::StrGt => "STR_GT",
            Operator::StrGe => "STR_GE",
            Operator::StrLt => "STR_LT",
            Operator::StrLe => "STR_LE",
            Operator::StrIn => "STR_IN",
            Operator::StrNotIn => "STR_NOT_IN",
            Operator::RightLike => "RIGHT_LIKE",
            Operator::LeftLike => "LEFT_LIKE",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT_LIKE",
        }
    }

    /// SQL token.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq | Operator::StrEq => "=",
            Operator::NotEq | Operator::StrNotEq => "!=",
            Operator::Gt | Operator::StrGt => ">",
            Operator::Ge | Operator::StrGe => ">=",
            Operator::Lt | Operator::StrLt => "<",
            Operator::Le | Operator::StrLe => "<=",
            Operator::In | Operator::StrIn => "IN",
            Operator::NotIn | Operator::StrNotIn => "NOT IN",
            Operator::RightLike | Operator::LeftLike | Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }

    pub fn is_str_prefixed(self) -> bool {
        self.name().starts_with("STR_")
    }

    pub fn is_like(self) -> bool {
        matches!(
            self,
            Operator::RightLike | Operator::LeftLike | Operator::Like | Operator::NotLike
        )
    }

    /// Expects a string operand: `STR_*` or any `LIKE` form.
    pub fn is_string_typed(self) -> bool {
        self.is_str_prefixed() || self.is_like()
    }

    pub fn is_set(self) -> bool {
        matches!(
            self,
            Operator::In | Operator::NotIn | Operator::StrIn | Operator::StrNotIn
        )
    }

    fn is_negated_set(self) -> bool {
        matches!(self, Operator::NotIn | Operator::StrNotIn)
    }
}

impl FromStr for Operator {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SqlError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.name().to_string()
    }
}

/// Anchoring of a `LIKE` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    Right,
    Left,
    Full,
    NotFull,
}

/// A single typed predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Bare literal comparison (numbers, digit-only generic values).
    Number {
        alias: String,
        column: String,
        op: Operator,
        literal: String,
    },
    /// Quoted, escaped string comparison.
    Str {
        alias: String,
        column: String,
        op: Operator,
        value: String,
    },
    NumberIn {
        alias: String,
        column: String,
        negated: bool,
        values: Vec<String>,
    },
    StrIn {
        alias: String,
        column: String,
        negated: bool,
        values: Vec<String>,
    },
    Like {
        alias: String,
        column: String,
        kind: LikeKind,
        value: String,
    },
    /// `<function>(<args>)`, rendered verbatim and never qualified.
    Func { function: String, args: String },
}

impl Condition {
    pub fn alias(&self) -> &str {
        match self {
            Condition::Number { alias, .. }
            | Condition::Str { alias, .. }
            | Condition::NumberIn { alias, .. }
            | Condition::StrIn { alias, .. }
            | Condition::Like { alias, .. } => alias,
            Condition::Func { .. } => "",
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Condition::Number { column, .. }
            | Condition::Str { column, .. }
            | Condition::NumberIn { column, .. }
            | Condition::StrIn { column, .. }
            | Condition::Like { column, .. } => column,
            Condition::Func { function, .. } => function,
        }
    }

    /// Operator literal as emitted in SQL.
    pub fn op(&self) -> &'static str {
        match self {
            Condition::Number { op, .. } | Condition::Str { op, .. } => op.sql(),
            Condition::NumberIn { negated, .. } | Condition::StrIn { negated, .. } => {
                if *negated {
                    "NOT IN"
                } else {
                    "IN"
                }
            }
            Condition::Like { kind, .. } => match kind {
                LikeKind::NotFull => "NOT LIKE",
                _ => "LIKE",
            },
            Condition::Func { .. } => "",
        }
    }

    pub fn formatted_value(&self) -> String {
        match self {
            Condition::Number { literal, .. } => literal.clone(),
            Condition::Str { value, .. } => escape_string(value),
            Condition::NumberIn { values, .. } => format!("({})", values.join(",")),
            Condition::StrIn { values, .. } => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|v| format!("'{}'", escape_raw_string(v)))
                    .collect();
                format!("({})", quoted.join(","))
            }
            Condition::Like { kind, value, .. } => {
                let v = escape_raw_string(value);
                match kind {
                    LikeKind::Right => format!("'{}%'", v),
                    LikeKind::Left => format!("'%{}'", v),
                    LikeKind::Full | LikeKind::NotFull => format!("'%{}%'", v),
                }
            }
            Condition::Func { args, .. } => args.clone(),
        }
    }

    /// Render the predicate.
    pub fn render(&self) -> String {
        match self {
            Condition::Func { function, args } => format!("{}({})", function, args),
            _ => format!(
                "{} {} {}",
                qualify(self.column(), self.alias()),
                self.op(),
                self.formatted_value()
            ),
        }
    }

    /// Build the condition for one column cell, dispatching on the value's type.
    ///
    /// Returns `None` when the cell renders nothing: nulls, empty strings and
    /// empty sets. Operator/value type mismatches are logged and rendered on a
    /// best-effort basis.
    pub fn from_cell(alias: &str, column: &str, op: Operator, value: &Value) -> Option<Self> {
        let alias = alias.to_string();
        let column = column.to_string();
        match value {
            Value::Null => None,
            Value::Float(n) if !n.is_finite() => {
                warn!("dropped non-finite number {} on column '{}'", n, column);
                None
            }
            Value::String(s) => {
                if !op.is_string_typed() {
                    warn!(
                        "implicit type conversion: string value compared with {} on column '{}'",
                        op, column
                    );
                }
                if s.is_empty() {
                    debug!("dropped empty string predicate on column '{}'", column);
                    return None;
                }
                if op.is_set() {
                    return Some(Condition::StrIn {
                        alias,
                        column,
                        negated: op.is_negated_set(),
                        values: vec![s.clone()],
                    });
                }
                if op.is_like() {
                    return Some(like(alias, column, op, s.clone()));
                }
                Some(Condition::Str {
                    alias,
                    column,
                    op,
                    value: s.clone(),
                })
            }
            Value::Int(_) | Value::Float(_) => {
                if op.is_str_prefixed() {
                    warn!(
                        "implicit type conversion: numeric value compared with {} on column '{}'",
                        op, column
                    );
                }
                let literal = value.to_string();
                if op.is_set() {
                    return Some(Condition::NumberIn {
                        alias,
                        column,
                        negated: op.is_negated_set(),
                        values: vec![literal],
                    });
                }
                if op.is_like() {
                    return Some(like(alias, column, op, literal));
                }
                Some(Condition::Number {
                    alias,
                    column,
                    op,
                    literal,
                })
            }
            Value::IntSet(_) | Value::StrSet(_) => {
                let values = value.set_members();
                if values.is_empty() {
                    debug!("dropped empty set predicate on column '{}'", column);
                    return None;
                }
                if !op.is_set() {
                    warn!(
                        "set value used with scalar operator {} on column '{}', rendering as IN",
                        op, column
                    );
                }
                let negated = matches!(
                    op,
                    Operator::NotIn | Operator::StrNotIn | Operator::NotEq | Operator::StrNotEq
                );
                let string_members = matches!(value, Value::StrSet(_));
                if string_members != op.is_str_prefixed() {
                    warn!(
                        "implicit type conversion: {} set compared with {} on column '{}'",
                        if string_members { "string" } else { "numeric" },
                        op,
                        column
                    );
                }
                // String members are always quoted, whatever the operator says.
                if op.is_str_prefixed() || string_members {
                    Some(Condition::StrIn {
                        alias,
                        column,
                        negated,
                        values,
                    })
                } else {
                    Some(Condition::NumberIn {
                        alias,
                        column,
                        negated,
                        values,
                    })
                }
            }
            Value::Bool(_) | Value::Table(_) | Value::Json(_) => {
                let text = value.to_string();
                if text.trim().is_empty() {
                    return None;
                }
                let op = generic_operator(op);
                if is_digital(&text) {
                    Some(Condition::Number {
                        alias,
                        column,
                        op,
                        literal: text,
                    })
                } else {
                    Some(Condition::Str {
                        alias,
                        column,
                        op,
                        value: text,
                    })
                }
            }
        }
    }
}

fn like(alias: String, column: String, op: Operator, value: String) -> Condition {
    let kind = match op {
        Operator::RightLike => LikeKind::Right,
        Operator::LeftLike => LikeKind::Left,
        Operator::NotLike => LikeKind::NotFull,
        _ => LikeKind::Full,
    };
    Condition::Like {
        alias,
        column,
        kind,
        value,
    }
}

/// Strip the `STR_` prefix from a comparison; set and like forms map to equality.
fn generic_operator(op: Operator) -> Operator {
    match op {
        Operator::StrEq | Operator::In | Operator::StrIn | Operator::RightLike
        | Operator::LeftLike | Operator::Like => Operator::Eq,
        Operator::StrNotEq | Operator::NotIn | Operator::StrNotIn | Operator::NotLike => {
            Operator::NotEq
        }
        Operator::StrGt => Operator::Gt,
        Operator::StrGe => Operator::Ge,
        Operator::StrLt => Operator::Lt,
        Operator::StrLe => Operator::Le,
        other => other,
    }
}

/// Expand one `T_FUNC` cell into function-call predicates.
///
/// Function arguments are trusted SQL expressions and are emitted verbatim;
/// arguments matching the injection heuristic are logged.
pub fn function_conditions(function: &str, value: &Value) -> SqlResult<Vec<Condition>> {
    let mut out = Vec::new();
    match value {
        Value::Null => {}
        Value::Table(table) => {
            for (column, operator, cell) in table.cells() {
                let op = Operator::from_str(operator)?;
                let call = format!("{}({})", function, column);
                if let Some(cond) = Condition::from_cell("", &call, op, cell) {
                    out.push(cond);
                }
            }
        }
        Value::IntSet(_) | Value::StrSet(_) => {
            for member in value.set_members() {
                out.push(func(function, member));
            }
        }
        other => out.push(func(function, other.to_string())),
    }
    Ok(out)
}

fn func(function: &str, args: String) -> Condition {
    if check(&args) {
        warn!(
            "function predicate {}() argument matches the injection heuristic: {}",
            function, args
        );
    }
    Condition::Func {
        function: function.to_string(),
        args,
    }
}

/// Translate the cells of one column into conditions.
pub fn column_conditions(
    alias: &str,
    column: &str,
    cells: &IndexMap<String, Value>,
) -> SqlResult<Vec<Condition>> {
    let mut out = Vec::new();
    if column.eq_ignore_ascii_case(T_FUNC) {
        for (function, value) in cells {
            out.extend(function_conditions(function, value)?);
        }
        return Ok(out);
    }
    let column = to_column_name(column);
    for (operator, value) in cells {
        let op = Operator::from_str(operator)?;
        if let Some(cond) = Condition::from_cell(alias, &column, op, value) {
            out.push(cond);
        }
    }
    Ok(out)
}

/// Translate a whole relation, failing on the first unknown operator.
pub fn conditions_from_relation(
    alias: &str,
    relation: &ConditionRelation,
) -> SqlResult<Vec<Condition>> {
    let mut out = Vec::new();
    for (column, cells) in relation.rows() {
        out.extend(column_conditions(alias, column, cells)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(column: &str, op: Operator, value: impl Into<Value>) -> Option<String> {
        Condition::from_cell("", column, op, &value.into()).map(|c| c.render())
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!("STR_EQ".parse::<Operator>().unwrap(), Operator::StrEq);
        assert_eq!("right_like".parse::<Operator>().unwrap(), Operator::RightLike);
        assert!(matches!(
            "BETWIXT".parse::<Operator>(),
            Err(SqlError::UnknownOperator(name)) if name == "BETWIXT"
        ));
        for op in Operator::ALL {
            assert_eq!(op.name().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn test_number_condition() {
        assert_eq!(render("age", Operator::Eq, 30i64).unwrap(), "age = 30");
        assert_eq!(render("score", Operator::Ge, 1.5).unwrap(), "score >= 1.5");
    }

    #[test]
    fn test_number_under_string_operator_renders_bare() {
        assert_eq!(render("age", Operator::StrEq, 30i64).unwrap(), "age = 30");
        assert_eq!(render("score", Operator::StrGt, 2.5).unwrap(), "score > 2.5");
    }

    #[test]
    fn test_non_finite_number_is_dropped() {
        assert_eq!(render("score", Operator::Ge, f64::NAN), None);
        assert_eq!(render("score", Operator::Lt, f64::INFINITY), None);
        assert_eq!(render("score", Operator::In, f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_empty_set_is_dropped() {
        assert_eq!(render("id", Operator::In, Vec::<i64>::new()), None);
        assert_eq!(render("code", Operator::StrNotIn, Vec::<&str>::new()), None);
    }

    #[test]
    fn test_string_condition() {
        assert_eq!(render("name", Operator::StrEq, "bob").unwrap(), "name = 'bob'");
        assert_eq!(
            render("name", Operator::StrNotEq, "o'neil").unwrap(),
            "name != 'o\\'neil'"
        );
    }

    #[test]
    fn test_empty_string_is_dropped() {
        assert_eq!(render("name", Operator::StrEq, ""), None);
        assert_eq!(render("name", Operator::StrEq, Value::Null), None);
    }

    #[test]
    fn test_in_sets() {
        assert_eq!(
            render("id", Operator::In, vec![1i64, 2, 3]).unwrap(),
            "id IN (1,2,3)"
        );
        assert_eq!(
            render("code", Operator::StrIn, vec!["a", "b"]).unwrap(),
            "code IN ('a','b')"
        );
        assert_eq!(
            render("id", Operator::NotIn, vec![4i64]).unwrap(),
            "id NOT IN (4)"
        );
        assert_eq!(
            render("code", Operator::StrNotIn, vec!["x'"]).unwrap(),
            "code NOT IN ('x\\'')"
        );
    }

    #[test]
    fn test_string_set_is_quoted_even_with_numeric_operator() {
        assert_eq!(
            render("code", Operator::In, vec!["1 OR 1=1"]).unwrap(),
            "code IN ('1 OR 1=1')"
        );
    }

    #[test]
    fn test_numeric_set_quoted_by_str_operator() {
        assert_eq!(
            render("code", Operator::StrIn, vec![7i64]).unwrap(),
            "code IN ('7')"
        );
    }

    #[test]
    fn test_like_variants() {
        assert_eq!(
            render("username", Operator::RightLike, "jetty").unwrap(),
            "username LIKE 'jetty%'"
        );
        assert_eq!(
            render("username", Operator::LeftLike, "jetty").unwrap(),
            "username LIKE '%jetty'"
        );
        assert_eq!(
            render("username", Operator::Like, "j'y").unwrap(),
            "username LIKE '%j\\'y%'"
        );
        assert_eq!(
            render("username", Operator::NotLike, "x").unwrap(),
            "username NOT LIKE '%x%'"
        );
    }

    #[test]
    fn test_generic_values() {
        assert_eq!(render("active", Operator::Eq, true).unwrap(), "active = 1");
        assert_eq!(
            render("meta", Operator::StrEq, serde_json::json!({"a": 1})).unwrap(),
            "meta = '{\\\"a\\\":1}'"
        );
    }

    #[test]
    fn test_condition_accessors() {
        let cond = Condition::from_cell("u", "age", Operator::Ge, &Value::Int(18)).unwrap();
        assert_eq!(cond.alias(), "u");
        assert_eq!(cond.column(), "age");
        assert_eq!(cond.op(), ">=");
        assert_eq!(cond.formatted_value(), "18");
        assert_eq!(cond.render(), "u.age >= 18");
    }

    #[test]
    fn test_function_conditions() {
        let scalar = function_conditions(
            "JSON_OVERLAPS",
            &Value::from("items->'$.zipcode', CAST('[94536]' AS JSON)"),
        )
        .unwrap();
        assert_eq!(
            scalar[0].render(),
            "JSON_OVERLAPS(items->'$.zipcode', CAST('[94536]' AS JSON))"
        );

        let nested = ConditionRelation::new()
            .with("username , '-' , nickname", Operator::RightLike, "77777")
            .with("username , '-' , real_name", Operator::RightLike, "99999");
        let conds = function_conditions("concat", &Value::Table(nested)).unwrap();
        let rendered: Vec<String> = conds.iter().map(Condition::render).collect();
        assert_eq!(
            rendered,
            vec![
                "concat(username , '-' , nickname) LIKE '77777%'",
                "concat(username , '-' , real_name) LIKE '99999%'",
            ]
        );

        let set = function_conditions("FIND_IN_SET", &Value::from(vec!["1, tags", "2, tags"]))
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set[1].render(), "FIND_IN_SET(2, tags)");
    }

    #[test]
    fn test_unknown_operator_is_fatal() {
        let rel = ConditionRelation::new()
            .with("age", "EQ", 1i64)
            .with("name", "SOUNDS_LIKE", "bob");
        let err = conditions_from_relation("", &rel).unwrap_err();
        assert!(matches!(err, SqlError::UnknownOperator(op) if op == "SOUNDS_LIKE"));
    }

    #[test]
    fn test_column_names_are_normalized() {
        let rel = ConditionRelation::new().with("createdAt", Operator::Ge, 5i64);
        let conds = conditions_from_relation("a", &rel).unwrap();
        assert_eq!(conds[0].render(), "a.created_at >= 5");
    }
}
