//! Per-call build context: target datasource and the soft-delete sentinel.

use std::fmt;

use crate::condition::Operator;
use crate::value::Value;

/// Datasource used when none is configured.
pub const DEFAULT_DATASOURCE: &str = "master";

/// Representation of the "not deleted" marker stored in `is_deleted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotDeleted {
    Int(i64),
    Str(String),
}

impl NotDeleted {
    /// Resolve from the `not_deleted_value_type` setting.
    ///
    /// `"string"` (any case) selects the string sentinel `'0'`; anything else
    /// selects the numeric sentinel `0`.
    pub fn from_setting(setting: &str) -> Self {
        if setting.trim().eq_ignore_ascii_case("string") {
            NotDeleted::Str("0".to_string())
        } else {
            NotDeleted::Int(0)
        }
    }

    /// SQL literal.
    pub fn literal(&self) -> String {
        match self {
            NotDeleted::Int(n) => n.to_string(),
            NotDeleted::Str(s) => format!("'{}'", s),
        }
    }

    /// Condition cell operator and value matching this sentinel.
    pub fn cell(&self) -> (Operator, Value) {
        match self {
            NotDeleted::Int(n) => (Operator::Eq, Value::Int(*n)),
            NotDeleted::Str(s) => (Operator::StrEq, Value::String(s.clone())),
        }
    }
}

impl Default for NotDeleted {
    fn default() -> Self {
        NotDeleted::Int(0)
    }
}

impl fmt::Display for NotDeleted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal())
    }
}

/// Explicit context passed to every statement builder and executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlContext {
    pub datasource: String,
    pub not_deleted: NotDeleted,
}

impl SqlContext {
    pub fn new(not_deleted: NotDeleted) -> Self {
        Self {
            datasource: DEFAULT_DATASOURCE.to_string(),
            not_deleted,
        }
    }

    /// Same context, targeting another datasource.
    pub fn on(&self, datasource: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            not_deleted: self.not_deleted.clone(),
        }
    }
}

impl Default for SqlContext {
    fn default() -> Self {
        Self::new(NotDeleted::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_resolution() {
        assert_eq!(NotDeleted::from_setting("string").literal(), "'0'");
        assert_eq!(NotDeleted::from_setting("STRING").literal(), "'0'");
        assert_eq!(NotDeleted::from_setting("").literal(), "0");
        assert_eq!(NotDeleted::from_setting("int").literal(), "0");
    }

    #[test]
    fn test_context_switch_keeps_sentinel() {
        let ctx = SqlContext::new(NotDeleted::from_setting("string"));
        let slave = ctx.on("slave");
        assert_eq!(slave.datasource, "slave");
        assert_eq!(slave.not_deleted, ctx.not_deleted);
        assert_eq!(ctx.datasource, DEFAULT_DATASOURCE);
    }
}
