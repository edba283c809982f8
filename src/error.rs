//! Error types for leaf-sql.

use thiserror::Error;

/// The main error type for statement building and execution.
#[derive(Debug, Error)]
pub enum SqlError {
    /// A batch insert was requested with no rows.
    #[error("Batch insert payload is empty")]
    EmptyBatchInsert,

    /// Operator name outside the supported vocabulary.
    #[error("Unknown condition operator: '{0}'")]
    UnknownOperator(String),

    /// An entity has no accessor for the requested field.
    #[error("Entity '{entity}' has no accessor for field '{field}'")]
    MissingAccessor { entity: &'static str, field: String },

    /// A record expected to exist was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Failed to parse a condition cell.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SqlError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a missing accessor error.
    pub fn missing_accessor(entity: &'static str, field: impl Into<String>) -> Self {
        Self::MissingAccessor {
            entity,
            field: field.into(),
        }
    }
}

/// Result type alias for leaf-sql operations.
pub type SqlResult<T> = Result<T, SqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqlError::parse(5, "unexpected character");
        assert_eq!(
            err.to_string(),
            "Parse error at position 5: unexpected character"
        );
    }

    #[test]
    fn test_unknown_operator_names_the_operator() {
        let err = SqlError::UnknownOperator("BETWIXT".into());
        assert_eq!(err.to_string(), "Unknown condition operator: 'BETWIXT'");
    }

    #[test]
    fn test_missing_accessor_display() {
        let err = SqlError::missing_accessor("Admin", "nickname");
        assert_eq!(
            err.to_string(),
            "Entity 'Admin' has no accessor for field 'nickname'"
        );
    }
}
