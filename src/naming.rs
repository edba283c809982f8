//! Column and table name normalization.

use convert_case::{Boundary, Case, Casing, Converter};

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Qualify `column` with `alias` unless the alias is empty or the column is already qualified.
pub fn qualify(column: &str, alias: &str) -> String {
    if !alias.is_empty() && !column.contains('.') {
        format!("{}.{}", alias, column)
    } else {
        column.to_string()
    }
}

/// Convert a camelCase field name to a snake_case column name.
///
/// Qualified names are converted per segment. Anything that is not a plain
/// identifier (function expressions, `concat` argument lists) is returned
/// unchanged.
pub fn to_column_name(field: &str) -> String {
    if field.contains('.') && field.split('.').all(is_identifier) {
        return field
            .split('.')
            .map(to_column_name)
            .collect::<Vec<_>>()
            .join(".");
    }
    if !is_identifier(field) {
        return field.to_string();
    }
    // Digits stay attached to their word: `address2` is a column name, not `address_2`.
    Converter::new()
        .set_boundaries(&[Boundary::LowerUpper, Boundary::Acronym])
        .to_case(Case::Snake)
        .convert(field)
}

/// Convert a snake_case column name to a camelCase field name.
pub fn to_field_name(column: &str) -> String {
    column.to_case(Case::Camel)
}
