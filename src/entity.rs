//! Compile-time field accessor tables for entity types.
//!
//! Copying a record or resetting its primary key goes through an explicit
//! table of getters and setters per entity rather than looking methods up by
//! name at runtime.
//!
//! ```
//! use leaf_sql::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Category {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! impl Entity for Category {
//!     const NAME: &'static str = "Category";
//!     const TABLE: &'static str = "s_category";
//!
//!     fn fields() -> &'static [Field<Self>] {
//!         const FIELDS: &[Field<Category>] = &[
//!             Field {
//!                 name: "id",
//!                 get: |c| Value::from(c.id),
//!                 set: |c, v| {
//!                     c.id = v.as_i64();
//!                     Ok(())
//!                 },
//!             },
//!             Field {
//!                 name: "name",
//!                 get: |c| Value::from(c.name.as_str()),
//!                 set: |c, v| {
//!                     c.name = v.to_string();
//!                     Ok(())
//!                 },
//!             },
//!         ];
//!         FIELDS
//!     }
//! }
//!
//! let mut category = Category { id: Some(7), name: "books".into() };
//! reset_primary_key(&mut category).unwrap();
//! assert_eq!(category.id, None);
//! ```

use crate::error::{SqlError, SqlResult};
use crate::naming::to_column_name;
use crate::value::{Row, Value};

/// Getter and setter for one column of an entity.
pub struct Field<E> {
    /// Column name (snake_case).
    pub name: &'static str,
    pub get: fn(&E) -> Value,
    pub set: fn(&mut E, Value) -> SqlResult<()>,
}

/// A persisted record type with an explicit field table.
pub trait Entity: Default + Sized + 'static {
    /// Type name used in error messages.
    const NAME: &'static str;
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";

    fn fields() -> &'static [Field<Self>];
}

/// Look up a field by column name or camelCase field name.
pub fn field<E: Entity>(name: &str) -> Option<&'static Field<E>> {
    let column = to_column_name(name);
    E::fields()
        .iter()
        .find(|f| f.name == name || f.name == column)
}

fn require<E: Entity>(name: &str) -> SqlResult<&'static Field<E>> {
    field::<E>(name).ok_or_else(|| SqlError::missing_accessor(E::NAME, name))
}

/// Snapshot every field into a row, in table order.
pub fn to_row<E: Entity>(entity: &E) -> Row {
    E::fields()
        .iter()
        .map(|f| (f.name.to_string(), (f.get)(entity)))
        .collect()
}

/// Build an entity from a result row. Columns without an accessor are skipped.
pub fn from_row<E: Entity>(row: &Row) -> SqlResult<E> {
    let mut entity = E::default();
    for (column, value) in row {
        if let Some(f) = field::<E>(column) {
            (f.set)(&mut entity, value.clone())?;
        }
    }
    Ok(entity)
}

pub fn primary_key_value<E: Entity>(entity: &E) -> SqlResult<Value> {
    let f = require::<E>(E::PRIMARY_KEY)?;
    Ok((f.get)(entity))
}

/// Clear the primary key so the entity inserts as a new record.
pub fn reset_primary_key<E: Entity>(entity: &mut E) -> SqlResult<()> {
    let f = require::<E>(E::PRIMARY_KEY)?;
    (f.set)(entity, Value::Null)
}

/// Overwrite fields from `replace`. Every key must have an accessor.
pub fn apply<E: Entity>(entity: &mut E, replace: &Row) -> SqlResult<()> {
    for (name, value) in replace {
        let f = require::<E>(name)?;
        (f.set)(entity, value.clone())?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Admin {
        pub id: Option<i64>,
        pub username: String,
        pub nickname: String,
        pub real_name: String,
        pub status: i64,
    }

    impl Entity for Admin {
        const NAME: &'static str = "Admin";
        const TABLE: &'static str = "s_admin";

        fn fields() -> &'static [Field<Self>] {
            const FIELDS: &[Field<Admin>] = &[
                Field {
                    name: "id",
                    get: |a| Value::from(a.id),
                    set: |a, v| {
                        a.id = v.as_i64();
                        Ok(())
                    },
                },
                Field {
                    name: "username",
                    get: |a| Value::from(a.username.as_str()),
                    set: |a, v| {
                        a.username = v.to_string();
                        Ok(())
                    },
                },
                Field {
                    name: "nickname",
                    get: |a| Value::from(a.nickname.as_str()),
                    set: |a, v| {
                        a.nickname = v.to_string();
                        Ok(())
                    },
                },
                Field {
                    name: "real_name",
                    get: |a| Value::from(a.real_name.as_str()),
                    set: |a, v| {
                        a.real_name = v.to_string();
                        Ok(())
                    },
                },
                Field {
                    name: "status",
                    get: |a| Value::Int(a.status),
                    set: |a, v| {
                        a.status = v
                            .as_i64()
                            .ok_or_else(|| SqlError::Execution(format!("status is not an integer: {}", v)))?;
                        Ok(())
                    },
                },
            ];
            FIELDS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::Admin;
    use super::*;

    fn admin() -> Admin {
        Admin {
            id: Some(22),
            username: "jack".into(),
            nickname: "J".into(),
            real_name: "Jack Ma".into(),
            status: 1,
        }
    }

    #[test]
    fn test_to_row_in_field_order() {
        let row = to_row(&admin());
        assert_eq!(
            row.keys().collect::<Vec<_>>(),
            vec!["id", "username", "nickname", "real_name", "status"]
        );
        assert_eq!(row["id"], Value::Int(22));
    }

    #[test]
    fn test_from_row_skips_unknown_columns() {
        let mut row = to_row(&admin());
        row.insert("created_at".into(), Value::Int(1));
        let back: Admin = from_row(&row).unwrap();
        assert_eq!(back, admin());
    }

    #[test]
    fn test_reset_and_apply() {
        let mut a = admin();
        reset_primary_key(&mut a).unwrap();
        assert_eq!(a.id, None);

        let mut replace = Row::new();
        replace.insert("nickname".into(), Value::from("Jackie"));
        replace.insert("realName".into(), Value::from("Jackie Chan"));
        apply(&mut a, &replace).unwrap();
        assert_eq!(a.nickname, "Jackie");
        assert_eq!(a.real_name, "Jackie Chan");
    }

    #[test]
    fn test_apply_unknown_field_fails() {
        let mut replace = Row::new();
        replace.insert("salary".into(), Value::from(100i64));
        let err = apply(&mut admin(), &replace).unwrap_err();
        assert!(matches!(
            err,
            SqlError::MissingAccessor { entity: "Admin", ref field } if field == "salary"
        ));
    }

    #[test]
    fn test_setter_errors_propagate() {
        let mut replace = Row::new();
        replace.insert("status".into(), Value::from("active"));
        assert!(apply(&mut admin(), &replace).is_err());
    }
}
