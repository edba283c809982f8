//! # leaf-sql: dynamic MySQL statements from condition relations
//!
//! Callers describe *what* to fetch or change as data: a table, an ordered
//! relation of `(column, operator, value)` cells, joins, ordering. The engine
//! turns that into one line of MySQL, escaping values on the way and adding
//! the soft-delete filter unless told not to.
//!
//! ## Quick Example
//!
//! ```
//! use leaf_sql::prelude::*;
//!
//! let ctx = SqlContext::default();
//! let query = QueryDescriptor::new("s_admin")
//!     .alias("a")
//!     .condition(
//!         ConditionRelation::new()
//!             .with("age", Operator::Eq, 30i64)
//!             .with("name", Operator::StrEq, "bob"),
//!     )
//!     .limit(10);
//!
//! let sql = find_by_condition(&ctx, &query).unwrap();
//! assert_eq!(
//!     sql,
//!     "SELECT a.* FROM s_admin a WHERE (a.age = 30) AND (a.name = 'bob') AND (a.is_deleted = 0) LIMIT 10"
//! );
//! ```
//!
//! ## Operators
//!
//! | Operator       | Value           | SQL                  |
//! |----------------|-----------------|----------------------|
//! | `EQ`, `GT`, …  | number          | `col = 30`           |
//! | `STR_EQ`, …    | string          | `col = 'bob'`        |
//! | `IN`/`NOT_IN`  | number set      | `col IN (1,2,3)`     |
//! | `STR_IN`, …    | string set      | `col IN ('a','b')`   |
//! | `RIGHT_LIKE`   | string          | `col LIKE 'v%'`      |
//! | `LEFT_LIKE`    | string          | `col LIKE '%v'`      |
//! | `LIKE`         | string          | `col LIKE '%v%'`     |
//! | `NOT_LIKE`     | string          | `col NOT LIKE '%v%'` |
//!
//! Function predicates go under the `T_FUNC` column:
//! `(T_FUNC, JSON_OVERLAPS, "items->'$.zipcode', CAST('[94536]' AS JSON)")`.

pub mod builder;
pub mod condition;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod escape;
pub mod executor;
pub mod join;
pub mod naming;
pub mod parser;
pub mod relation;
pub mod statement;
pub mod value;
pub mod where_clause;

pub mod prelude {
    pub use crate::builder::{SqlBuilder, ToSql};
    pub use crate::condition::{Condition, LikeKind, Operator};
    pub use crate::config::EngineConfig;
    pub use crate::context::{NotDeleted, SqlContext};
    pub use crate::entity::{
        apply, from_row, primary_key_value, reset_primary_key, to_row, Entity, Field,
    };
    pub use crate::error::*;
    pub use crate::executor::{Datasources, Executor, Page, Repository, Saved};
    pub use crate::join::{JoinSet, JoinSpec, JoinType};
    pub use crate::parser::{parse_cell, parse_relation};
    pub use crate::relation::{ConditionRelation, T_FUNC};
    pub use crate::statement::{
        batch_insert, check_record_is_exists, delete_soft_where, delete_where,
        find_by_condition, find_field_by_condition, find_one_by_condition, find_one_by_id,
        find_one_single_field_by_condition, insert_entity, paginate, update_field_by_condition,
        QueryDescriptor, Statement, UpdateDescriptor,
    };
    pub use crate::value::{Row, Value};
    pub use crate::where_clause::WhereClause;
}

/// Parse `column OPERATOR value` cells into a relation.
///
/// # Example
///
/// ```
/// use leaf_sql::parse;
///
/// let relation = parse(["age GE 18", "name STR_EQ 'bob'"]).unwrap();
/// assert_eq!(relation.len(), 2);
/// ```
pub fn parse<I, S>(cells: I) -> error::SqlResult<relation::ConditionRelation>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parser::parse_relation(cells)
}
