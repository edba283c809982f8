//! Statement assembler.
//!
//! Turns query and mutation descriptors into finished MySQL statements.
//! Every function here is pure: the only inputs are the descriptor, the
//! [`SqlContext`] and, for the `_at` variants, the timestamp to stamp.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::{SqlBuilder, ToSql};
use crate::condition::Operator;
use crate::context::SqlContext;
use crate::entity::{self, Entity};
use crate::error::{SqlError, SqlResult};
use crate::escape::{escape_raw_string, escape_string};
use crate::join::{compile_joins, deserialize_joins, JoinSet, JoinSpec};
use crate::relation::{ConditionRelation, DELETED_FLAG_FIELD, REMOVE_JSON_FIELD_PREFIX};
use crate::value::{is_digital, Row, Value};
use crate::where_clause::WhereClause;

/// Current time in epoch seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Everything needed to render one SELECT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDescriptor {
    pub table: String,
    /// Defaults to the table name.
    pub alias: Option<String>,
    /// Defaults to `<alias>.*`.
    pub columns: IndexSet<String>,
    /// A list of specs, or the nested `type → table → alias → main alias → fields` shape.
    #[serde(deserialize_with = "deserialize_joins")]
    pub joins: Vec<JoinSpec>,
    pub condition: ConditionRelation,
    pub group_by: IndexSet<String>,
    pub having: IndexSet<String>,
    /// Column → direction, in order.
    pub order_by: IndexMap<String, String>,
    /// Emitted only when greater than zero.
    pub limit: Option<u32>,
}

impl QueryDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.insert(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    pub fn joins(mut self, joins: JoinSet) -> Self {
        self.joins.extend(joins.specs());
        self
    }

    pub fn condition(mut self, condition: ConditionRelation) -> Self {
        self.condition = condition;
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.insert(column.into());
        self
    }

    pub fn having(mut self, predicate: impl Into<String>) -> Self {
        self.having.insert(predicate.into());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order_by.insert(column.into(), direction.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The alias used to qualify columns.
    pub fn table_alias(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.trim().is_empty() => alias,
            _ => &self.table,
        }
    }
}

/// Payload of an UPDATE: field values plus the row filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateDescriptor {
    pub table: String,
    /// Field → new value. A nested relation under the field's own name holds JSON path edits.
    pub data: Row,
    pub condition: ConditionRelation,
}

/// A serializable statement request, tagged by `"statement"`.
///
/// ```
/// use leaf_sql::prelude::*;
///
/// let request: Statement = serde_json::from_str(
///     r#"{"statement": "delete", "table": "s_admin", "condition": {"id": {"EQ": 9}}}"#,
/// )
/// .unwrap();
/// let sql = request.build(&SqlContext::default()).unwrap();
/// assert_eq!(sql, "DELETE FROM s_admin WHERE (id = 9)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Statement {
    Select(QueryDescriptor),
    Exists(QueryDescriptor),
    Insert {
        table: String,
        rows: Vec<Row>,
    },
    Update(UpdateDescriptor),
    SoftDelete {
        table: String,
        #[serde(default)]
        condition: ConditionRelation,
    },
    Delete {
        table: String,
        #[serde(default)]
        condition: ConditionRelation,
    },
}

impl Statement {
    pub fn build(&self, ctx: &SqlContext) -> SqlResult<String> {
        self.build_at(ctx, now())
    }

    /// Build with a fixed timestamp for the stamped columns.
    pub fn build_at(&self, ctx: &SqlContext, now: i64) -> SqlResult<String> {
        match self {
            Statement::Select(query) => find_by_condition(ctx, query),
            Statement::Exists(query) => check_record_is_exists(ctx, query),
            Statement::Insert { table, rows } => batch_insert_at(table, rows, now),
            Statement::Update(update) => {
                update_field_by_condition_at(&update.table, &update.data, &update.condition, now)
            }
            Statement::SoftDelete { table, condition } => {
                delete_soft_where_at(ctx, table, condition, now)
            }
            Statement::Delete { table, condition } => delete_where(table, condition),
        }
    }

    /// Whether the statement returns rows rather than an affected-row count.
    pub fn is_query(&self) -> bool {
        matches!(self, Statement::Select(_) | Statement::Exists(_))
    }
}

/// `SELECT ... FROM <table> <alias>` with joins, the soft-delete aware
/// WHERE clause, grouping, ordering and limit.
pub fn find_by_condition(ctx: &SqlContext, query: &QueryDescriptor) -> SqlResult<String> {
    let alias = query.table_alias();
    let columns = if query.columns.is_empty() {
        format!("{}.*", alias)
    } else {
        query.columns.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    let mut builder = SqlBuilder::select(columns).from(format!("{} {}", query.table, alias));
    for clause in compile_joins(&query.joins) {
        builder = builder.join(clause);
    }
    builder = builder
        .wheres(WhereClause::compile_soft_deleted(ctx, &query.condition, alias)?)
        .group_by(query.group_by.iter().cloned())
        .having(query.having.iter().cloned());
    for (column, direction) in &query.order_by {
        let direction = direction.trim();
        builder = builder.order_by(if direction.is_empty() {
            column.clone()
        } else {
            format!("{} {}", column, direction)
        });
    }
    if let Some(limit) = query.limit.filter(|n| *n > 0) {
        builder = builder.limit(u64::from(limit));
    }
    Ok(builder.to_sql())
}

/// Same statement as [`find_by_condition`]; limiting to one row is left to the caller.
pub fn find_one_by_condition(ctx: &SqlContext, query: &QueryDescriptor) -> SqlResult<String> {
    find_by_condition(ctx, query)
}

/// Same statement as [`find_by_condition`]; page arithmetic belongs to the executor.
pub fn paginate(ctx: &SqlContext, query: &QueryDescriptor) -> SqlResult<String> {
    find_by_condition(ctx, query)
}

/// SELECT with an explicit column projection replacing the descriptor's columns.
pub fn find_field_by_condition<I, S>(
    ctx: &SqlContext,
    query: &QueryDescriptor,
    fields: I,
) -> SqlResult<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut query = query.clone();
    query.columns = fields.into_iter().map(Into::into).collect();
    find_by_condition(ctx, &query)
}

/// One column of the first matching row.
pub fn find_one_single_field_by_condition(
    ctx: &SqlContext,
    query: &QueryDescriptor,
    field: &str,
) -> SqlResult<String> {
    let mut query = query.clone();
    query.columns = IndexSet::from([field.to_string()]);
    query.limit = Some(1);
    find_by_condition(ctx, &query)
}

/// Look a row up by its `id` column.
pub fn find_one_by_id(ctx: &SqlContext, table: &str, id: impl Into<Value>) -> SqlResult<String> {
    let id = id.into();
    let op = if id.is_number() {
        Operator::Eq
    } else {
        Operator::StrEq
    };
    let query = QueryDescriptor::new(table).condition(ConditionRelation::new().with("id", op, id));
    find_by_condition(ctx, &query)
}

/// `SELECT 1 FROM <table> ... LIMIT 1`.
pub fn check_record_is_exists(ctx: &SqlContext, query: &QueryDescriptor) -> SqlResult<String> {
    let alias = query.table_alias();
    let from = if alias == query.table {
        query.table.clone()
    } else {
        format!("{} {}", query.table, alias)
    };
    let sql = SqlBuilder::select("1")
        .from(from)
        .wheres(WhereClause::compile_soft_deleted(ctx, &query.condition, alias)?)
        .limit(1)
        .to_sql();
    Ok(sql)
}

pub fn batch_insert(table: &str, rows: &[Row]) -> SqlResult<String> {
    batch_insert_at(table, rows, now())
}

/// Multi-row INSERT.
///
/// Every row is stamped with `created_at` and gets `ext = '{}'` when absent.
/// The column list comes from the first row; a column missing from a later
/// row is written as `NULL`.
pub fn batch_insert_at(table: &str, rows: &[Row], now: i64) -> SqlResult<String> {
    if rows.is_empty() {
        return Err(SqlError::EmptyBatchInsert);
    }
    let rows: Vec<Row> = rows.iter().map(|row| stamp_insert_row(row, now)).collect();
    let columns: Vec<&String> = rows[0].keys().collect();

    let values: Vec<String> = rows
        .iter()
        .map(|row| {
            let literals: Vec<String> = columns
                .iter()
                .map(|column| row.get(*column).map_or_else(|| "NULL".to_string(), literal))
                .collect();
            format!("({})", literals.join(","))
        })
        .collect();

    let columns: Vec<String> = columns.iter().map(|c| format!("`{}`", c)).collect();
    Ok(format!(
        "INSERT INTO {}({}) VALUES {}",
        table,
        columns.join(","),
        values.join(",")
    ))
}

fn stamp_insert_row(row: &Row, now: i64) -> Row {
    let mut row = row.clone();
    row.insert("created_at".to_string(), Value::Int(now));
    if row.get("ext").is_none_or(Value::is_null) {
        row.insert("ext".to_string(), Value::from("{}"));
    }
    row
}

/// Single-row INSERT from an entity's field table. A null primary key is left out.
pub fn insert_entity<E: Entity>(entity: &E) -> SqlResult<String> {
    let mut row = entity::to_row(entity);
    if row.get(E::PRIMARY_KEY).is_some_and(Value::is_null) {
        row.shift_remove(E::PRIMARY_KEY);
    }
    batch_insert(E::TABLE, &[row])
}

pub fn update_field_by_condition(
    table: &str,
    data: &Row,
    condition: &ConditionRelation,
) -> SqlResult<String> {
    update_field_by_condition_at(table, data, condition, now())
}

/// UPDATE with JSON path edits. `updated_at` is always stamped and no
/// implicit soft-delete filter is added.
pub fn update_field_by_condition_at(
    table: &str,
    data: &Row,
    condition: &ConditionRelation,
    now: i64,
) -> SqlResult<String> {
    let mut builder = SqlBuilder::update(table);
    for (field, value) in data {
        let Value::Table(paths) = value else {
            builder = builder.set(format!("{} = {}", field, literal(value)));
            continue;
        };
        let Some(edits) = paths.row(field) else {
            debug!(
                "'{}' has no path edits under its own name, writing the whole document",
                field
            );
            builder = builder.set(format!("{} = {}", field, literal(value)));
            continue;
        };
        for (key, edit) in edits {
            builder = match key.strip_prefix(REMOVE_JSON_FIELD_PREFIX) {
                Some(path) => builder.set(format!(
                    "{} = JSON_REMOVE({}, '$.{}')",
                    field,
                    field,
                    escape_raw_string(path)
                )),
                None => builder.set(format!(
                    "{} = JSON_SET({}, '$.{}', {})",
                    field,
                    field,
                    escape_raw_string(key),
                    literal(edit)
                )),
            };
        }
    }
    builder = builder.set(format!("updated_at = {}", now));
    Ok(builder.wheres(WhereClause::compile(condition, "")?).to_sql())
}

pub fn delete_soft_where(
    ctx: &SqlContext,
    table: &str,
    condition: &ConditionRelation,
) -> SqlResult<String> {
    delete_soft_where_at(ctx, table, condition, now())
}

/// Soft delete: `is_deleted = id`, stamped `deleted_at`, restricted to rows
/// that are not deleted yet.
pub fn delete_soft_where_at(
    ctx: &SqlContext,
    table: &str,
    condition: &ConditionRelation,
    now: i64,
) -> SqlResult<String> {
    let mut condition = condition.clone();
    let (op, sentinel) = ctx.not_deleted.cell();
    condition.put(DELETED_FLAG_FIELD, op, sentinel);
    let sql = SqlBuilder::update(table)
        .set(format!("{} = id", DELETED_FLAG_FIELD))
        .set(format!("deleted_at = {}", now))
        .wheres(WhereClause::compile(&condition, "")?)
        .to_sql();
    Ok(sql)
}

/// Physical delete. No soft-delete filter applies.
///
/// Cells that render nothing (null, empty strings, empty sets) are dropped
/// before the WHERE clause is built, so a condition made only of such cells
/// yields `DELETE FROM <table>` and removes every row. Check the condition
/// first when it comes from user input.
pub fn delete_where(table: &str, condition: &ConditionRelation) -> SqlResult<String> {
    let sql = SqlBuilder::delete_from(table)
        .wheres(WhereClause::compile(condition, "")?)
        .to_sql();
    Ok(sql)
}

/// Value literal for INSERT and UPDATE: numbers and digit-only text bare,
/// everything else through [`escape_string`].
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => value.to_string(),
        other => {
            let text = other.to_string();
            if is_digital(&text) {
                text
            } else {
                escape_string(&text)
            }
        }
    }
}
