//! MySQL execution adapter.
//!
//! Runs assembled statements against named `sqlx` pools. The pool is chosen
//! by [`SqlContext::datasource`] on every call.

use indexmap::IndexMap;
use serde::Serialize;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row as _, TypeInfo};
use tracing::{debug, info};

use crate::condition::Operator;
use crate::config::EngineConfig;
use crate::context::SqlContext;
use crate::entity::{self, Entity};
use crate::error::{SqlError, SqlResult};
use crate::relation::ConditionRelation;
use crate::statement::{self, QueryDescriptor};
use crate::value::{Row, Value};

/// Named connection pools.
#[derive(Debug, Clone, Default)]
pub struct Datasources {
    pools: IndexMap<String, MySqlPool>,
}

impl Datasources {
    /// Connect every datasource listed in the configuration.
    pub async fn connect(config: &EngineConfig) -> SqlResult<Self> {
        let mut datasources = Self::default();
        for (name, url) in &config.datasources {
            let pool = MySqlPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
                .map_err(|e| SqlError::Connection(format!("{}: {}", name, e)))?;
            info!("registered datasource '{}'", name);
            datasources.insert(name.clone(), pool);
        }
        Ok(datasources)
    }

    pub fn insert(&mut self, name: impl Into<String>, pool: MySqlPool) {
        self.pools.insert(name.into(), pool);
    }

    pub fn get(&self, name: &str) -> SqlResult<&MySqlPool> {
        self.pools
            .get(name)
            .ok_or_else(|| SqlError::Config(format!("unknown datasource '{}'", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// One page of a paginated query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub records: Vec<Row>,
}

impl Page {
    /// Number of pages needed for `total` records.
    pub fn pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

/// Clamp `page` to 1 and compute the row offset.
pub fn page_offset(page: u64, page_size: u64) -> (u64, u64) {
    let page = page.max(1);
    (page, (page - 1) * page_size)
}

/// Wrap a SELECT to count its rows.
pub fn count_sql(sql: &str) -> String {
    format!("SELECT COUNT(*) AS total FROM ({}) AS leaf_count", sql)
}

/// Wrap a SELECT and take one page of it with `LIMIT offset, size`.
///
/// The statement stays intact inside the subquery, so its own `LIMIT` or
/// `ORDER BY` still applies.
pub fn page_sql(sql: &str, page: u64, page_size: u64) -> String {
    let (_, offset) = page_offset(page, page_size);
    format!(
        "SELECT * FROM ({}) AS leaf_page LIMIT {}, {}",
        sql, offset, page_size
    )
}

/// Executes SQL text on the datasource named by the context.
#[derive(Debug, Clone)]
pub struct Executor {
    datasources: Datasources,
}

impl Executor {
    pub fn new(datasources: Datasources) -> Self {
        Self { datasources }
    }

    pub fn datasources(&self) -> &Datasources {
        &self.datasources
    }

    fn pool(&self, ctx: &SqlContext, sql: &str) -> SqlResult<&MySqlPool> {
        let pool = self.datasources.get(&ctx.datasource)?;
        debug!(datasource = %ctx.datasource, "{}", sql);
        Ok(pool)
    }

    /// Fetch all rows.
    pub async fn fetch_all(&self, ctx: &SqlContext, sql: &str) -> SqlResult<Vec<Row>> {
        let rows = sqlx::query(sql)
            .fetch_all(self.pool(ctx, sql)?)
            .await
            .map_err(|e| SqlError::Execution(e.to_string()))?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    /// Fetch the first row, if any.
    pub async fn fetch_one(&self, ctx: &SqlContext, sql: &str) -> SqlResult<Option<Row>> {
        let row = sqlx::query(sql)
            .fetch_optional(self.pool(ctx, sql)?)
            .await
            .map_err(|e| SqlError::Execution(e.to_string()))?;
        Ok(row.as_ref().map(row_to_map))
    }

    /// Execute a mutation query (INSERT, UPDATE, DELETE).
    /// Returns the number of affected rows.
    pub async fn execute(&self, ctx: &SqlContext, sql: &str) -> SqlResult<u64> {
        let result = sqlx::query(sql)
            .execute(self.pool(ctx, sql)?)
            .await
            .map_err(|e| SqlError::Execution(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Execute an INSERT and return the generated id.
    pub async fn insert(&self, ctx: &SqlContext, sql: &str) -> SqlResult<u64> {
        let result = sqlx::query(sql)
            .execute(self.pool(ctx, sql)?)
            .await
            .map_err(|e| SqlError::Execution(e.to_string()))?;
        Ok(result.last_insert_id())
    }

    /// Count the rows of `sql`, then fetch the requested page.
    pub async fn paginate(
        &self,
        ctx: &SqlContext,
        sql: &str,
        page: u64,
        page_size: u64,
    ) -> SqlResult<Page> {
        let (page, _) = page_offset(page, page_size);
        let count = count_sql(sql);
        let total: i64 = sqlx::query_scalar(&count)
            .fetch_one(self.pool(ctx, &count)?)
            .await
            .map_err(|e| SqlError::Execution(e.to_string()))?;

        let records = if total > 0 {
            self.fetch_all(ctx, &page_sql(sql, page, page_size)).await?
        } else {
            Vec::new()
        };
        Ok(Page {
            total: u64::try_from(total).unwrap_or_default(),
            page,
            page_size,
            records,
        })
    }
}

/// Result of [`Repository::update_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    /// Rows updated.
    Updated(u64),
    /// Id of the inserted row.
    Created(u64),
}

/// Statement assembly plus execution under one context.
#[derive(Debug, Clone)]
pub struct Repository {
    executor: Executor,
    ctx: SqlContext,
}

impl Repository {
    pub fn new(executor: Executor, ctx: SqlContext) -> Self {
        Self { executor, ctx }
    }

    pub fn context(&self) -> &SqlContext {
        &self.ctx
    }

    /// Same pools, another datasource.
    pub fn on(&self, datasource: impl Into<String>) -> Self {
        Self {
            executor: self.executor.clone(),
            ctx: self.ctx.on(datasource),
        }
    }

    pub async fn find_by_condition(&self, query: &QueryDescriptor) -> SqlResult<Vec<Row>> {
        let sql = statement::find_by_condition(&self.ctx, query)?;
        self.executor.fetch_all(&self.ctx, &sql).await
    }

    pub async fn find_one_by_condition(&self, query: &QueryDescriptor) -> SqlResult<Option<Row>> {
        let sql = statement::find_one_by_condition(&self.ctx, query)?;
        self.executor.fetch_one(&self.ctx, &sql).await
    }

    pub async fn find_one_by_id(&self, table: &str, id: impl Into<Value>) -> SqlResult<Option<Row>> {
        let sql = statement::find_one_by_id(&self.ctx, table, id)?;
        self.executor.fetch_one(&self.ctx, &sql).await
    }

    pub async fn paginate(
        &self,
        query: &QueryDescriptor,
        page: u64,
        page_size: u64,
    ) -> SqlResult<Page> {
        let mut query = query.clone();
        query.limit = None;
        let sql = statement::paginate(&self.ctx, &query)?;
        self.executor.paginate(&self.ctx, &sql, page, page_size).await
    }

    pub async fn check_record_is_exists(&self, query: &QueryDescriptor) -> SqlResult<bool> {
        let sql = statement::check_record_is_exists(&self.ctx, query)?;
        Ok(self.executor.fetch_one(&self.ctx, &sql).await?.is_some())
    }

    /// Whether a not-deleted row of `table` has `field = value`.
    pub async fn validate_exists(
        &self,
        table: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> SqlResult<bool> {
        let value = value.into();
        let op = if value.is_number() {
            Operator::Eq
        } else {
            Operator::StrEq
        };
        let query = QueryDescriptor::new(table)
            .condition(ConditionRelation::new().with(field, op, value));
        self.check_record_is_exists(&query).await
    }

    pub async fn update_field_by_condition(
        &self,
        table: &str,
        data: &Row,
        condition: &ConditionRelation,
    ) -> SqlResult<u64> {
        let sql = statement::update_field_by_condition(table, data, condition)?;
        self.executor.execute(&self.ctx, &sql).await
    }

    pub async fn delete_soft_condition(
        &self,
        table: &str,
        condition: &ConditionRelation,
    ) -> SqlResult<u64> {
        let sql = statement::delete_soft_where(&self.ctx, table, condition)?;
        self.executor.execute(&self.ctx, &sql).await
    }

    pub async fn delete_condition(
        &self,
        table: &str,
        condition: &ConditionRelation,
    ) -> SqlResult<u64> {
        let sql = statement::delete_where(table, condition)?;
        self.executor.execute(&self.ctx, &sql).await
    }

    pub async fn batch_insert(&self, table: &str, rows: &[Row]) -> SqlResult<u64> {
        let sql = statement::batch_insert(table, rows)?;
        self.executor.execute(&self.ctx, &sql).await
    }

    /// Update the rows matched by `condition`, or by the entity's primary key
    /// when `condition` is empty. Inserts when nothing was updated.
    pub async fn update_or_create<E: Entity>(
        &self,
        entity: &E,
        condition: &ConditionRelation,
    ) -> SqlResult<Saved> {
        let id = entity::primary_key_value(entity)?;
        let condition = if condition.is_empty() && !id.is_null() {
            let op = if id.is_number() {
                Operator::Eq
            } else {
                Operator::StrEq
            };
            ConditionRelation::new().with(E::PRIMARY_KEY, op, id)
        } else {
            condition.clone()
        };

        if !condition.is_empty() {
            let mut data = entity::to_row(entity);
            data.shift_remove(E::PRIMARY_KEY);
            let updated = self
                .update_field_by_condition(E::TABLE, &data, &condition)
                .await?;
            if updated > 0 {
                return Ok(Saved::Updated(updated));
            }
        }

        let sql = statement::insert_entity(entity)?;
        let id = self.executor.insert(&self.ctx, &sql).await?;
        Ok(Saved::Created(id))
    }

    /// Duplicate the first row matching `condition` as a new record, with the
    /// fields in `replace` overwritten. Returns the new id.
    pub async fn copy_one_data<E: Entity>(
        &self,
        condition: &ConditionRelation,
        replace: &Row,
    ) -> SqlResult<u64> {
        let query = QueryDescriptor::new(E::TABLE).condition(condition.clone());
        let row = self
            .find_one_by_condition(&query)
            .await?
            .ok_or_else(|| SqlError::NotFound(format!("no {} row to copy", E::NAME)))?;

        let mut copy: E = entity::from_row(&row)?;
        entity::reset_primary_key(&mut copy)?;
        entity::apply(&mut copy, replace)?;

        match self.update_or_create(&copy, &ConditionRelation::new()).await? {
            Saved::Created(id) => Ok(id),
            Saved::Updated(_) => Err(SqlError::Execution(format!(
                "copy of {} updated an existing row",
                E::NAME
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int,
    UInt,
    Float,
    Json,
    DateTime,
    Date,
    Text,
}

fn column_kind(type_name: &str) -> ColumnKind {
    let unsigned = type_name.ends_with("UNSIGNED");
    match type_name.split_whitespace().next().unwrap_or_default() {
        "BOOLEAN" | "BOOL" => ColumnKind::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR" => {
            if unsigned {
                ColumnKind::UInt
            } else {
                ColumnKind::Int
            }
        }
        "FLOAT" | "DOUBLE" => ColumnKind::Float,
        "JSON" => ColumnKind::Json,
        "DATETIME" | "TIMESTAMP" => ColumnKind::DateTime,
        "DATE" => ColumnKind::Date,
        _ => ColumnKind::Text,
    }
}

/// Convert a MySqlRow to a Row.
fn row_to_map(row: &MySqlRow) -> Row {
    let mut map = Row::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match column_kind(type_name) {
            ColumnKind::Bool => row.try_get::<bool, _>(i).map(Value::Bool),
            ColumnKind::Int => row.try_get::<i64, _>(i).map(Value::Int),
            ColumnKind::UInt => row
                .try_get::<u64, _>(i)
                .map(|v| i64::try_from(v).map_or_else(|_| Value::String(v.to_string()), Value::Int)),
            ColumnKind::Float => row.try_get::<f64, _>(i).map(Value::Float),
            ColumnKind::Json => row
                .try_get::<sqlx::types::Json<serde_json::Value>, _>(i)
                .map(|json| Value::from_json(json.0)),
            ColumnKind::DateTime => row
                .try_get::<chrono::NaiveDateTime, _>(i)
                .map(|v| Value::String(v.to_string())),
            ColumnKind::Date => row
                .try_get::<chrono::NaiveDate, _>(i)
                .map(|v| Value::String(v.to_string())),
            ColumnKind::Text => row.try_get::<String, _>(i).map(Value::String),
        };

        let value = value.unwrap_or_else(|e| {
            debug!("column '{}' ({}) read as NULL: {}", name, type_name, e);
            Value::Null
        });
        map.insert(name, value);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset_clamps() {
        assert_eq!(page_offset(0, 20), (1, 0));
        assert_eq!(page_offset(1, 20), (1, 0));
        assert_eq!(page_offset(3, 20), (3, 40));
    }

    #[test]
    fn test_page_statements() {
        let sql = "SELECT t.* FROM t t WHERE (t.is_deleted = 0)";
        assert_eq!(
            count_sql(sql),
            "SELECT COUNT(*) AS total FROM (SELECT t.* FROM t t WHERE (t.is_deleted = 0)) AS leaf_count"
        );
        assert_eq!(
            page_sql(sql, 2, 10),
            format!("SELECT * FROM ({}) AS leaf_page LIMIT 10, 10", sql)
        );
        assert_eq!(
            page_sql(sql, 0, 10),
            format!("SELECT * FROM ({}) AS leaf_page LIMIT 0, 10", sql)
        );
    }

    #[test]
    fn test_page_of_limited_statement() {
        let ctx = SqlContext::default();
        let sql = statement::paginate(&ctx, &QueryDescriptor::new("t").limit(5)).unwrap();
        assert_eq!(
            page_sql(&sql, 2, 10),
            "SELECT * FROM (SELECT t.* FROM t t WHERE (t.is_deleted = 0) LIMIT 5) AS leaf_page LIMIT 10, 10"
        );
        assert_eq!(page_sql(&sql, 2, 10).matches("LIMIT").count(), 2);
        assert!(!page_sql(&sql, 2, 10).contains("LIMIT 5 LIMIT"));
    }

    #[test]
    fn test_page_count() {
        let page = Page {
            total: 21,
            page: 1,
            page_size: 10,
            records: Vec::new(),
        };
        assert_eq!(page.pages(), 3);
        assert_eq!(Page { page_size: 0, ..page }.pages(), 0);
    }

    #[test]
    fn test_unknown_datasource() {
        let datasources = Datasources::default();
        assert!(datasources.is_empty());
        let err = datasources.get("slave").unwrap_err();
        assert!(matches!(err, SqlError::Config(msg) if msg.contains("slave")));
    }

    #[test]
    fn test_column_kinds() {
        assert_eq!(column_kind("BIGINT"), ColumnKind::Int);
        assert_eq!(column_kind("INT UNSIGNED"), ColumnKind::UInt);
        assert_eq!(column_kind("BOOLEAN"), ColumnKind::Bool);
        assert_eq!(column_kind("DOUBLE"), ColumnKind::Float);
        assert_eq!(column_kind("JSON"), ColumnKind::Json);
        assert_eq!(column_kind("TIMESTAMP"), ColumnKind::DateTime);
        assert_eq!(column_kind("DATE"), ColumnKind::Date);
        assert_eq!(column_kind("VARCHAR"), ColumnKind::Text);
        assert_eq!(column_kind("DECIMAL"), ColumnKind::Text);
    }
}
