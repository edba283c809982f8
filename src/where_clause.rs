//! WHERE clause compiler.
//!
//! Every column of a [`ConditionRelation`] contributes at most one fragment:
//! its predicates ANDed together. Fragments keep the relation's insertion
//! order and are joined with `AND`, each wrapped in parentheses.

use tracing::debug;

use crate::builder::ToSql;
use crate::condition::{column_conditions, Condition};
use crate::context::SqlContext;
use crate::error::SqlResult;
use crate::naming::qualify;
use crate::relation::{ConditionRelation, DELETED_FLAG_FIELD, EXCLUSION_DELETED_FLAG};

/// A compiled WHERE clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    fragments: Vec<String>,
}

impl WhereClause {
    /// Compile `relation` without any implicit soft-delete filter.
    ///
    /// An exclusion flag cell is dropped rather than rendered.
    pub fn compile(relation: &ConditionRelation, alias: &str) -> SqlResult<Self> {
        let (relation, _) = strip_exclusion_flag(relation);
        Self::compile_cells(&relation, alias)
    }

    /// Compile `relation` and append `<alias>.is_deleted = <sentinel>` unless the
    /// relation carries the exclusion flag. The flag cell itself is never rendered.
    pub fn compile_soft_deleted(
        ctx: &SqlContext,
        relation: &ConditionRelation,
        alias: &str,
    ) -> SqlResult<Self> {
        let (relation, keep_deleted) = strip_exclusion_flag(relation);
        let mut clause = Self::compile_cells(&relation, alias)?;
        if !keep_deleted {
            clause.push(format!(
                "{} = {}",
                qualify(DELETED_FLAG_FIELD, alias),
                ctx.not_deleted.literal()
            ));
        }
        Ok(clause)
    }

    fn compile_cells(relation: &ConditionRelation, alias: &str) -> SqlResult<Self> {
        let mut clause = Self::default();
        for (column, cells) in relation.rows() {
            let rendered: Vec<String> = column_conditions(alias, column, cells)?
                .iter()
                .map(Condition::render)
                .filter(|s| !s.trim().is_empty())
                .collect();
            if rendered.is_empty() {
                debug!("column '{}' produced no predicate", column);
                continue;
            }
            clause.fragments.push(rendered.join(" AND "));
        }
        Ok(clause)
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        if !fragment.trim().is_empty() {
            self.fragments.push(fragment);
        }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The predicate without the `WHERE` keyword.
    pub fn predicate(&self) -> String {
        self.fragments
            .iter()
            .map(|f| format!("({})", f))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

fn strip_exclusion_flag(relation: &ConditionRelation) -> (ConditionRelation, bool) {
    let mut relation = relation.clone();
    let flagged = relation
        .remove(DELETED_FLAG_FIELD, EXCLUSION_DELETED_FLAG)
        .is_some();
    (relation, flagged)
}

impl ToSql for WhereClause {
    fn to_sql(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.predicate())
        }
    }
}
