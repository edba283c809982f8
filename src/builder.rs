//! Clause-ordered statement builder.
//!
//! Collects clauses in any order and renders them in SQL order on one line.

use crate::where_clause::WhereClause;

/// Trait for converting statement parts to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Kind {
    #[default]
    Select,
    Update,
    Delete,
}

/// Accumulates the clauses of one SELECT, UPDATE or DELETE statement.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    kind: Kind,
    table: String,
    select: Vec<String>,
    from: Vec<String>,
    joins: Vec<String>,
    sets: Vec<String>,
    wheres: WhereClause,
    group_by: Vec<String>,
    having: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
}

impl SqlBuilder {
    pub fn select(columns: impl Into<String>) -> Self {
        Self {
            kind: Kind::Select,
            select: vec![columns.into()],
            ..Self::default()
        }
    }

    pub fn update(table: impl Into<String>) -> Self {
        Self {
            kind: Kind::Update,
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn delete_from(table: impl Into<String>) -> Self {
        Self {
            kind: Kind::Delete,
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from.push(table.into());
        self
    }

    /// Append a fully rendered join clause (`LEFT OUTER JOIN ... ON ...`).
    pub fn join(mut self, clause: impl Into<String>) -> Self {
        self.joins.push(clause.into());
        self
    }

    pub fn set(mut self, assignment: impl Into<String>) -> Self {
        self.sets.push(assignment.into());
        self
    }

    pub fn wheres(mut self, clause: WhereClause) -> Self {
        for fragment in clause.fragments() {
            self.wheres.push(fragment.clone());
        }
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.having.extend(conditions.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(column.into());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }
}

impl ToSql for SqlBuilder {
    fn to_sql(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match self.kind {
            Kind::Select => {
                parts.push(format!("SELECT {}", self.select.join(", ")));
                if !self.from.is_empty() {
                    parts.push(format!("FROM {}", self.from.join(", ")));
                }
                parts.extend(self.joins.iter().cloned());
            }
            Kind::Update => {
                parts.push(format!("UPDATE {}", self.table));
                if !self.sets.is_empty() {
                    parts.push(format!("SET {}", self.sets.join(", ")));
                }
            }
            Kind::Delete => parts.push(format!("DELETE FROM {}", self.table)),
        }

        if !self.wheres.is_empty() {
            parts.push(self.wheres.to_sql());
        }
        if !self.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.having.is_empty() {
            let having: Vec<String> = self.having.iter().map(|h| format!("({})", h)).collect();
            parts.push(format!("HAVING {}", having.join(" AND ")));
        }
        if !self.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by.join(", ")));
        }
        if let Some(n) = self.limit {
            parts.push(format!("LIMIT {}", n));
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_clause_order() {
        let mut wheres = WhereClause::default();
        wheres.push("a.id = 1");
        let sql = SqlBuilder::select("a.*")
            .order_by("a.id desc")
            .limit(5)
            .wheres(wheres)
            .from("s_admin a")
            .group_by(["a.role"])
            .having(["COUNT(*) > 1"])
            .to_sql();
        assert_eq!(
            sql,
            "SELECT a.* FROM s_admin a WHERE (a.id = 1) GROUP BY a.role HAVING (COUNT(*) > 1) ORDER BY a.id desc LIMIT 5"
        );
    }

    #[test]
    fn test_update_and_delete() {
        let sql = SqlBuilder::update("t").set("a = 1").set("b = 'x'").to_sql();
        assert_eq!(sql, "UPDATE t SET a = 1, b = 'x'");
        assert_eq!(SqlBuilder::delete_from("t").to_sql(), "DELETE FROM t");
    }
}
