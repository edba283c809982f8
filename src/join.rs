//! JOIN compiler.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde::Deserializer;
use tracing::{debug, warn};

/// Supported join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
    Right,
    Inner,
}

impl JoinType {
    /// Case-insensitive match of `left`, `right` or `inner`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Some(JoinType::Left),
            "right" => Some(JoinType::Right),
            "inner" => Some(JoinType::Inner),
            _ => None,
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JoinType::Left => write!(f, "LEFT OUTER JOIN"),
            JoinType::Right => write!(f, "RIGHT OUTER JOIN"),
            JoinType::Inner => write!(f, "INNER JOIN"),
        }
    }
}

/// One joined table and its ON field pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// `left`, `right` or `inner`, any case. Anything else is dropped.
    pub join_type: String,
    pub sub_table: String,
    pub sub_alias: String,
    pub main_alias: String,
    /// Sub-table field → main-table field; pairs are ANDed.
    #[serde(default)]
    pub fields: IndexMap<String, String>,
}

impl JoinSpec {
    pub fn new(
        join_type: impl Into<String>,
        sub_table: impl Into<String>,
        sub_alias: impl Into<String>,
        main_alias: impl Into<String>,
    ) -> Self {
        Self {
            join_type: join_type.into(),
            sub_table: sub_table.into(),
            sub_alias: sub_alias.into(),
            main_alias: main_alias.into(),
            fields: IndexMap::new(),
        }
    }

    /// Add an `ON sub_alias.sub_field = main_alias.main_field` pair.
    pub fn field(mut self, sub_field: impl Into<String>, main_field: impl Into<String>) -> Self {
        self.fields.insert(sub_field.into(), main_field.into());
        self
    }

    /// `<sub_table> <sub_alias> ON ...`, or `None` without field pairs.
    pub fn on_clause(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .fields
            .iter()
            .map(|(sub, main)| {
                format!("{}.{} = {}.{}", self.sub_alias, sub, self.main_alias, main)
            })
            .collect();
        Some(format!(
            "{} {} ON {}",
            self.sub_table,
            self.sub_alias,
            pairs.join(" AND ")
        ))
    }

    /// The full join clause. Unrecognized join types and empty field maps yield `None`.
    pub fn to_clause(&self) -> Option<String> {
        let Some(join_type) = JoinType::parse(&self.join_type) else {
            debug!(
                "dropped join on '{}': unrecognized join type '{}'",
                self.sub_table, self.join_type
            );
            return None;
        };
        let Some(on) = self.on_clause() else {
            debug!("dropped join on '{}': no field pairs", self.sub_table);
            return None;
        };
        Some(format!("{} {}", join_type, on))
    }
}

/// Nested join description: join type → sub table → sub alias → main alias → field pairs.
pub type NestedJoins =
    IndexMap<String, IndexMap<String, IndexMap<String, IndexMap<String, IndexMap<String, String>>>>>;

/// Flatten a nested join description into specs, preserving order.
pub fn flatten_joins(nested: &NestedJoins) -> Vec<JoinSpec> {
    let mut specs = Vec::new();
    for (join_type, tables) in nested {
        for (sub_table, aliases) in tables {
            for (sub_alias, mains) in aliases {
                for (main_alias, fields) in mains {
                    specs.push(JoinSpec {
                        join_type: join_type.clone(),
                        sub_table: sub_table.clone(),
                        sub_alias: sub_alias.clone(),
                        main_alias: main_alias.clone(),
                        fields: fields.clone(),
                    });
                }
            }
        }
    }
    specs
}

/// Builder over the nested join shape.
///
/// ```
/// use leaf_sql::join::{compile_joins, JoinSet};
///
/// let joins = JoinSet::new()
///     .join("left", "orders")
///     .on("o", "u")
///     .field("user_id", "id");
/// assert_eq!(
///     compile_joins(&joins.specs()),
///     vec!["LEFT OUTER JOIN orders o ON o.user_id = u.id".to_string()]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "NestedJoins", into = "NestedJoins")]
pub struct JoinSet {
    nested: NestedJoins,
    table: Option<(String, String)>,
    aliases: Option<(String, String)>,
}

impl JoinSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a join on `sub_table`; follow with [`JoinSet::on`].
    pub fn join(mut self, join_type: impl Into<String>, sub_table: impl Into<String>) -> Self {
        self.table = Some((join_type.into(), sub_table.into()));
        self.aliases = None;
        self
    }

    /// Name the aliases of the current join.
    pub fn on(mut self, sub_alias: impl Into<String>, main_alias: impl Into<String>) -> Self {
        let Some((join_type, sub_table)) = self.table.clone() else {
            warn!("join aliases given before a joined table, ignored");
            return self;
        };
        let (sub_alias, main_alias) = (sub_alias.into(), main_alias.into());
        self.nested
            .entry(join_type)
            .or_default()
            .entry(sub_table)
            .or_default()
            .entry(sub_alias.clone())
            .or_default()
            .entry(main_alias.clone())
            .or_default();
        self.aliases = Some((sub_alias, main_alias));
        self
    }

    /// Add an `ON` field pair to the current join.
    pub fn field(mut self, sub_field: impl Into<String>, main_field: impl Into<String>) -> Self {
        let (Some((join_type, sub_table)), Some((sub_alias, main_alias))) =
            (self.table.clone(), self.aliases.clone())
        else {
            warn!("join field given before its aliases, ignored");
            return self;
        };
        if let Some(fields) = self
            .nested
            .get_mut(&join_type)
            .and_then(|tables| tables.get_mut(&sub_table))
            .and_then(|aliases| aliases.get_mut(&sub_alias))
            .and_then(|mains| mains.get_mut(&main_alias))
        {
            fields.insert(sub_field.into(), main_field.into());
        }
        self
    }

    pub fn specs(&self) -> Vec<JoinSpec> {
        flatten_joins(&self.nested)
    }

    pub fn is_empty(&self) -> bool {
        self.nested.is_empty()
    }
}

impl From<NestedJoins> for JoinSet {
    fn from(nested: NestedJoins) -> Self {
        Self {
            nested,
            ..Self::default()
        }
    }
}

impl From<JoinSet> for NestedJoins {
    fn from(joins: JoinSet) -> Self {
        joins.nested
    }
}

/// Accept joins either as a list of specs or in the nested shape.
pub fn deserialize_joins<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<JoinSpec>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Joins {
        List(Vec<JoinSpec>),
        Nested(JoinSet),
    }

    Ok(match Joins::deserialize(deserializer)? {
        Joins::List(specs) => specs,
        Joins::Nested(joins) => joins.specs(),
    })
}

/// Render every recognizable join clause, in order.
pub fn compile_joins(specs: &[JoinSpec]) -> Vec<String> {
    specs.iter().filter_map(JoinSpec::to_clause).collect()
}
