//! Index definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cache::Named;
use crate::error::{Result, SchemaError};
use crate::normalize::{normalize_expression, same_expression};

/// One key part of an index or exclusion constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPart {
    /// A plain column reference.
    Column(String),
    /// A raw SQL expression.
    Expression(String),
}

impl IndexPart {
    /// Returns the column name for column parts.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Column(name) => Some(name),
            Self::Expression(_) => None,
        }
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Column(a), Self::Column(b)) => a == b,
            (Self::Expression(a), Self::Expression(b)) => {
                normalize_expression(a) == normalize_expression(b)
            }
            _ => false,
        }
    }

    /// Short label used in generated names: the column name, or `expr`.
    fn label(&self) -> &str {
        match self {
            Self::Column(name) => name,
            Self::Expression(_) => "expr",
        }
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMethod {
    /// B-tree.
    Btree,
    /// Hash.
    Hash,
    /// GiST (Postgres).
    Gist,
    /// GIN (Postgres).
    Gin,
    /// BRIN (Postgres).
    Brin,
    /// SP-GiST (Postgres).
    Spgist,
    /// Full-text (MySQL).
    Fulltext,
    /// Spatial (MySQL).
    Spatial,
}

impl IndexMethod {
    /// SQL keyword for the method.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Btree => "BTREE",
            Self::Hash => "HASH",
            Self::Gist => "GIST",
            Self::Gin => "GIN",
            Self::Brin => "BRIN",
            Self::Spgist => "SPGIST",
            Self::Fulltext => "FULLTEXT",
            Self::Spatial => "SPATIAL",
        }
    }
}

impl fmt::Display for IndexMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IndexMethod {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btree" => Ok(Self::Btree),
            "hash" => Ok(Self::Hash),
            "gist" => Ok(Self::Gist),
            "gin" => Ok(Self::Gin),
            "brin" => Ok(Self::Brin),
            "spgist" => Ok(Self::Spgist),
            "fulltext" => Ok(Self::Fulltext),
            "spatial" => Ok(Self::Spatial),
            other => Err(SchemaError::malformed(
                "index method",
                format!("unknown index method {other:?}"),
            )),
        }
    }
}

/// A table (or materialized view) index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Schema of the indexed table.
    pub table_schema: String,
    /// Name of the indexed table.
    pub table_name: String,
    /// Whether this is a `UNIQUE` index.
    #[serde(default)]
    pub unique: bool,
    /// Access method, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<IndexMethod>,
    /// Key parts, in order.
    pub parts: Vec<IndexPart>,
    /// Non-key columns (`INCLUDE`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Partial index predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

impl Named for Index {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Index {
    /// Creates an index over `columns`. An empty name is generated when the
    /// index is added to a table.
    #[must_use]
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            table_schema: String::new(),
            table_name: String::new(),
            unique: false,
            method: None,
            parts: columns
                .into_iter()
                .map(|c| IndexPart::Column(c.into()))
                .collect(),
            include: Vec::new(),
            predicate: None,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the access method.
    #[must_use]
    pub fn using(mut self, method: IndexMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Appends an expression key part.
    #[must_use]
    pub fn expression(mut self, expr: impl Into<String>) -> Self {
        self.parts.push(IndexPart::Expression(expr.into()));
        self
    }

    /// Sets the non-key `INCLUDE` columns.
    #[must_use]
    pub fn include<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.include = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Makes the index partial.
    #[must_use]
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Binds the index to its table.
    #[must_use]
    pub fn on_table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.table_schema = schema.into();
        self.table_name = table.into();
        self
    }

    /// The name generated for an unnamed index: `{table}_{parts}_idx`.
    #[must_use]
    pub fn default_name(&self) -> String {
        let labels: Vec<&str> = self.parts.iter().map(IndexPart::label).collect();
        format!("{}_{}_idx", self.table_name, labels.join("_"))
    }

    /// Column names used as key parts.
    pub fn key_columns(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(IndexPart::column)
    }

    /// Checks the index against the columns of its table.
    pub fn validate(&self, has_column: impl Fn(&str) -> bool) -> Result<()> {
        let entity = || format!("index {}", self.name);
        if self.name.is_empty() {
            return Err(SchemaError::malformed(
                format!("table {}", self.table_name),
                "index with an empty name",
            ));
        }
        if self.parts.is_empty() {
            return Err(SchemaError::malformed(entity(), "no key parts"));
        }
        for part in &self.parts {
            match part {
                IndexPart::Column(c) if !has_column(c.as_str()) => {
                    return Err(SchemaError::malformed(entity(), format!("unknown column {c:?}")));
                }
                IndexPart::Expression(e) if e.trim().is_empty() => {
                    return Err(SchemaError::malformed(entity(), "empty key expression"));
                }
                _ => {}
            }
        }
        if let Some(c) = self.include.iter().find(|c| !has_column(c.as_str())) {
            return Err(SchemaError::malformed(
                entity(),
                format!("unknown included column {c:?}"),
            ));
        }
        Ok(())
    }

    /// Compares every semantically significant field.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.name == other.name
            && self.table_schema == other.table_schema
            && self.table_name == other.table_name
            && self.unique == other.unique
            && effective_method(self.method) == effective_method(other.method)
            && self.parts.len() == other.parts.len()
            && self.parts.iter().zip(&other.parts).all(|(a, b)| a.same(b))
            && self.include == other.include
            && same_expression(self.predicate.as_deref(), other.predicate.as_deref())
    }
}

// BTREE is what every dialect picks when no method is named.
fn effective_method(method: Option<IndexMethod>) -> IndexMethod {
    method.unwrap_or(IndexMethod::Btree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_uses_parts() {
        let idx = Index::new("", ["last_name", "first_name"])
            .expression("lower(email)")
            .on_table("public", "actor");
        assert_eq!(idx.default_name(), "actor_last_name_first_name_expr_idx");
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("GiST".parse::<IndexMethod>().unwrap(), IndexMethod::Gist);
        assert!("rtree".parse::<IndexMethod>().is_err());
    }

    #[test]
    fn test_validate_unknown_columns() {
        let idx = Index::new("i", ["a"]).include(["b"]);
        assert!(idx.validate(|c| c == "a" || c == "b").is_ok());
        let err = idx.validate(|c| c == "a").unwrap_err();
        assert!(err.to_string().contains("unknown included column"));
        let err = Index::new("i", Vec::<String>::new()).validate(|_| true).unwrap_err();
        assert!(err.to_string().contains("no key parts"));
    }

    #[test]
    fn test_same_definition_treats_btree_as_default() {
        let a = Index::new("i", ["a"]).on_table("s", "t");
        let b = a.clone().using(IndexMethod::Btree);
        assert!(a.same_definition(&b));
        let c = a.clone().using(IndexMethod::Hash);
        assert!(!a.same_definition(&c));
        let d = a.clone().predicate("(a > 0)");
        let e = a.clone().predicate("a > 0");
        assert!(d.same_definition(&e));
    }
}
