//! Views and materialized views.

use serde::{Deserialize, Serialize};

use super::cache::{Named, NamedList};
use super::index::Index;
use super::trigger::Trigger;
use crate::error::{Result, SchemaError};
use crate::normalize::same_source;

/// A (possibly materialized) view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// Schema name.
    pub schema: String,
    /// View name.
    pub name: String,
    /// `MATERIALIZED`.
    #[serde(default)]
    pub materialized: bool,
    /// The query, as dialect SQL text.
    pub query: String,
    /// Output field names of the query, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Declared column list, `CREATE VIEW v (a, b) AS ...`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Indexes (materialized views only).
    #[serde(default)]
    pub indexes: NamedList<Index>,
    /// Triggers.
    #[serde(default)]
    pub triggers: NamedList<Trigger>,
}

impl Named for View {
    fn name(&self) -> &str {
        &self.name
    }
}

impl View {
    /// Creates a plain view.
    #[must_use]
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            schema: String::new(),
            name: name.into(),
            materialized: false,
            query: query.into(),
            fields: Vec::new(),
            columns: Vec::new(),
            indexes: NamedList::new(),
            triggers: NamedList::new(),
        }
    }

    /// Makes the view materialized.
    #[must_use]
    pub fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }

    /// Records the output field names of the query.
    #[must_use]
    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declares the view's column list.
    #[must_use]
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an index, binding it to this view and naming it if unnamed.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.add_index(index);
        self
    }

    /// Adds a trigger bound to this view.
    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.add_trigger(trigger);
        self
    }

    /// Upserts an index by name.
    pub fn add_index(&mut self, index: Index) -> usize {
        let mut index = index.on_table(self.schema.clone(), self.name.clone());
        if index.name.is_empty() {
            index.name = index.default_name();
        }
        self.indexes.upsert(index)
    }

    /// Upserts a trigger by name.
    pub fn add_trigger(&mut self, trigger: Trigger) -> usize {
        self.triggers
            .upsert(trigger.on_table(self.schema.clone(), self.name.clone()))
    }

    /// Moves the view and its children to `schema`.
    pub(crate) fn set_schema(&mut self, schema: &str) {
        self.schema = schema.to_string();
        self.indexes
            .modify_all(|i| i.table_schema = schema.to_string());
        self.triggers
            .modify_all(|t| t.table_schema = schema.to_string());
    }

    /// Names a column can be referenced by: the declared list, else the
    /// query's output fields.
    #[must_use]
    pub fn output_columns(&self) -> &[String] {
        if self.columns.is_empty() {
            &self.fields
        } else {
            &self.columns
        }
    }

    /// Checks the declared columns against the query's output fields.
    pub fn validate(&self) -> Result<()> {
        let entity = || format!("view {}.{}", self.schema, self.name);
        if self.name.is_empty() {
            return Err(SchemaError::malformed(
                format!("schema {}", self.schema),
                "view with an empty name",
            ));
        }
        if self.query.trim().is_empty() {
            return Err(SchemaError::malformed(entity(), "empty query"));
        }
        if !self.columns.is_empty()
            && !self.fields.is_empty()
            && self.columns.len() != self.fields.len()
        {
            return Err(SchemaError::malformed(
                entity(),
                format!(
                    "declares {} columns but the query outputs {}",
                    self.columns.len(),
                    self.fields.len()
                ),
            ));
        }
        if (!self.indexes.is_empty() || !self.triggers.is_empty()) && !self.materialized {
            return Err(SchemaError::malformed(
                entity(),
                "only materialized views carry indexes or triggers",
            ));
        }
        let known = self.output_columns();
        let has_column = |c: &str| known.is_empty() || known.iter().any(|k| k == c);
        for index in &self.indexes {
            index.validate(&has_column)?;
        }
        for trigger in &self.triggers {
            trigger.validate()?;
        }
        Ok(())
    }

    /// Compares the definition of the view itself, not its indexes or
    /// triggers.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.name == other.name
            && self.materialized == other.materialized
            && self.columns == other.columns
            && same_source(&self.query, &other.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_columns_must_match_output() {
        let view = View::new("v", "SELECT a, b FROM t")
            .fields(["a", "b"])
            .columns(["x"]);
        let err = view.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed view .v: declares 1 columns but the query outputs 2"
        );
        let ok = View::new("v", "SELECT a, b FROM t")
            .fields(["a", "b"])
            .columns(["x", "y"]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_indexes_require_materialized() {
        let view = View::new("v", "SELECT a FROM t").index(Index::new("", ["a"]));
        assert!(view.validate().is_err());
        let view = view.materialized();
        assert!(view.validate().is_ok());
        assert_eq!(view.indexes.get(0).map(|i| i.name.as_str()), Some("v_a_idx"));
    }

    #[test]
    fn test_query_layout_is_not_a_change() {
        let a = View::new("v", "SELECT a\n  FROM t");
        let b = View::new("v", "SELECT a FROM t;");
        assert!(a.same_definition(&b));
        assert!(!a.same_definition(&b.clone().materialized()));
    }
}
