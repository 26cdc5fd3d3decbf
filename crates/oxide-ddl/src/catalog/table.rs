//! Tables.

use serde::{Deserialize, Serialize};

use super::cache::{Named, NamedList};
use super::column::Column;
use super::constraint::{Constraint, ConstraintKind};
use super::index::Index;
use super::trigger::Trigger;
use crate::error::{Result, SchemaError};

/// Module metadata of a virtual table (`CREATE VIRTUAL TABLE ... USING`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualTable {
    /// Module name, e.g. `fts5`.
    pub module: String,
    /// Raw module arguments.
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// A table with its columns, constraints, indexes and triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Columns, in declaration order.
    #[serde(default)]
    pub columns: NamedList<Column>,
    /// Constraints, in declaration order.
    #[serde(default)]
    pub constraints: NamedList<Constraint>,
    /// Indexes.
    #[serde(default)]
    pub indexes: NamedList<Index>,
    /// Triggers.
    #[serde(default)]
    pub triggers: NamedList<Trigger>,
    /// Virtual table module, when this is a virtual table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_table: Option<VirtualTable>,
}

impl Named for Table {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: NamedList::new(),
            constraints: NamedList::new(),
            indexes: NamedList::new(),
            triggers: NamedList::new(),
            virtual_table: None,
        }
    }

    /// `schema.name`, or just `name` without a schema. Used in messages.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.add_index(index);
        self
    }

    /// Adds a trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.add_trigger(trigger);
        self
    }

    /// Turns the table into a virtual table using `module`.
    #[must_use]
    pub fn virtual_using<S: Into<String>>(
        mut self,
        module: impl Into<String>,
        arguments: impl IntoIterator<Item = S>,
    ) -> Self {
        self.virtual_table = Some(VirtualTable {
            module: module.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        });
        self
    }

    // ========================================================================
    // Incremental construction
    // ========================================================================

    /// Upserts a column by name.
    pub fn add_column(&mut self, column: Column) -> usize {
        self.columns.upsert(column)
    }

    /// Upserts a constraint by name, generating the name when empty.
    pub fn add_constraint(&mut self, mut constraint: Constraint) -> usize {
        if constraint.name.is_empty() {
            constraint.name = constraint.default_name(&self.name);
        }
        self.constraints.upsert(constraint)
    }

    /// Upserts an index by name, binding it to this table and generating the
    /// name when empty.
    pub fn add_index(&mut self, index: Index) -> usize {
        let mut index = index.on_table(self.schema.clone(), self.name.clone());
        if index.name.is_empty() {
            index.name = index.default_name();
        }
        self.indexes.upsert(index)
    }

    /// Upserts a trigger by name, binding it to this table.
    pub fn add_trigger(&mut self, trigger: Trigger) -> usize {
        self.triggers
            .upsert(trigger.on_table(self.schema.clone(), self.name.clone()))
    }

    /// Returns a copy of the column named `name` and its position, appending
    /// an untyped column first when missing.
    pub fn get_or_create_column(&mut self, name: &str) -> (Column, usize) {
        self.columns
            .get_or_create_with(name, |n| Column::new(n, String::new()))
    }

    /// Writes a column back at `pos`.
    pub fn store_column(&mut self, pos: usize, column: Column) -> Result<()> {
        self.columns.store(pos, column)
    }

    /// Moves the table and its children to `schema`.
    pub(crate) fn set_schema(&mut self, schema: &str) {
        self.schema = schema.to_string();
        self.indexes
            .modify_all(|i| i.table_schema = schema.to_string());
        self.triggers
            .modify_all(|t| t.table_schema = schema.to_string());
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns the column named `name`.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get_by_name(name)
    }

    /// Returns the primary key constraint, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
    }

    /// Iterates over the foreign keys.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_foreign_key())
    }

    /// Returns the column covered by a single-column primary key.
    #[must_use]
    pub fn single_column_primary_key(&self) -> Option<&str> {
        self.primary_key().and_then(Constraint::single_column)
    }

    /// Whether a single-column constraint of `kind` covers `column`.
    #[must_use]
    pub fn column_has_single_constraint(&self, column: &str, kind: ConstraintKind) -> bool {
        self.constraints
            .iter()
            .any(|c| c.kind == kind && c.single_column() == Some(column))
    }

    /// Derives `is_primary_key` / `is_unique` on every column.
    ///
    /// Runs in two passes once the table is fully loaded: every flag is
    /// reset, then the constraints are scanned once.
    pub fn backfill_key_flags(&mut self) {
        self.columns.modify_all(|c| {
            c.is_primary_key = false;
            c.is_unique = false;
        });
        let marks: Vec<(String, ConstraintKind)> = self
            .constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::PrimaryKey | ConstraintKind::Unique))
            .filter_map(|c| c.single_column().map(|col| (col.to_string(), c.kind)))
            .collect();
        for (name, kind) in marks {
            let Some(pos) = self.columns.cached_position(&name) else {
                continue;
            };
            let Some(mut column) = self.columns.get(pos).cloned() else {
                continue;
            };
            match kind {
                ConstraintKind::PrimaryKey => column.is_primary_key = true,
                _ => column.is_unique = true,
            }
            if let Err(err) = self.columns.store(pos, column) {
                tracing::warn!(table = %self.name, error = %err, "column write-back failed");
            }
        }
    }

    /// Checks the table and everything it owns.
    pub fn validate(&self) -> Result<()> {
        let qualified = self.qualified_name();
        if self.name.is_empty() {
            return Err(SchemaError::malformed(
                format!("schema {}", self.schema),
                "table with an empty name",
            ));
        }
        if self.virtual_table.is_none() && self.columns.is_empty() {
            return Err(SchemaError::malformed(
                format!("table {qualified}"),
                "no columns",
            ));
        }
        if let Some(vt) = &self.virtual_table {
            if vt.module.trim().is_empty() {
                return Err(SchemaError::malformed(
                    format!("table {qualified}"),
                    "virtual table without a module",
                ));
            }
        }
        for column in &self.columns {
            column.validate(&qualified)?;
        }
        let primary_keys = self
            .constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::PrimaryKey)
            .count();
        if primary_keys > 1 {
            return Err(SchemaError::malformed(
                format!("table {qualified}"),
                format!("{primary_keys} primary keys declared"),
            ));
        }
        let has_column = |c: &str| self.columns.contains(c);
        for constraint in &self.constraints {
            constraint.validate(&qualified, has_column)?;
        }
        for index in &self.indexes {
            index.validate(has_column)?;
        }
        for trigger in &self.triggers {
            trigger.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> Table {
        Table::new("public", "actor")
            .column(Column::new("actor_id", "integer").not_null())
            .column(Column::new("email", "text"))
            .column(Column::new("first_name", "text"))
            .constraint(Constraint::primary_key(["actor_id"]))
            .constraint(Constraint::unique(["email"]))
            .constraint(Constraint::unique(["first_name", "email"]))
    }

    #[test]
    fn test_generated_names() {
        let t = actor().index(Index::new("", ["first_name"]));
        assert!(t.constraints.contains("actor_actor_id_pkey"));
        assert!(t.constraints.contains("actor_email_key"));
        assert!(t.constraints.contains("actor_first_name_email_key"));
        let idx = t.indexes.get_by_name("actor_first_name_idx").unwrap();
        assert_eq!(idx.table_schema, "public");
        assert_eq!(idx.table_name, "actor");
    }

    #[test]
    fn test_backfill_marks_single_column_keys_only() {
        let mut t = actor();
        t.backfill_key_flags();
        let id = t.get_column("actor_id").unwrap();
        assert!(id.is_primary_key);
        assert!(!id.is_unique);
        assert!(t.get_column("email").unwrap().is_unique);
        assert!(!t.get_column("first_name").unwrap().is_unique);

        // A second pass resets stale flags.
        t.constraints.retain(|c| c.kind != ConstraintKind::Unique);
        t.backfill_key_flags();
        assert!(!t.get_column("email").unwrap().is_unique);
    }

    #[test]
    fn test_redeclaration_is_an_upsert() {
        let mut t = actor();
        t.add_column(Column::new("email", "varchar(255)").not_null());
        assert_eq!(t.columns.len(), 3);
        assert_eq!(t.get_column("email").unwrap().data_type, "varchar(255)");
    }

    #[test]
    fn test_get_or_create_and_store_column() {
        let mut t = Table::new("", "t");
        let (mut col, pos) = t.get_or_create_column("a");
        col.data_type = "INTEGER".into();
        t.store_column(pos, col).unwrap();
        assert_eq!(t.columns.cached_position("a"), Some(0));
        assert_eq!(t.get_column("a").unwrap().data_type, "INTEGER");
    }

    #[test]
    fn test_validate_rejects_two_primary_keys() {
        let t = actor().constraint(Constraint::primary_key(["email"]).named("second"));
        let err = t.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed table public.actor: 2 primary keys declared"
        );
    }

    #[test]
    fn test_validate_rejects_unknown_constraint_column() {
        let t = actor().constraint(Constraint::unique(["nope"]));
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("unknown column \"nope\""));
    }

    #[test]
    fn test_virtual_table_needs_no_columns() {
        let t = Table::new("", "docs").virtual_using("fts5", ["title", "body"]);
        assert!(t.validate().is_ok());
    }
}
