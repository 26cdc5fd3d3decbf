//! DDL commands.
//!
//! A [`Command`] is one logical schema change. The diff engine produces
//! them, [`Plan`](super::Plan) groups them into phases, and
//! [`Renderer`](crate::render::Renderer) turns each into one or more
//! statements for a dialect.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Column, Constraint, Function, IdentityKind, Index, Table, Trigger, View};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// `CREATE SCHEMA`.
    CreateSchema(CreateSchema),
    /// `DROP SCHEMA`.
    DropSchema(DropSchema),
    /// `CREATE TABLE`, with whatever constraints, indexes and triggers the
    /// payload table carries.
    CreateTable(CreateTable),
    /// `DROP TABLE`.
    DropTable(DropTable),
    /// `ALTER TABLE ... RENAME TO`.
    RenameTable(RenameTable),
    /// `ALTER TABLE ... ADD COLUMN`.
    AddColumn(AddColumn),
    /// `ALTER TABLE ... ALTER COLUMN` / `MODIFY COLUMN`.
    AlterColumn(AlterColumn),
    /// `ALTER TABLE ... DROP COLUMN`.
    DropColumn(DropColumn),
    /// `ALTER TABLE ... RENAME COLUMN`.
    RenameColumn(RenameColumn),
    /// `ALTER TABLE ... ADD CONSTRAINT`.
    AddConstraint(AddConstraint),
    /// `ALTER TABLE ... DROP CONSTRAINT`.
    DropConstraint(DropConstraint),
    /// `ALTER TABLE ... RENAME CONSTRAINT`.
    RenameConstraint(RenameConstraint),
    /// `CREATE INDEX`.
    CreateIndex(CreateIndex),
    /// `DROP INDEX`.
    DropIndex(DropIndex),
    /// `CREATE VIEW`.
    CreateView(CreateView),
    /// `DROP VIEW`.
    DropView(DropView),
    /// `CREATE FUNCTION` / `CREATE PROCEDURE`.
    CreateFunction(CreateFunction),
    /// `DROP FUNCTION` / `DROP PROCEDURE`.
    DropFunction(DropFunction),
    /// `CREATE TRIGGER`.
    CreateTrigger(CreateTrigger),
    /// `DROP TRIGGER`.
    DropTrigger(DropTrigger),
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload of [`Command::CreateSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSchema {
    /// Schema name.
    pub name: String,
}

/// Payload of [`Command::DropSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSchema {
    /// Schema name.
    pub name: String,
    /// Append `CASCADE`.
    pub cascade: bool,
}

/// Payload of [`Command::CreateTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    /// The table to create.
    pub table: Table,
}

/// Payload of [`Command::DropTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTable {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Append `CASCADE`.
    pub cascade: bool,
}

/// Payload of [`Command::RenameTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameTable {
    /// Schema name.
    pub schema: String,
    /// Current name.
    pub from: String,
    /// New name.
    pub to: String,
}

/// Payload of [`Command::AddColumn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddColumn {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// The new column. Its key flags tell whether a primary key or unique
    /// constraint covers it.
    pub column: Column,
}

/// One change to an existing column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", content = "value", rename_all = "snake_case")]
pub enum ColumnChange {
    /// New type, with the collation to apply alongside it.
    SetType {
        /// New declared type.
        data_type: String,
        /// Collation, if any.
        collation: Option<String>,
    },
    /// `SET NOT NULL`.
    SetNotNull,
    /// `DROP NOT NULL`.
    DropNotNull,
    /// `SET DEFAULT expr`.
    SetDefault(String),
    /// `DROP DEFAULT`.
    DropDefault,
    /// `ADD GENERATED ... AS IDENTITY`.
    AddIdentity(IdentityKind),
    /// `SET GENERATED ...`.
    SetIdentity(IdentityKind),
    /// `DROP IDENTITY`.
    DropIdentity,
    /// The generated expression changed.
    SetGenerated,
    /// `ON UPDATE CURRENT_TIMESTAMP` toggled.
    SetOnUpdate(bool),
}

/// Payload of [`Command::AlterColumn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterColumn {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// The complete new column definition.
    pub column: Column,
    /// The individual changes from the current definition.
    pub changes: Vec<ColumnChange>,
}

/// Payload of [`Command::DropColumn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropColumn {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Append `CASCADE`.
    pub cascade: bool,
}

/// Payload of [`Command::RenameColumn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameColumn {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Current name.
    pub from: String,
    /// New name.
    pub to: String,
}

/// Payload of [`Command::AddConstraint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddConstraint {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// The constraint to add.
    pub constraint: Constraint,
}

/// Payload of [`Command::DropConstraint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropConstraint {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// The constraint to drop. MySQL needs its kind.
    pub constraint: Constraint,
    /// Append `CASCADE`.
    pub cascade: bool,
}

/// Payload of [`Command::RenameConstraint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameConstraint {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Current name.
    pub from: String,
    /// New name.
    pub to: String,
}

/// Payload of [`Command::CreateIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndex {
    /// The index to create.
    pub index: Index,
    /// `CONCURRENTLY`.
    pub concurrently: bool,
}

/// Payload of [`Command::DropIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIndex {
    /// The index to drop. MySQL needs its table.
    pub index: Index,
    /// `CONCURRENTLY`.
    pub concurrently: bool,
    /// Append `CASCADE`.
    pub cascade: bool,
}

/// Payload of [`Command::CreateView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateView {
    /// The view to create.
    pub view: View,
    /// `CREATE OR REPLACE`.
    pub or_replace: bool,
}

/// Payload of [`Command::DropView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropView {
    /// Schema name.
    pub schema: String,
    /// View name.
    pub name: String,
    /// `DROP MATERIALIZED VIEW`.
    pub materialized: bool,
    /// Append `CASCADE`.
    pub cascade: bool,
}

/// Payload of [`Command::CreateFunction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFunction {
    /// The function to create.
    pub function: Function,
    /// `CREATE OR REPLACE`.
    pub or_replace: bool,
}

/// Payload of [`Command::DropFunction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropFunction {
    /// The function to drop, needed for its signature.
    pub function: Function,
    /// Append `CASCADE`.
    pub cascade: bool,
}

/// Payload of [`Command::CreateTrigger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTrigger {
    /// The trigger to create.
    pub trigger: Trigger,
}

/// Payload of [`Command::DropTrigger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTrigger {
    /// The trigger to drop.
    pub trigger: Trigger,
    /// Append `CASCADE`.
    pub cascade: bool,
}

// ============================================================================
// Constructors
// ============================================================================

impl Command {
    /// `CREATE SCHEMA name`.
    #[must_use]
    pub fn create_schema(name: impl Into<String>) -> Self {
        Self::CreateSchema(CreateSchema { name: name.into() })
    }

    /// `DROP SCHEMA name`.
    #[must_use]
    pub fn drop_schema(name: impl Into<String>, cascade: bool) -> Self {
        Self::DropSchema(DropSchema {
            name: name.into(),
            cascade,
        })
    }

    /// `CREATE TABLE` for `table`.
    #[must_use]
    pub fn create_table(table: Table) -> Self {
        Self::CreateTable(CreateTable { table })
    }

    /// `DROP TABLE schema.name`.
    #[must_use]
    pub fn drop_table(schema: impl Into<String>, name: impl Into<String>, cascade: bool) -> Self {
        Self::DropTable(DropTable {
            schema: schema.into(),
            name: name.into(),
            cascade,
        })
    }

    /// `ALTER TABLE schema.from RENAME TO to`.
    #[must_use]
    pub fn rename_table(
        schema: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::RenameTable(RenameTable {
            schema: schema.into(),
            from: from.into(),
            to: to.into(),
        })
    }

    /// `ALTER TABLE ... ADD COLUMN`.
    #[must_use]
    pub fn add_column(schema: impl Into<String>, table: impl Into<String>, column: Column) -> Self {
        Self::AddColumn(AddColumn {
            schema: schema.into(),
            table: table.into(),
            column,
        })
    }

    /// `ALTER TABLE ... ALTER COLUMN`.
    #[must_use]
    pub fn alter_column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: Column,
        changes: Vec<ColumnChange>,
    ) -> Self {
        Self::AlterColumn(AlterColumn {
            schema: schema.into(),
            table: table.into(),
            column,
            changes,
        })
    }

    /// `ALTER TABLE ... DROP COLUMN`.
    #[must_use]
    pub fn drop_column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        cascade: bool,
    ) -> Self {
        Self::DropColumn(DropColumn {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            cascade,
        })
    }

    /// `ALTER TABLE ... RENAME COLUMN`.
    #[must_use]
    pub fn rename_column(
        schema: impl Into<String>,
        table: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::RenameColumn(RenameColumn {
            schema: schema.into(),
            table: table.into(),
            from: from.into(),
            to: to.into(),
        })
    }

    /// `ALTER TABLE ... ADD CONSTRAINT`.
    #[must_use]
    pub fn add_constraint(
        schema: impl Into<String>,
        table: impl Into<String>,
        constraint: Constraint,
    ) -> Self {
        Self::AddConstraint(AddConstraint {
            schema: schema.into(),
            table: table.into(),
            constraint,
        })
    }

    /// `ALTER TABLE ... DROP CONSTRAINT`.
    #[must_use]
    pub fn drop_constraint(
        schema: impl Into<String>,
        table: impl Into<String>,
        constraint: Constraint,
        cascade: bool,
    ) -> Self {
        Self::DropConstraint(DropConstraint {
            schema: schema.into(),
            table: table.into(),
            constraint,
            cascade,
        })
    }

    /// `ALTER TABLE ... RENAME CONSTRAINT`.
    #[must_use]
    pub fn rename_constraint(
        schema: impl Into<String>,
        table: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::RenameConstraint(RenameConstraint {
            schema: schema.into(),
            table: table.into(),
            from: from.into(),
            to: to.into(),
        })
    }

    /// `CREATE INDEX`.
    #[must_use]
    pub fn create_index(index: Index) -> Self {
        Self::CreateIndex(CreateIndex {
            index,
            concurrently: false,
        })
    }

    /// `DROP INDEX`.
    #[must_use]
    pub fn drop_index(index: Index, cascade: bool) -> Self {
        Self::DropIndex(DropIndex {
            index,
            concurrently: false,
            cascade,
        })
    }

    /// `CREATE [OR REPLACE] VIEW`.
    #[must_use]
    pub fn create_view(view: View, or_replace: bool) -> Self {
        Self::CreateView(CreateView { view, or_replace })
    }

    /// `DROP [MATERIALIZED] VIEW`.
    #[must_use]
    pub fn drop_view(view: &View, cascade: bool) -> Self {
        Self::DropView(DropView {
            schema: view.schema.clone(),
            name: view.name.clone(),
            materialized: view.materialized,
            cascade,
        })
    }

    /// `CREATE [OR REPLACE] FUNCTION`.
    #[must_use]
    pub fn create_function(function: Function, or_replace: bool) -> Self {
        Self::CreateFunction(CreateFunction {
            function,
            or_replace,
        })
    }

    /// `DROP FUNCTION`.
    #[must_use]
    pub fn drop_function(function: Function, cascade: bool) -> Self {
        Self::DropFunction(DropFunction { function, cascade })
    }

    /// `CREATE TRIGGER`.
    #[must_use]
    pub fn create_trigger(trigger: Trigger) -> Self {
        Self::CreateTrigger(CreateTrigger { trigger })
    }

    /// `DROP TRIGGER`.
    #[must_use]
    pub fn drop_trigger(trigger: Trigger, cascade: bool) -> Self {
        Self::DropTrigger(DropTrigger { trigger, cascade })
    }

    /// Sets `CONCURRENTLY` on index commands; a no-op for other commands.
    #[must_use]
    pub fn concurrently(mut self) -> Self {
        match &mut self {
            Self::CreateIndex(op) => op.concurrently = true,
            Self::DropIndex(op) => op.concurrently = true,
            _ => {}
        }
        self
    }

    /// Returns `true` for drop commands.
    #[must_use]
    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            Self::DropSchema(_)
                | Self::DropTable(_)
                | Self::DropColumn(_)
                | Self::DropConstraint(_)
                | Self::DropIndex(_)
                | Self::DropView(_)
                | Self::DropFunction(_)
                | Self::DropTrigger(_)
        )
    }
}

fn qualified(schema: &str, name: &str) -> String {
    if schema.is_empty() {
        name.to_string()
    } else {
        format!("{schema}.{name}")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSchema(op) => write!(f, "create schema {}", op.name),
            Self::DropSchema(op) => write!(f, "drop schema {}", op.name),
            Self::CreateTable(op) => write!(f, "create table {}", op.table.qualified_name()),
            Self::DropTable(op) => write!(f, "drop table {}", qualified(&op.schema, &op.name)),
            Self::RenameTable(op) => write!(
                f,
                "rename table {} to {}",
                qualified(&op.schema, &op.from),
                op.to
            ),
            Self::AddColumn(op) => write!(
                f,
                "add column {}.{}",
                qualified(&op.schema, &op.table),
                op.column.name
            ),
            Self::AlterColumn(op) => write!(
                f,
                "alter column {}.{}",
                qualified(&op.schema, &op.table),
                op.column.name
            ),
            Self::DropColumn(op) => write!(
                f,
                "drop column {}.{}",
                qualified(&op.schema, &op.table),
                op.column
            ),
            Self::RenameColumn(op) => write!(
                f,
                "rename column {}.{} to {}",
                qualified(&op.schema, &op.table),
                op.from,
                op.to
            ),
            Self::AddConstraint(op) => write!(
                f,
                "add {} {} on {}",
                op.constraint.kind.as_sql().to_ascii_lowercase(),
                op.constraint.name,
                qualified(&op.schema, &op.table)
            ),
            Self::DropConstraint(op) => write!(
                f,
                "drop {} {} on {}",
                op.constraint.kind.as_sql().to_ascii_lowercase(),
                op.constraint.name,
                qualified(&op.schema, &op.table)
            ),
            Self::RenameConstraint(op) => write!(
                f,
                "rename constraint {} on {} to {}",
                op.from,
                qualified(&op.schema, &op.table),
                op.to
            ),
            Self::CreateIndex(op) => write!(
                f,
                "create index {} on {}",
                op.index.name,
                qualified(&op.index.table_schema, &op.index.table_name)
            ),
            Self::DropIndex(op) => write!(
                f,
                "drop index {} on {}",
                op.index.name,
                qualified(&op.index.table_schema, &op.index.table_name)
            ),
            Self::CreateView(op) => {
                write!(f, "create view {}", qualified(&op.view.schema, &op.view.name))
            }
            Self::DropView(op) => write!(f, "drop view {}", qualified(&op.schema, &op.name)),
            Self::CreateFunction(op) => write!(
                f,
                "create {} {}",
                op.function.kind.as_sql().to_ascii_lowercase(),
                qualified(&op.function.schema, &op.function.name)
            ),
            Self::DropFunction(op) => write!(
                f,
                "drop {} {}",
                op.function.kind.as_sql().to_ascii_lowercase(),
                qualified(&op.function.schema, &op.function.name)
            ),
            Self::CreateTrigger(op) => write!(
                f,
                "create trigger {} on {}",
                op.trigger.name,
                qualified(&op.trigger.table_schema, &op.trigger.table_name)
            ),
            Self::DropTrigger(op) => write!(
                f,
                "drop trigger {} on {}",
                op.trigger.name,
                qualified(&op.trigger.table_schema, &op.trigger.table_name)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_summaries() {
        let cmd = Command::add_constraint(
            "public",
            "t2",
            Constraint::foreign_key(["t1_id"], "public", "t1", ["id"]).named("t2_t1_id_fkey"),
        );
        assert_eq!(cmd.to_string(), "add foreign key t2_t1_id_fkey on public.t2");
        assert_eq!(
            Command::drop_table("", "t1", false).to_string(),
            "drop table t1"
        );
    }

    #[test]
    fn test_concurrently_only_touches_indexes() {
        let cmd = Command::create_index(Index::new("i", ["a"])).concurrently();
        assert!(matches!(cmd, Command::CreateIndex(CreateIndex { concurrently: true, .. })));
        let cmd = Command::create_schema("s").concurrently();
        assert_eq!(cmd, Command::create_schema("s"));
    }

    #[test]
    fn test_commands_serialize_with_a_tag() {
        let json = serde_json::to_value(Command::drop_schema("s", true)).unwrap();
        assert_eq!(json["command"], "drop_schema");
        assert_eq!(json["cascade"], true);
    }
}
