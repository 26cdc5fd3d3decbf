//! Dialect-aware DDL rendering.
//!
//! A [`Renderer`] is bound to one [`Dialect`] and turns a [`Command`] into
//! the statements that carry it out. Statements are returned without a
//! trailing terminator; [`script`] joins them into an executable script.
//!
//! Every renderer checks the dialect's [`Feature`] table before emitting
//! dialect-specific syntax and fails with
//! [`SchemaError::Unsupported`](crate::SchemaError::Unsupported) rather than
//! emit something the database would reject or silently ignore.
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::catalog::{Column, Constraint, Table};
//! use oxide_ddl::migrate::Command;
//! use oxide_ddl::render::Renderer;
//! use oxide_ddl::Dialect;
//!
//! let table = Table::new("", "actor")
//!     .column(Column::new("actor_id", "INTEGER"))
//!     .column(Column::new("first_name", "TEXT").not_null())
//!     .constraint(Constraint::primary_key(["actor_id"]));
//!
//! let sql = Renderer::new(Dialect::Sqlite)
//!     .render(&Command::create_table(table))
//!     .unwrap();
//! assert_eq!(
//!     sql,
//!     vec!["CREATE TABLE actor (\n    actor_id INTEGER PRIMARY KEY,\n    first_name TEXT NOT NULL\n)"]
//! );
//! ```

mod constraint;
mod index;
mod routine;
mod schema;
mod table;
mod view;

use crate::dialect::{Dialect, Feature};
use crate::error::{Result, SchemaError};
use crate::ident::{quote_identifier, quote_list, quote_qualified};
use crate::migrate::Command;

/// Renders commands to SQL for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderer {
    dialect: Dialect,
}

/// What a `CASCADE` modifier is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropTarget {
    Schema,
    Table,
    View,
    Column,
    Constraint,
    Index,
    Function,
    Trigger,
}

impl DropTarget {
    const fn noun(self) -> &'static str {
        match self {
            Self::Schema => "schemas",
            Self::Table => "tables",
            Self::View => "views",
            Self::Column => "columns",
            Self::Constraint => "constraints",
            Self::Index => "indexes",
            Self::Function => "functions",
            Self::Trigger => "triggers",
        }
    }
}

impl Renderer {
    /// Creates a renderer for `dialect`.
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// The dialect being rendered for.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Renders one command to its statements.
    pub fn render(&self, command: &Command) -> Result<Vec<String>> {
        match command {
            Command::CreateSchema(op) => self.create_schema(op).map(|s| vec![s]),
            Command::DropSchema(op) => self.drop_schema(op).map(|s| vec![s]),
            Command::CreateTable(op) => self.create_table(&op.table),
            Command::DropTable(op) => self.drop_table(op).map(|s| vec![s]),
            Command::RenameTable(op) => Ok(vec![self.rename_table(op)]),
            Command::AddColumn(op) => self.add_column(op).map(|s| vec![s]),
            Command::AlterColumn(op) => self.alter_column(op),
            Command::DropColumn(op) => self.drop_column(op).map(|s| vec![s]),
            Command::RenameColumn(op) => Ok(vec![self.rename_column(op)]),
            Command::AddConstraint(op) => self.add_constraint(op).map(|s| vec![s]),
            Command::DropConstraint(op) => self.drop_constraint(op).map(|s| vec![s]),
            Command::RenameConstraint(op) => self.rename_constraint(op).map(|s| vec![s]),
            Command::CreateIndex(op) => self.create_index(&op.index, op.concurrently).map(|s| vec![s]),
            Command::DropIndex(op) => self.drop_index(op).map(|s| vec![s]),
            Command::CreateView(op) => self.create_view(op).map(|s| vec![s]),
            Command::DropView(op) => self.drop_view(op).map(|s| vec![s]),
            Command::CreateFunction(op) => self.create_function(op).map(|s| vec![s]),
            Command::DropFunction(op) => self.drop_function(op).map(|s| vec![s]),
            Command::CreateTrigger(op) => Ok(vec![self.create_trigger(&op.trigger)]),
            Command::DropTrigger(op) => self.drop_trigger(op).map(|s| vec![s]),
        }
    }

    /// Renders several commands, concatenating their statements.
    pub fn render_all<'a>(&self, commands: impl IntoIterator<Item = &'a Command>) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for command in commands {
            statements.extend(self.render(command)?);
        }
        Ok(statements)
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    fn require(&self, feature: Feature) -> Result<()> {
        self.dialect.require(feature)
    }

    fn unsupported(&self, feature: impl Into<String>) -> SchemaError {
        SchemaError::unsupported(self.dialect, feature)
    }

    fn ident(&self, name: &str) -> String {
        quote_identifier(self.dialect, name)
    }

    fn qualified(&self, schema: &str, name: &str) -> String {
        quote_qualified(self.dialect, schema, name)
    }

    fn ident_list(&self, names: &[String]) -> String {
        quote_list(self.dialect, names)
    }

    /// The ` CASCADE` suffix, or an error when the dialect cannot cascade
    /// drops of `target`.
    fn cascade(&self, cascade: bool, target: DropTarget) -> Result<&'static str> {
        if !cascade {
            return Ok("");
        }
        self.require(Feature::DropCascade)?;
        if self.dialect == Dialect::Mysql && !matches!(target, DropTarget::Table | DropTarget::View) {
            return Err(self.unsupported(format!("CASCADE when dropping {}", target.noun())));
        }
        Ok(" CASCADE")
    }
}

/// Strips surrounding whitespace and one trailing `;` from raw source text.
fn trim_statement(source: &str) -> &str {
    let trimmed = source.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

/// Joins statements into a script: each statement terminated with `;` and
/// followed by a blank line.
#[must_use]
pub fn script<S: AsRef<str>>(statements: &[S]) -> String {
    let mut out = String::new();
    for (i, statement) in statements.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(statement.as_ref());
        out.push_str(";\n");
    }
    out
}
