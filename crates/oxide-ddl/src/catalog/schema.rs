//! Schemas: named containers of tables, views and functions.

use serde::{Deserialize, Serialize};

use super::cache::{Named, NamedList, OverloadList};
use super::function::Function;
use super::table::Table;
use super::view::View;
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// A schema.
///
/// Tables and views live in separate lists. Functions may be overloaded, so
/// a name lookup returns every matching position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name. Empty for the connection's current database on MySQL
    /// and for SQLite's single namespace.
    pub name: String,
    /// Tables.
    #[serde(default)]
    pub tables: NamedList<Table>,
    /// Views.
    #[serde(default)]
    pub views: NamedList<View>,
    /// Functions and procedures.
    #[serde(default)]
    pub functions: OverloadList<Function>,
}

impl Named for Schema {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: NamedList::new(),
            views: NamedList::new(),
            functions: OverloadList::new(),
        }
    }

    /// Returns a copy of the table named `name` and its position, appending
    /// an empty one first when missing.
    pub fn get_or_create_table(&mut self, name: &str) -> (Table, usize) {
        let schema = self.name.clone();
        self.tables
            .get_or_create_with(name, |n| Table::new(schema, n))
    }

    /// Writes a table back at `pos`.
    pub fn store_table(&mut self, pos: usize, mut table: Table) -> Result<()> {
        table.set_schema(&self.name);
        self.tables.store(pos, table)
    }

    /// Upserts a table by name, moving it into this schema.
    pub fn add_table(&mut self, mut table: Table) -> usize {
        table.set_schema(&self.name);
        self.tables.upsert(table)
    }

    /// Returns a copy of the view named `name` and its position, appending
    /// an empty one first when missing.
    pub fn get_or_create_view(&mut self, name: &str) -> (View, usize) {
        let schema = self.name.clone();
        self.views.get_or_create_with(name, |n| {
            let mut view = View::new(n, String::new());
            view.schema = schema;
            view
        })
    }

    /// Writes a view back at `pos`.
    pub fn store_view(&mut self, pos: usize, mut view: View) -> Result<()> {
        view.set_schema(&self.name);
        self.views.store(pos, view)
    }

    /// Upserts a view by name, moving it into this schema.
    pub fn add_view(&mut self, mut view: View) -> usize {
        view.set_schema(&self.name);
        self.views.upsert(view)
    }

    /// Upserts a function by name and call signature.
    ///
    /// A schema named in the function source must match this schema.
    pub fn add_function(&mut self, dialect: Dialect, mut function: Function) -> Result<usize> {
        if !function.schema.is_empty() && function.schema != self.name {
            return Err(SchemaError::malformed(
                format!("function {}", function.name),
                format!(
                    "declared in schema {:?} but added to {:?}",
                    function.schema, self.name
                ),
            ));
        }
        function.schema = self.name.clone();
        let existing = self
            .functions
            .cached_positions(&function.name)
            .into_iter()
            .find(|&pos| {
                self.functions
                    .get(pos)
                    .is_some_and(|f| f.same_signature(&function, dialect))
            });
        match existing {
            Some(pos) => {
                self.functions.store(pos, function)?;
                Ok(pos)
            }
            None => Ok(self.functions.append(function)),
        }
    }

    /// Positions of every overload named `name`.
    pub fn function_positions(&mut self, name: &str) -> Vec<usize> {
        self.functions.cached_positions(name)
    }

    /// Returns the table named `name`.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get_by_name(name)
    }

    /// Returns the view named `name`.
    #[must_use]
    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get_by_name(name)
    }

    /// Checks every entity in the schema.
    pub fn validate(&self) -> Result<()> {
        for table in &self.tables {
            table.validate()?;
        }
        for view in &self.views {
            view.validate()?;
        }
        for function in &self.functions {
            function.validate()?;
        }
        Ok(())
    }
}
