//! Assembling a catalog from a live database.
//!
//! An [`Introspector`] reads one kind of entity at a time from a database;
//! how it issues its queries is up to the implementation. [`load_catalog`]
//! fits the records together into a [`Catalog`] through the catalog's
//! get-or-create / store calls, then back-fills the column key flags.

use std::future::Future;

use oxide_ddl::catalog::{
    Catalog, CatalogMetadata, Column, Constraint, Function, Index, Table, Trigger, View,
};
use oxide_ddl::{Dialect, Feature};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};

// ============================================================================
// Records
// ============================================================================

/// A column together with the table or view it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRecord {
    /// Schema of the owning relation.
    pub table_schema: String,
    /// Name of the owning relation.
    pub table_name: String,
    /// The column.
    pub column: Column,
}

/// A constraint together with the table it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRecord {
    /// Schema of the owning table.
    pub table_schema: String,
    /// Name of the owning table.
    pub table_name: String,
    /// The constraint.
    pub constraint: Constraint,
}

// ============================================================================
// Filter
// ============================================================================

/// Restricts what an introspector reads.
///
/// Empty include lists accept everything; an exclusion always wins over an
/// inclusion. Table patterns match either the bare table name or
/// `schema.table`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntrospectFilter {
    /// Schemas to read.
    pub include_schemas: Vec<String>,
    /// Schemas to skip.
    pub exclude_schemas: Vec<String>,
    /// Tables to read.
    pub include_tables: Vec<String>,
    /// Tables to skip.
    pub exclude_tables: Vec<String>,
    /// Read the database's own catalog schemas and tables too.
    pub include_system: bool,
    /// Return records in a deterministic order.
    pub sorted: bool,
}

impl IntrospectFilter {
    /// Creates a filter that accepts every user object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema to the include list.
    #[must_use]
    pub fn include_schema(mut self, schema: impl Into<String>) -> Self {
        self.include_schemas.push(schema.into());
        self
    }

    /// Adds a schema to the exclude list.
    #[must_use]
    pub fn exclude_schema(mut self, schema: impl Into<String>) -> Self {
        self.exclude_schemas.push(schema.into());
        self
    }

    /// Adds a table pattern to the include list.
    #[must_use]
    pub fn include_table(mut self, table: impl Into<String>) -> Self {
        self.include_tables.push(table.into());
        self
    }

    /// Adds a table pattern to the exclude list.
    #[must_use]
    pub fn exclude_table(mut self, table: impl Into<String>) -> Self {
        self.exclude_tables.push(table.into());
        self
    }

    /// Includes system schemas and tables.
    #[must_use]
    pub const fn with_system(mut self, enabled: bool) -> Self {
        self.include_system = enabled;
        self
    }

    /// Requests a deterministic record order.
    #[must_use]
    pub const fn sorted(mut self, enabled: bool) -> Self {
        self.sorted = enabled;
        self
    }

    /// Whether objects of `schema` are read.
    #[must_use]
    pub fn accepts_schema(&self, dialect: Dialect, schema: &str) -> bool {
        if !self.include_system && is_system_schema(dialect, schema) {
            return false;
        }
        if self.exclude_schemas.iter().any(|s| s == schema) {
            return false;
        }
        self.include_schemas.is_empty() || self.include_schemas.iter().any(|s| s == schema)
    }

    /// Whether the relation `schema.table` is read.
    #[must_use]
    pub fn accepts_table(&self, dialect: Dialect, schema: &str, table: &str) -> bool {
        if !self.accepts_schema(dialect, schema) {
            return false;
        }
        if !self.include_system && is_system_table(dialect, table) {
            return false;
        }
        let matches = |pattern: &String| {
            pattern == table
                || pattern
                    .split_once('.')
                    .is_some_and(|(s, t)| s == schema && t == table)
        };
        if self.exclude_tables.iter().any(matches) {
            return false;
        }
        self.include_tables.is_empty() || self.include_tables.iter().any(matches)
    }
}

/// Whether `schema` holds the database's own catalog.
#[must_use]
pub fn is_system_schema(dialect: Dialect, schema: &str) -> bool {
    match dialect {
        Dialect::Postgres => {
            schema == "information_schema"
                || schema == "pg_catalog"
                || schema.starts_with("pg_toast")
                || schema.starts_with("pg_temp")
        }
        Dialect::Mysql => matches!(
            schema,
            "mysql" | "information_schema" | "performance_schema" | "sys"
        ),
        Dialect::Sqlite => schema == "temp",
    }
}

/// Whether `table` is one of the database's internal tables.
#[must_use]
pub fn is_system_table(dialect: Dialect, table: &str) -> bool {
    match dialect {
        Dialect::Sqlite => table.starts_with("sqlite_"),
        Dialect::Postgres | Dialect::Mysql => false,
    }
}

/// Parses a server version string into a single comparable number, using
/// each server's own convention: `16.2` is `160002` on PostgreSQL, `8.0.36`
/// is `80036` on MySQL and `3.45.1` is `3045001` on SQLite.
#[must_use]
pub fn version_number(dialect: Dialect, version: &str) -> u32 {
    let mut parts = version
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('.')
        .map(|part| {
            part.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse::<u32>()
                .unwrap_or(0)
        });
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    match dialect {
        Dialect::Postgres => major * 10_000 + minor,
        Dialect::Mysql => major * 10_000 + minor * 100 + patch,
        Dialect::Sqlite => major * 1_000_000 + minor * 1_000 + patch,
    }
}

// ============================================================================
// Introspector
// ============================================================================

/// Reads the structure of a live database, one entity kind per call.
///
/// Tables and views come back without children; their columns,
/// constraints, indexes and triggers are read separately and attached by
/// [`load_catalog`]. Implementations may apply the filter in their queries;
/// [`load_catalog`] applies it again to whatever comes back.
pub trait Introspector {
    /// Server version string.
    fn version(&self) -> impl Future<Output = Result<String>> + Send;

    /// Name of the connected database.
    fn database_name(&self) -> impl Future<Output = Result<String>> + Send;

    /// Schema unqualified names resolve in.
    fn current_schema(&self) -> impl Future<Output = Result<String>> + Send;

    /// Installed extensions.
    fn extensions(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Tables, including virtual tables.
    fn tables(&self, filter: &IntrospectFilter)
        -> impl Future<Output = Result<Vec<Table>>> + Send;

    /// Columns of tables and views, in ordinal order per relation.
    fn columns(
        &self,
        filter: &IntrospectFilter,
    ) -> impl Future<Output = Result<Vec<ColumnRecord>>> + Send;

    /// Table constraints.
    fn constraints(
        &self,
        filter: &IntrospectFilter,
    ) -> impl Future<Output = Result<Vec<ConstraintRecord>>> + Send;

    /// Indexes of tables and materialized views that do not back a
    /// constraint.
    fn indexes(&self, filter: &IntrospectFilter)
        -> impl Future<Output = Result<Vec<Index>>> + Send;

    /// Triggers of tables and materialized views.
    fn triggers(
        &self,
        filter: &IntrospectFilter,
    ) -> impl Future<Output = Result<Vec<Trigger>>> + Send;

    /// Views and materialized views.
    fn views(&self, filter: &IntrospectFilter) -> impl Future<Output = Result<Vec<View>>> + Send;

    /// Functions and procedures.
    fn functions(
        &self,
        filter: &IntrospectFilter,
    ) -> impl Future<Output = Result<Vec<Function>>> + Send;
}

// ============================================================================
// Loading
// ============================================================================

/// Reads everything `filter` accepts into a catalog.
pub async fn load_catalog<I: Introspector>(
    dialect: Dialect,
    introspector: &I,
    filter: &IntrospectFilter,
) -> Result<Catalog> {
    let version = introspector.version().await?;
    let metadata = CatalogMetadata {
        version_num: version_number(dialect, &version),
        version,
        database: introspector.database_name().await?,
        current_schema: introspector.current_schema().await?,
        extensions: introspector.extensions().await?,
    };
    debug!(
        dialect = %dialect,
        version = %metadata.version,
        database = %metadata.database,
        current_schema = %metadata.current_schema,
        "Introspecting database"
    );

    let mut loader = Loader {
        dialect,
        filter,
        current_schema: metadata.current_schema.clone(),
        catalog: Catalog::new(dialect).with_metadata(metadata),
    };

    let mut tables = introspector.tables(filter).await?;
    let mut views = introspector.views(filter).await?;
    let mut columns = introspector.columns(filter).await?;
    let mut constraints = introspector.constraints(filter).await?;
    let mut indexes = introspector.indexes(filter).await?;
    let mut triggers = introspector.triggers(filter).await?;
    let mut functions = introspector.functions(filter).await?;

    if filter.sorted {
        tables.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
        views.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
        // Stable, so columns keep their ordinal order within a relation.
        columns.sort_by(|a, b| {
            (&a.table_schema, &a.table_name).cmp(&(&b.table_schema, &b.table_name))
        });
        constraints.sort_by(|a, b| {
            (&a.table_schema, &a.table_name, &a.constraint.name).cmp(&(
                &b.table_schema,
                &b.table_name,
                &b.constraint.name,
            ))
        });
        indexes.sort_by(|a, b| {
            (&a.table_schema, &a.table_name, &a.name).cmp(&(&b.table_schema, &b.table_name, &b.name))
        });
        triggers.sort_by(|a, b| {
            (&a.table_schema, &a.table_name, &a.name).cmp(&(&b.table_schema, &b.table_name, &b.name))
        });
        functions.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
    }

    debug!(
        tables = tables.len(),
        views = views.len(),
        columns = columns.len(),
        constraints = constraints.len(),
        indexes = indexes.len(),
        triggers = triggers.len(),
        functions = functions.len(),
        "Introspected records"
    );

    for table in tables {
        loader.table(table)?;
    }
    for view in views {
        loader.view(view);
    }
    for record in columns {
        loader.column(record)?;
    }
    for record in constraints {
        loader.constraint(record)?;
    }
    for index in indexes {
        loader.index(index)?;
    }
    for trigger in triggers {
        loader.trigger(trigger)?;
    }
    for function in functions {
        loader.function(function)?;
    }

    let mut catalog = loader.catalog;
    catalog.backfill_key_flags();
    catalog.validate()?;

    info!(
        dialect = %dialect,
        schemas = catalog.schemas.len(),
        tables = catalog.tables().count(),
        views = catalog.schemas.iter().map(|s| s.views.len()).sum::<usize>(),
        functions = catalog.schemas.iter().map(|s| s.functions.len()).sum::<usize>(),
        "Catalog loaded"
    );

    Ok(catalog)
}

/// What a child record attaches to.
enum Relation {
    Table,
    View,
}

struct Loader<'f> {
    dialect: Dialect,
    filter: &'f IntrospectFilter,
    current_schema: String,
    catalog: Catalog,
}

impl Loader<'_> {
    /// Maps the introspected schema name onto the catalog's: the current
    /// database of MySQL and SQLite is the empty default schema.
    fn schema_name(&self, schema: &str) -> String {
        if self.dialect.default_schema().is_empty()
            && (schema == self.current_schema
                || (!self.dialect.supports(Feature::Schemas) && schema == "main"))
        {
            String::new()
        } else {
            schema.to_string()
        }
    }

    fn accepts(&self, schema: &str, table: &str) -> bool {
        self.filter.accepts_table(self.dialect, schema, table)
    }

    fn relation(&self, schema: &str, name: &str) -> Option<Relation> {
        let schema = self.catalog.schema(schema)?;
        if schema.table(name).is_some() {
            Some(Relation::Table)
        } else if schema.view(name).is_some() {
            Some(Relation::View)
        } else {
            None
        }
    }

    /// Fetches a table, lets `update` mutate it and writes it back.
    fn with_table(
        &mut self,
        schema: &str,
        name: &str,
        update: impl FnOnce(&mut Table),
    ) -> Result<()> {
        let (mut owner, schema_pos) = self.catalog.get_or_create_schema(schema);
        let (mut table, table_pos) = owner.get_or_create_table(name);
        update(&mut table);
        owner.store_table(table_pos, table)?;
        self.catalog.store_schema(schema_pos, owner)?;
        Ok(())
    }

    /// Fetches a view, lets `update` mutate it and writes it back.
    fn with_view(&mut self, schema: &str, name: &str, update: impl FnOnce(&mut View)) -> Result<()> {
        let (mut owner, schema_pos) = self.catalog.get_or_create_schema(schema);
        let (mut view, view_pos) = owner.get_or_create_view(name);
        update(&mut view);
        owner.store_view(view_pos, view)?;
        self.catalog.store_schema(schema_pos, owner)?;
        Ok(())
    }

    fn table(&mut self, table: Table) -> Result<()> {
        let schema = self.schema_name(&table.schema);
        if !self.accepts(&table.schema, &table.name) {
            return Ok(());
        }
        let name = table.name.clone();
        self.with_table(&schema, &name, |target| {
            target.virtual_table = table.virtual_table;
            for column in table.columns.into_vec() {
                target.add_column(column);
            }
            for constraint in table.constraints.into_vec() {
                target.add_constraint(constraint);
            }
            for index in table.indexes.into_vec() {
                target.add_index(index);
            }
            for trigger in table.triggers.into_vec() {
                target.add_trigger(trigger);
            }
        })
    }

    fn view(&mut self, mut view: View) {
        if !self.accepts(&view.schema, &view.name) {
            return;
        }
        view.schema = self.schema_name(&view.schema);
        self.catalog.add_view(view);
    }

    fn column(&mut self, record: ColumnRecord) -> Result<()> {
        if !self.accepts(&record.table_schema, &record.table_name) {
            return Ok(());
        }
        let schema = self.schema_name(&record.table_schema);
        let column = record.column;
        match self.relation(&schema, &record.table_name) {
            Some(Relation::View) => self.with_view(&schema, &record.table_name, |view| {
                if !view.fields.contains(&column.name) {
                    view.fields.push(column.name);
                }
            }),
            Some(Relation::Table) | None => {
                self.with_table(&schema, &record.table_name, |table| {
                    table.add_column(column);
                })
            }
        }
    }

    fn constraint(&mut self, record: ConstraintRecord) -> Result<()> {
        if !self.accepts(&record.table_schema, &record.table_name) {
            return Ok(());
        }
        let schema = self.schema_name(&record.table_schema);
        let mut constraint = record.constraint;
        if let Some(target) = constraint.references.as_mut() {
            target.schema = self.schema_name(&target.schema);
        }
        match self.relation(&schema, &record.table_name) {
            Some(Relation::Table) => self.with_table(&schema, &record.table_name, |table| {
                table.add_constraint(constraint);
            }),
            _ => Err(MigrateError::Introspection(format!(
                "constraint {} on unknown table {}.{}",
                constraint.name, record.table_schema, record.table_name
            ))),
        }
    }

    fn index(&mut self, index: Index) -> Result<()> {
        if !self.accepts(&index.table_schema, &index.table_name) {
            return Ok(());
        }
        let schema = self.schema_name(&index.table_schema);
        let owner = index.table_name.clone();
        match self.relation(&schema, &owner) {
            Some(Relation::Table) => self.with_table(&schema, &owner, |table| {
                table.add_index(index);
            }),
            Some(Relation::View) => self.with_view(&schema, &owner, |view| {
                view.add_index(index);
            }),
            None => Err(MigrateError::Introspection(format!(
                "index {} on unknown relation {}.{}",
                index.name, index.table_schema, index.table_name
            ))),
        }
    }

    fn trigger(&mut self, trigger: Trigger) -> Result<()> {
        if !self.accepts(&trigger.table_schema, &trigger.table_name) {
            return Ok(());
        }
        let schema = self.schema_name(&trigger.table_schema);
        let owner = trigger.table_name.clone();
        match self.relation(&schema, &owner) {
            Some(Relation::Table) => self.with_table(&schema, &owner, |table| {
                table.add_trigger(trigger);
            }),
            Some(Relation::View) => self.with_view(&schema, &owner, |view| {
                view.add_trigger(trigger);
            }),
            None => Err(MigrateError::Introspection(format!(
                "trigger {} on unknown relation {}.{}",
                trigger.name, trigger.table_schema, trigger.table_name
            ))),
        }
    }

    fn function(&mut self, mut function: Function) -> Result<()> {
        let schema = if function.schema.is_empty() {
            self.current_schema.clone()
        } else {
            function.schema.clone()
        };
        if !self.filter.accepts_schema(self.dialect, &schema) {
            return Ok(());
        }
        function.schema = self.schema_name(&schema);
        self.catalog.add_function(function)?;
        Ok(())
    }
}
