//! The in-memory catalog: Catalog → Schema → {Table, View, Function} →
//! {Column, Constraint, Index, Trigger}.
//!
//! Every level owns its children exclusively and keeps them in
//! order-preserving [`NamedList`]s, whose position caches make the
//! get-or-create / mutate / store cycle used during loading cheap.
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::catalog::{Catalog, Column, Constraint, Table};
//! use oxide_ddl::Dialect;
//!
//! let mut catalog = Catalog::new(Dialect::Sqlite);
//! catalog.add_table(
//!     Table::new("", "actor")
//!         .column(Column::new("actor_id", "INTEGER"))
//!         .column(Column::new("first_name", "TEXT").not_null())
//!         .constraint(Constraint::primary_key(["actor_id"])),
//! );
//! assert!(catalog.validate().is_ok());
//! assert!(catalog.table("", "actor").unwrap().get_column("actor_id").unwrap().is_primary_key);
//! ```

mod cache;
mod column;
mod constraint;
mod function;
mod index;
mod schema;
mod table;
mod trigger;
mod view;

pub use cache::{Named, NamedList, OverloadList};
pub use column::{Column, GeneratedColumn, IdentityKind};
pub(crate) use column::same_generated;
pub use constraint::{
    Constraint, ConstraintKind, Exclusion, ExclusionElement, ForeignKeyTarget, ReferentialAction,
};
pub use function::{ArgMode, Function, FunctionArg, RoutineKind};
pub use index::{Index, IndexMethod, IndexPart};
pub use schema::Schema;
pub use table::{Table, VirtualTable};
pub use trigger::Trigger;
pub use view::View;

use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, Feature};
use crate::error::{Result, SchemaError};

/// Server identity recorded alongside an introspected catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    /// Server version string, as reported.
    pub version: String,
    /// Numeric server version, e.g. `160002`.
    #[serde(default)]
    pub version_num: u32,
    /// Database name.
    #[serde(default)]
    pub database: String,
    /// Schema the connection resolves unqualified names in.
    #[serde(default)]
    pub current_schema: String,
    /// Installed extensions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

/// Root of a structural snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Dialect the catalog is expressed in.
    pub dialect: Dialect,
    /// Server metadata, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogMetadata>,
    /// Schemas, in order.
    #[serde(default)]
    pub schemas: NamedList<Schema>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            metadata: None,
            schemas: NamedList::new(),
        }
    }

    /// Attaches server metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: CatalogMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Resolves an empty schema name to the dialect default.
    fn resolve_schema<'a>(&self, name: &'a str) -> &'a str {
        if name.is_empty() {
            self.dialect.default_schema()
        } else {
            name
        }
    }

    /// Returns a copy of the schema named `name` and its position, appending
    /// an empty one first when missing.
    pub fn get_or_create_schema(&mut self, name: &str) -> (Schema, usize) {
        let name = self.resolve_schema(name).to_string();
        self.schemas.get_or_create_with(&name, |n| Schema::new(n))
    }

    /// Writes a schema back at `pos`.
    pub fn store_schema(&mut self, pos: usize, schema: Schema) -> Result<()> {
        self.schemas.store(pos, schema)
    }

    /// Upserts a schema by name.
    pub fn add_schema(&mut self, schema: Schema) -> usize {
        self.schemas.upsert(schema)
    }

    /// Position of the schema named `name`.
    pub fn schema_position(&mut self, name: &str) -> Option<usize> {
        let name = self.resolve_schema(name).to_string();
        self.schemas.cached_position(&name)
    }

    /// Rebuilds the schema cache.
    pub fn refresh_cache(&mut self) {
        self.schemas.refresh_cache();
    }

    /// Adds a table to the schema it names (the default schema when empty),
    /// creating the schema if needed, and back-fills its key flags.
    pub fn add_table(&mut self, mut table: Table) -> usize {
        table.backfill_key_flags();
        let (mut schema, pos) = self.get_or_create_schema(&table.schema);
        let table_pos = schema.add_table(table);
        self.put_schema(pos, schema);
        table_pos
    }

    /// Adds a view to the schema it names, creating the schema if needed.
    pub fn add_view(&mut self, view: View) -> usize {
        let (mut schema, pos) = self.get_or_create_schema(&view.schema);
        let view_pos = schema.add_view(view);
        self.put_schema(pos, schema);
        view_pos
    }

    /// Adds a function to the schema named in its source, creating the
    /// schema if needed.
    pub fn add_function(&mut self, function: Function) -> Result<usize> {
        let (mut schema, pos) = self.get_or_create_schema(&function.schema);
        let function_pos = schema.add_function(self.dialect, function)?;
        self.schemas.store(pos, schema)?;
        Ok(function_pos)
    }

    // `pos` comes straight from `get_or_create_schema`, so the store cannot
    // miss.
    fn put_schema(&mut self, pos: usize, schema: Schema) {
        if let Err(err) = self.schemas.store(pos, schema) {
            tracing::warn!(error = %err, "schema write-back failed");
        }
    }

    /// Returns the schema named `name` (the default schema when empty).
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get_by_name(self.resolve_schema(name))
    }

    /// Returns a table by schema and name.
    #[must_use]
    pub fn table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.schema(schema).and_then(|s| s.table(name))
    }

    /// Returns a view by schema and name.
    #[must_use]
    pub fn view(&self, schema: &str, name: &str) -> Option<&View> {
        self.schema(schema).and_then(|s| s.view(name))
    }

    /// Iterates over every table of every schema.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.schemas.iter().flat_map(|s| s.tables.iter())
    }

    /// Runs the key-flag back-fill on every table.
    pub fn backfill_key_flags(&mut self) {
        self.schemas.modify_all(|schema| {
            schema.tables.modify_all(Table::backfill_key_flags);
        });
    }

    /// Checks every entity, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        for schema in &self.schemas {
            if schema.name.is_empty() && !self.dialect.default_schema().is_empty() {
                return Err(SchemaError::malformed("catalog", "schema with an empty name"));
            }
            if !schema.name.is_empty() && !self.dialect.supports(Feature::Schemas) {
                return Err(SchemaError::unsupported(
                    self.dialect,
                    format!("{} (schema {:?})", Feature::Schemas.description(), schema.name),
                ));
            }
            schema.validate()?;
        }
        Ok(())
    }

    /// Returns `true` when the catalog holds no tables, views or functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas
            .iter()
            .all(|s| s.tables.is_empty() && s.views.is_empty() && s.functions.is_empty())
    }
}
