//! # oxide-ddl
//!
//! A dialect-aware database catalog model, DDL renderer and migration diff
//! engine for PostgreSQL, MySQL and SQLite.
//!
//! This crate provides:
//! - An in-memory catalog (schemas, tables, columns, constraints, indexes,
//!   views, functions, triggers) with self-healing name caches
//! - A renderer that turns catalog entities and schema changes into DDL,
//!   refusing anything the target dialect cannot express
//! - A diff engine that compares two catalogs and returns a phased,
//!   dependency-ordered migration plan
//!
//! ## Building a catalog
//!
//! ```rust
//! use oxide_ddl::catalog::{Catalog, Column, Constraint, Table};
//! use oxide_ddl::Dialect;
//!
//! let mut catalog = Catalog::new(Dialect::Postgres);
//! catalog.add_table(
//!     Table::new("", "customer")
//!         .column(Column::new("id", "bigint").not_null())
//!         .column(Column::new("email", "text").not_null())
//!         .constraint(Constraint::primary_key(["id"]))
//!         .constraint(Constraint::unique(["email"])),
//! );
//! assert!(catalog.validate().is_ok());
//! ```
//!
//! ## Planning a migration
//!
//! ```rust
//! use oxide_ddl::catalog::{Catalog, Column, Table};
//! use oxide_ddl::{diff, Dialect, Mode};
//!
//! let mut got = Catalog::new(Dialect::Sqlite);
//! got.add_table(Table::new("", "t").column(Column::new("a", "INTEGER")));
//!
//! let mut want = got.clone();
//! want.add_table(
//!     Table::new("", "t")
//!         .column(Column::new("a", "INTEGER"))
//!         .column(Column::new("b", "TEXT")),
//! );
//!
//! let plan = diff(&got, &want, Mode::default()).unwrap();
//! assert_eq!(plan.render().unwrap(), "ALTER TABLE t ADD COLUMN b TEXT;\n");
//! ```
//!
//! Every unsupported combination of dialect and feature is an error, never a
//! silent downgrade:
//!
//! ```rust
//! use oxide_ddl::migrate::Command;
//! use oxide_ddl::{Dialect, Renderer};
//!
//! let err = Renderer::new(Dialect::Sqlite)
//!     .render(&Command::create_schema("sales"))
//!     .unwrap_err();
//! assert_eq!(err.to_string(), "sqlite does not support schemas");
//! ```

pub mod catalog;
pub mod dialect;
pub mod error;
pub mod ident;
pub mod migrate;
pub mod normalize;
pub mod render;
pub mod tags;

pub use catalog::Catalog;
pub use dialect::{Dialect, Feature};
pub use error::{Result, SchemaError};
pub use migrate::{diff, Command, Mode, Phase, Plan};
pub use render::Renderer;
