//! Migration planning.
//!
//! [`diff`] compares two catalogs of the same dialect and returns a
//! [`Plan`]: [`Command`]s grouped into [`Phase`]s that respect the
//! dependencies between tables, foreign keys, views, functions and
//! triggers. The plan renders to SQL through
//! [`Renderer`](crate::render::Renderer).
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::catalog::{Catalog, Column, Constraint, Table};
//! use oxide_ddl::migrate::{diff, Mode};
//! use oxide_ddl::Dialect;
//!
//! let got = Catalog::new(Dialect::Postgres);
//! let mut want = Catalog::new(Dialect::Postgres);
//! want.add_table(
//!     Table::new("", "t1")
//!         .column(Column::new("id", "integer").not_null())
//!         .constraint(Constraint::primary_key(["id"])),
//! );
//!
//! let plan = diff(&got, &want, Mode::default()).unwrap();
//! assert_eq!(
//!     plan.statements().unwrap(),
//!     vec!["CREATE TABLE public.t1 (\n    id integer NOT NULL,\n    CONSTRAINT t1_id_pkey PRIMARY KEY (id)\n)"]
//! );
//! ```

mod command;
mod diff;
mod mode;
mod plan;

pub use command::{
    AddColumn, AddConstraint, AlterColumn, ColumnChange, Command, CreateFunction, CreateIndex,
    CreateSchema, CreateTable, CreateTrigger, CreateView, DropColumn, DropConstraint, DropFunction,
    DropIndex, DropSchema, DropTable, DropTrigger, DropView, RenameColumn, RenameConstraint,
    RenameTable,
};
pub use diff::diff;
pub use mode::Mode;
pub use plan::{Phase, Plan};
