//! Applying `oxide-ddl` migration plans to live databases.
//!
//! `oxide-ddl` computes what has to change; this crate does the I/O around
//! it:
//! - **Executor** - runs a [`Plan`](oxide_ddl::Plan) statement by statement
//!   over any sqlx connection, inside one transaction where the dialect
//!   allows it
//! - **Introspection** - the [`Introspector`](introspect::Introspector)
//!   trait and [`load_catalog`](introspect::load_catalog), which assembles
//!   its records into a catalog
//! - **Snapshots** - catalogs saved as JSON, so the next run can diff
//!   against what was applied last time
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_ddl::catalog::{Catalog, Column, Table};
//! use oxide_ddl::{Dialect, Mode};
//! use oxide_ddl_migrate::prelude::*;
//! use sqlx::{Connection, SqliteConnection};
//!
//! # async fn run() -> oxide_ddl_migrate::Result<()> {
//! let mut want = Catalog::new(Dialect::Sqlite);
//! want.add_table(Table::new("", "note").column(Column::new("body", "TEXT")));
//!
//! let previous = Snapshot::load_optional("schema.json")
//!     .await?
//!     .unwrap_or_else(|| Snapshot::new(Catalog::new(Dialect::Sqlite)));
//! let plan = previous.plan_to(&want, Mode::default())?;
//!
//! let mut conn = SqliteConnection::connect("sqlite://app.db").await?;
//! PlanExecutor::new().execute(&mut conn, &plan).await?;
//! Snapshot::new(want).save("schema.json").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod introspect;
pub mod snapshot;

pub use error::{MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{ExecutionReport, PlanExecutor};
    pub use crate::introspect::{
        load_catalog, ColumnRecord, ConstraintRecord, IntrospectFilter, Introspector,
    };
    pub use crate::snapshot::Snapshot;
}
