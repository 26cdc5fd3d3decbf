//! DDL features whose availability differs between dialects.

/// A DDL feature gated by [`Dialect::supports`](super::Dialect::supports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Schemas as a namespace level (`CREATE SCHEMA`).
    Schemas,
    /// `DEFERRABLE` / `INITIALLY DEFERRED` constraints.
    DeferrableConstraints,
    /// `GENERATED ... AS IDENTITY` columns.
    IdentityColumns,
    /// `AUTO_INCREMENT` / `AUTOINCREMENT` columns.
    AutoIncrement,
    /// `GENERATED ALWAYS AS (...) STORED` columns.
    StoredGeneratedColumns,
    /// `GENERATED ALWAYS AS (...) VIRTUAL` columns.
    VirtualGeneratedColumns,
    /// `CREATE INDEX CONCURRENTLY`.
    IndexConcurrently,
    /// `ALTER TABLE ... RENAME CONSTRAINT`.
    RenameConstraint,
    /// Altering a column after creation.
    AlterColumn,
    /// `ALTER TABLE ... ADD CONSTRAINT`.
    AddConstraint,
    /// `ALTER TABLE ... DROP CONSTRAINT`.
    DropConstraint,
    /// `INCLUDE (...)` non-key index columns.
    IncludeColumns,
    /// Partial indexes (`WHERE` predicate).
    PartialIndexes,
    /// Explicit index methods (`USING ...`).
    IndexMethods,
    /// `EXCLUDE` constraints.
    ExcludeConstraints,
    /// `NOT VALID` constraints.
    NotValidConstraints,
    /// `NOT ENFORCED` check constraints.
    NotEnforcedConstraints,
    /// `CREATE MATERIALIZED VIEW`.
    MaterializedViews,
    /// `CREATE OR REPLACE VIEW`.
    CreateOrReplaceView,
    /// `CREATE OR REPLACE FUNCTION`.
    CreateOrReplaceFunction,
    /// Stored functions.
    StoredFunctions,
    /// `DROP ... CASCADE`.
    DropCascade,
    /// `ON UPDATE CURRENT_TIMESTAMP` columns.
    OnUpdateCurrentTimestamp,
    /// `CREATE VIRTUAL TABLE ... USING module`.
    VirtualTables,
    /// DDL statements can run inside a transaction.
    TransactionalDdl,
    /// Indexes are declared inside `CREATE TABLE`.
    InlineIndexes,
    /// Foreign keys can only be declared inside `CREATE TABLE`.
    InlineForeignKeys,
}

impl Feature {
    /// Every feature.
    pub const ALL: [Self; 27] = [
        Self::Schemas,
        Self::DeferrableConstraints,
        Self::IdentityColumns,
        Self::AutoIncrement,
        Self::StoredGeneratedColumns,
        Self::VirtualGeneratedColumns,
        Self::IndexConcurrently,
        Self::RenameConstraint,
        Self::AlterColumn,
        Self::AddConstraint,
        Self::DropConstraint,
        Self::IncludeColumns,
        Self::PartialIndexes,
        Self::IndexMethods,
        Self::ExcludeConstraints,
        Self::NotValidConstraints,
        Self::NotEnforcedConstraints,
        Self::MaterializedViews,
        Self::CreateOrReplaceView,
        Self::CreateOrReplaceFunction,
        Self::StoredFunctions,
        Self::DropCascade,
        Self::OnUpdateCurrentTimestamp,
        Self::VirtualTables,
        Self::TransactionalDdl,
        Self::InlineIndexes,
        Self::InlineForeignKeys,
    ];

    /// Short description used in error messages.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Schemas => "schemas",
            Self::DeferrableConstraints => "DEFERRABLE constraints",
            Self::IdentityColumns => "identity columns",
            Self::AutoIncrement => "autoincrement columns",
            Self::StoredGeneratedColumns => "STORED generated columns",
            Self::VirtualGeneratedColumns => "VIRTUAL generated columns",
            Self::IndexConcurrently => "CREATE INDEX CONCURRENTLY",
            Self::RenameConstraint => "RENAME CONSTRAINT",
            Self::AlterColumn => "ALTER COLUMN",
            Self::AddConstraint => "ADD CONSTRAINT",
            Self::DropConstraint => "DROP CONSTRAINT",
            Self::IncludeColumns => "INCLUDE columns on indexes",
            Self::PartialIndexes => "partial indexes",
            Self::IndexMethods => "index methods",
            Self::ExcludeConstraints => "EXCLUDE constraints",
            Self::NotValidConstraints => "NOT VALID constraints",
            Self::NotEnforcedConstraints => "NOT ENFORCED constraints",
            Self::MaterializedViews => "materialized views",
            Self::CreateOrReplaceView => "CREATE OR REPLACE VIEW",
            Self::CreateOrReplaceFunction => "CREATE OR REPLACE FUNCTION",
            Self::StoredFunctions => "stored functions",
            Self::DropCascade => "DROP ... CASCADE",
            Self::OnUpdateCurrentTimestamp => "ON UPDATE CURRENT_TIMESTAMP",
            Self::VirtualTables => "virtual tables",
            Self::TransactionalDdl => "transactional DDL",
            Self::InlineIndexes => "inline index declarations",
            Self::InlineForeignKeys => "inline-only foreign keys",
        }
    }
}
