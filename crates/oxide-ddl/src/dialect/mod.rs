//! SQL dialect capabilities.
//!
//! Different databases accept different DDL. Every renderer asks the
//! [`Dialect`] whether a [`Feature`] is available before emitting the
//! corresponding syntax, and fails with [`SchemaError::Unsupported`] when it
//! is not. There is no silent downgrade.

mod feature;

pub use feature::Feature;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL 8.
    Mysql,
    /// SQLite 3.35+.
    Sqlite,
}

impl Dialect {
    /// All dialects, in a stable order.
    pub const ALL: [Self; 3] = [Self::Postgres, Self::Mysql, Self::Sqlite];

    /// Returns the dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns whether the dialect supports `feature`.
    #[must_use]
    pub const fn supports(self, feature: Feature) -> bool {
        use Feature as F;
        match self {
            Self::Postgres => matches!(
                feature,
                F::Schemas
                    | F::DeferrableConstraints
                    | F::IdentityColumns
                    | F::StoredGeneratedColumns
                    | F::IndexConcurrently
                    | F::RenameConstraint
                    | F::AlterColumn
                    | F::AddConstraint
                    | F::DropConstraint
                    | F::IncludeColumns
                    | F::PartialIndexes
                    | F::IndexMethods
                    | F::ExcludeConstraints
                    | F::NotValidConstraints
                    | F::MaterializedViews
                    | F::CreateOrReplaceView
                    | F::CreateOrReplaceFunction
                    | F::StoredFunctions
                    | F::DropCascade
                    | F::TransactionalDdl
            ),
            Self::Mysql => matches!(
                feature,
                F::Schemas
                    | F::AutoIncrement
                    | F::StoredGeneratedColumns
                    | F::VirtualGeneratedColumns
                    | F::AlterColumn
                    | F::AddConstraint
                    | F::DropConstraint
                    | F::IndexMethods
                    | F::NotEnforcedConstraints
                    | F::CreateOrReplaceView
                    | F::StoredFunctions
                    | F::DropCascade
                    | F::OnUpdateCurrentTimestamp
                    | F::InlineIndexes
            ),
            Self::Sqlite => matches!(
                feature,
                F::AutoIncrement
                    | F::StoredGeneratedColumns
                    | F::VirtualGeneratedColumns
                    | F::PartialIndexes
                    | F::VirtualTables
                    | F::TransactionalDdl
                    | F::InlineForeignKeys
            ),
        }
    }

    /// Fails with [`SchemaError::Unsupported`] unless `feature` is supported.
    pub fn require(self, feature: Feature) -> Result<()> {
        if self.supports(feature) {
            Ok(())
        } else {
            Err(SchemaError::unsupported(self, feature.description()))
        }
    }

    /// The schema objects land in when no schema is named.
    ///
    /// MySQL and SQLite use the connection's current database, represented
    /// by the empty string.
    #[must_use]
    pub const fn default_schema(self) -> &'static str {
        match self {
            Self::Postgres => "public",
            Self::Mysql | Self::Sqlite => "",
        }
    }

    /// Returns the identifier quote character.
    #[must_use]
    pub const fn identifier_quote(self) -> char {
        match self {
            Self::Mysql => '`',
            Self::Postgres | Self::Sqlite => '"',
        }
    }

    /// Whether unquoted identifiers are folded to lower case, making any
    /// upper-case identifier require quoting.
    #[must_use]
    pub const fn folds_to_lower_case(self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(SchemaError::malformed(
                "dialect",
                format!("unknown dialect {other:?}"),
            )),
        }
    }
}
