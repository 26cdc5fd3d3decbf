//! Error types for plan execution, introspection and snapshots.

use oxide_ddl::SchemaError;

/// Errors that can occur while applying or loading a schema.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The plan or catalog could not be rendered or assembled.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A statement of the plan failed; the rest of the run was abandoned.
    #[error("Statement failed: {source}\n{statement}")]
    Execution {
        /// The statement text, as sent.
        statement: String,
        /// The driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Database error outside of a plan statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An introspector returned records that do not fit together.
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// IO error (reading/writing snapshot files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    /// Wraps a driver error together with the statement that caused it.
    pub fn execution(statement: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Execution {
            statement: statement.into(),
            source,
        }
    }

    /// The failing statement, for execution errors.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Execution { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
