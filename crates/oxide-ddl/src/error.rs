//! Error types for catalog construction, rendering and diffing.

use crate::dialect::Dialect;

/// Errors produced by the catalog, the DDL renderer and the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The target dialect has no equivalent for a requested DDL feature.
    #[error("{dialect} does not support {feature}")]
    Unsupported {
        /// The dialect being rendered for.
        dialect: Dialect,
        /// Human readable description of the feature.
        feature: String,
    },

    /// A required field is missing or inconsistent.
    #[error("malformed {entity}: {message}")]
    Malformed {
        /// The offending entity, e.g. `table "public.actor"`.
        entity: String,
        /// What is wrong with it.
        message: String,
    },

    /// The two catalogs handed to the diff engine target different dialects.
    #[error("cannot diff a {got} catalog against a {want} catalog")]
    DialectMismatch {
        /// Dialect of the current catalog.
        got: Dialect,
        /// Dialect of the desired catalog.
        want: Dialect,
    },

    /// A tag modifier string could not be parsed or applied.
    #[error("invalid modifier in {input:?}: {message}")]
    InvalidModifier {
        /// The raw modifier input.
        input: String,
        /// What went wrong.
        message: String,
    },

    /// An unexpected internal state was reached.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchemaError {
    /// Creates an [`SchemaError::Unsupported`] error.
    pub fn unsupported(dialect: Dialect, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }

    /// Creates a [`SchemaError::Malformed`] error.
    pub fn malformed(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates a [`SchemaError::InvalidModifier`] error.
    pub(crate) fn modifier(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModifier {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for [`SchemaError::Unsupported`].
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SchemaError>;
