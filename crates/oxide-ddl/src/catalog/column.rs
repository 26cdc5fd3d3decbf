//! Column definitions.

use serde::{Deserialize, Serialize};

use super::cache::Named;
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::normalize::{normalize_type, same_expression};

/// How a column's value is produced automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// `GENERATED ALWAYS AS IDENTITY`.
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    ByDefault,
    /// `AUTO_INCREMENT` (MySQL) or `AUTOINCREMENT` (SQLite).
    AutoIncrement,
}

/// A generated (computed) column expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedColumn {
    /// Raw SQL expression.
    pub expression: String,
    /// `STORED` when true, `VIRTUAL` otherwise.
    pub stored: bool,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared type, as written.
    pub data_type: String,
    /// Whether the column is `NOT NULL`.
    #[serde(default)]
    pub not_null: bool,
    /// Raw SQL default expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Identity or autoincrement mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityKind>,
    /// Generated expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<GeneratedColumn>,
    /// Collation name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// MySQL `ON UPDATE CURRENT_TIMESTAMP`.
    #[serde(default)]
    pub on_update_current_timestamp: bool,
    /// Set when a single-column primary key covers this column.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Set when a single-column unique constraint covers this column.
    #[serde(default)]
    pub is_unique: bool,
}

impl Named for Column {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Column {
    /// Creates a nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            default: None,
            identity: None,
            generated: None,
            collation: None,
            on_update_current_timestamp: false,
            is_primary_key: false,
            is_unique: false,
        }
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the raw SQL default expression.
    #[must_use]
    pub fn default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Sets the identity mode.
    #[must_use]
    pub fn identity(mut self, kind: IdentityKind) -> Self {
        self.identity = Some(kind);
        self
    }

    /// Shorthand for [`IdentityKind::AutoIncrement`].
    #[must_use]
    pub fn auto_increment(self) -> Self {
        self.identity(IdentityKind::AutoIncrement)
    }

    /// Makes the column generated from `expression`.
    #[must_use]
    pub fn generated(mut self, expression: impl Into<String>, stored: bool) -> Self {
        self.generated = Some(GeneratedColumn {
            expression: expression.into(),
            stored,
        });
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Adds MySQL's `ON UPDATE CURRENT_TIMESTAMP`.
    #[must_use]
    pub fn on_update_current_timestamp(mut self) -> Self {
        self.on_update_current_timestamp = true;
        self
    }

    /// Whether a default clause is rendered for this column.
    ///
    /// Identity, autoincrement and generated columns never carry one.
    #[must_use]
    pub fn renders_default(&self) -> bool {
        self.default.is_some() && self.identity.is_none() && self.generated.is_none()
    }

    /// Checks the column on its own.
    pub fn validate(&self, table: &str) -> Result<()> {
        let entity = || format!("column {table}.{}", self.name);
        if self.name.is_empty() {
            return Err(SchemaError::malformed(
                format!("table {table}"),
                "column with an empty name",
            ));
        }
        if self.data_type.trim().is_empty() {
            return Err(SchemaError::malformed(entity(), "missing data type"));
        }
        if self.identity.is_some() && self.generated.is_some() {
            return Err(SchemaError::malformed(
                entity(),
                "identity and generated expression are mutually exclusive",
            ));
        }
        if let Some(generated) = &self.generated {
            if generated.expression.trim().is_empty() {
                return Err(SchemaError::malformed(entity(), "empty generated expression"));
            }
        }
        Ok(())
    }

    /// Compares every semantically significant field, ignoring the derived
    /// key flags. Types compare after dialect normalization.
    #[must_use]
    pub fn same_definition(&self, other: &Self, dialect: Dialect) -> bool {
        self.name == other.name
            && normalize_type(dialect, &self.data_type) == normalize_type(dialect, &other.data_type)
            && self.not_null == other.not_null
            && self.identity == other.identity
            && same_generated(self.generated.as_ref(), other.generated.as_ref())
            && self.collation == other.collation
            && self.on_update_current_timestamp == other.on_update_current_timestamp
            && (!self.renders_default()
                || same_expression(self.default.as_deref(), other.default.as_deref()))
            && self.renders_default() == other.renders_default()
    }
}

pub(crate) fn same_generated(a: Option<&GeneratedColumn>, b: Option<&GeneratedColumn>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.stored == b.stored && same_expression(Some(&a.expression), Some(&b.expression))
        }
        _ => false,
    }
}
