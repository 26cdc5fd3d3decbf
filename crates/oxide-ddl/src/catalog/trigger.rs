//! Triggers.

use serde::{Deserialize, Serialize};

use super::cache::Named;
use crate::error::{Result, SchemaError};
use crate::normalize::same_source;

/// A trigger on a table or materialized view.
///
/// The source is the complete `CREATE TRIGGER` statement, rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Schema of the owning table.
    pub table_schema: String,
    /// Name of the owning table.
    pub table_name: String,
    /// Trigger name.
    pub name: String,
    /// Raw `CREATE TRIGGER` text.
    pub source: String,
}

impl Named for Trigger {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Trigger {
    /// Creates a trigger. The owning table is bound when the trigger is added
    /// to a table or view.
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            table_schema: String::new(),
            table_name: String::new(),
            name: name.into(),
            source: source.into(),
        }
    }

    /// Binds the trigger to its table.
    #[must_use]
    pub fn on_table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.table_schema = schema.into();
        self.table_name = table.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SchemaError::malformed(
                format!("table {}", self.table_name),
                "trigger with an empty name",
            ));
        }
        if self.source.trim().is_empty() {
            return Err(SchemaError::malformed(
                format!("trigger {}", self.name),
                "empty source",
            ));
        }
        Ok(())
    }

    /// Compares owner, name and source text (whitespace-insensitive).
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.table_schema == other.table_schema
            && self.table_name == other.table_name
            && self.name == other.name
            && same_source(&self.source, &other.source)
    }
}
