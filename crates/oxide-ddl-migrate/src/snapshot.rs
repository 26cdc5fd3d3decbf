//! Catalog snapshots on disk.
//!
//! A snapshot records the catalog a database was migrated to, so the next
//! run can diff against it without introspecting.

use std::path::Path;

use chrono::{DateTime, Utc};
use oxide_ddl::{diff, Catalog, Mode, Plan};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};

/// A catalog and the moment it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
    /// The recorded catalog.
    pub catalog: Catalog,
}

impl Snapshot {
    /// Captures `catalog` now.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self::at(catalog, Utc::now())
    }

    /// Captures `catalog` with an explicit timestamp.
    #[must_use]
    pub const fn at(catalog: Catalog, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            catalog,
        }
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.catalog.validate()?;
        Ok(snapshot)
    }

    /// Writes the snapshot to `path`, replacing any previous file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        tokio::fs::write(path, json).await?;
        info!(
            path = %path.display(),
            dialect = %self.catalog.dialect,
            captured_at = %self.captured_at,
            "Snapshot saved"
        );
        Ok(())
    }

    /// Reads a snapshot from `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let snapshot = Self::from_json(&json)?;
        debug!(
            path = %path.display(),
            captured_at = %snapshot.captured_at,
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Reads a snapshot from `path`, or `None` when no file exists yet.
    pub async fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::load(path).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(MigrateError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Plans the migration from this snapshot to `want`.
    pub fn plan_to(&self, want: &Catalog, mode: Mode) -> Result<Plan> {
        Ok(diff(&self.catalog, want, mode)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use oxide_ddl::catalog::{Column, Constraint, Table};
    use oxide_ddl::Dialect;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new(Dialect::Postgres);
        catalog.add_table(
            Table::new("", "customer")
                .column(Column::new("id", "bigint").not_null())
                .column(Column::new("email", "text"))
                .constraint(Constraint::primary_key(["id"])),
        );
        catalog
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        let captured_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let snapshot = Snapshot::at(catalog(), captured_at);
        snapshot.save(&path).await.unwrap();

        let loaded = Snapshot::load(&path).await.unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.captured_at, captured_at);

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"captured_at\": \"2024-03-01T12:00:00Z\""));
        assert!(json.contains("\"dialect\": \"postgres\""));
    }

    #[tokio::test]
    async fn test_load_optional_missing_file() {
        let dir = TempDir::new().unwrap();
        let loaded = Snapshot::load_optional(dir.path().join("missing.json"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = Snapshot::load(&path).await.unwrap_err();
        assert!(matches!(err, MigrateError::Serialization(_)));
        let err = Snapshot::load_optional(&path).await.unwrap_err();
        assert!(matches!(err, MigrateError::Serialization(_)));
    }

    #[test]
    fn test_plan_to() {
        let snapshot = Snapshot::new(catalog());
        assert!(snapshot
            .plan_to(&catalog(), Mode::SYNC)
            .unwrap()
            .is_empty());

        let mut want = catalog();
        want.add_table(Table::new("", "tag").column(Column::new("label", "text")));
        let plan = snapshot.plan_to(&want, Mode::default()).unwrap();
        assert_eq!(
            plan.statements().unwrap(),
            vec!["CREATE TABLE public.tag (\n    label text\n)"]
        );
    }
}
