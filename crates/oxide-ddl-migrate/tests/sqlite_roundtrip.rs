//! Applying plans to SQLite, reading the result back and diffing it.

use oxide_ddl::catalog::{Catalog, Column, Constraint, Function, Index, Table, Trigger, View};
use oxide_ddl::{diff, Dialect, Mode};
use oxide_ddl_migrate::prelude::*;
use pretty_assertions::assert_eq;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tempfile::TempDir;

// =============================================================================
// A minimal SQLite introspector over the pragma table functions
// =============================================================================

struct SqliteIntrospector {
    pool: SqlitePool,
}

impl Introspector for SqliteIntrospector {
    async fn version(&self) -> Result<String> {
        Ok(sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn database_name(&self) -> Result<String> {
        Ok("main".to_string())
    }

    async fn current_schema(&self) -> Result<String> {
        Ok("main".to_string())
    }

    async fn extensions(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn tables(&self, _filter: &IntrospectFilter) -> Result<Vec<Table>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&self.pool)
                .await?;
        Ok(names.into_iter().map(|n| Table::new("main", n)).collect())
    }

    async fn columns(&self, _filter: &IntrospectFilter) -> Result<Vec<ColumnRecord>> {
        let rows: Vec<(String, String, String, i64, Option<String>)> = sqlx::query_as(
            "SELECT m.name, p.name, p.type, p.\"notnull\", p.dflt_value \
             FROM sqlite_master m JOIN pragma_table_info(m.name) p \
             WHERE m.type = 'table' ORDER BY m.name, p.cid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(table, name, data_type, not_null, default)| {
                let mut column = Column::new(name, data_type);
                column.not_null = not_null != 0;
                column.default = default;
                ColumnRecord {
                    table_schema: "main".to_string(),
                    table_name: table,
                    column,
                }
            })
            .collect())
    }

    async fn constraints(&self, _filter: &IntrospectFilter) -> Result<Vec<ConstraintRecord>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT m.name, p.name \
             FROM sqlite_master m JOIN pragma_table_info(m.name) p \
             WHERE m.type = 'table' AND p.pk > 0 ORDER BY m.name, p.pk",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut records: Vec<ConstraintRecord> = Vec::new();
        for (table, column) in rows {
            match records.last_mut() {
                Some(last) if last.table_name == table => {
                    last.constraint.columns.push(column);
                }
                _ => records.push(ConstraintRecord {
                    table_schema: "main".to_string(),
                    table_name: table,
                    constraint: Constraint::primary_key([column]),
                }),
            }
        }
        Ok(records)
    }

    async fn indexes(&self, _filter: &IntrospectFilter) -> Result<Vec<Index>> {
        let rows: Vec<(String, String, i64, String)> = sqlx::query_as(
            "SELECT m.name, il.name, il.\"unique\", ii.name \
             FROM sqlite_master m \
             JOIN pragma_index_list(m.name) il \
             JOIN pragma_index_info(il.name) ii \
             WHERE m.type = 'table' AND il.origin = 'c' \
             ORDER BY m.name, il.name, ii.seqno",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut indexes: Vec<Index> = Vec::new();
        for (table, name, unique, column) in rows {
            match indexes.last_mut() {
                Some(last) if last.name == name => {
                    last.parts.extend(Index::new("", [column]).parts);
                }
                _ => {
                    let mut index = Index::new(name, [column]).on_table("main", table);
                    index.unique = unique != 0;
                    indexes.push(index);
                }
            }
        }
        Ok(indexes)
    }

    async fn triggers(&self, _filter: &IntrospectFilter) -> Result<Vec<Trigger>> {
        Ok(Vec::new())
    }

    async fn views(&self, _filter: &IntrospectFilter) -> Result<Vec<View>> {
        Ok(Vec::new())
    }

    async fn functions(&self, _filter: &IntrospectFilter) -> Result<Vec<Function>> {
        Ok(Vec::new())
    }
}

async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

async fn apply(pool: &SqlitePool, plan: &oxide_ddl::Plan) -> ExecutionReport {
    let mut conn = pool.acquire().await.unwrap();
    PlanExecutor::new().execute(&mut *conn, plan).await.unwrap()
}

async fn introspect(pool: &SqlitePool) -> Catalog {
    let introspector = SqliteIntrospector { pool: pool.clone() };
    load_catalog(
        Dialect::Sqlite,
        &introspector,
        &IntrospectFilter::new().sorted(true),
    )
    .await
    .unwrap()
}

// =============================================================================
// Schema versions
// =============================================================================

fn note() -> Table {
    Table::new("", "note")
        .column(Column::new("id", "INTEGER").not_null())
        .column(Column::new("body", "TEXT").not_null())
        .column(Column::new("pinned", "INTEGER").not_null().default("0"))
        .constraint(Constraint::primary_key(["id"]))
        .index(Index::new("note_body_idx", ["body"]))
}

fn v1() -> Catalog {
    let mut catalog = Catalog::new(Dialect::Sqlite);
    catalog.add_table(note());
    catalog
}

fn v2() -> Catalog {
    let mut catalog = Catalog::new(Dialect::Sqlite);
    catalog.add_table(note().column(Column::new("tag_id", "INTEGER")));
    catalog.add_table(
        Table::new("", "tag")
            .column(Column::new("id", "INTEGER").not_null())
            .column(Column::new("label", "TEXT").not_null())
            .constraint(Constraint::primary_key(["id"]))
            .index(Index::new("tag_label_idx", ["label"]).unique()),
    );
    catalog
}

// =============================================================================
// Round trips
// =============================================================================

#[tokio::test]
async fn applied_catalog_introspects_to_an_empty_diff() {
    let pool = create_test_pool().await;
    let want = v2();

    let plan = diff(&Catalog::new(Dialect::Sqlite), &want, Mode::default()).unwrap();
    let report = apply(&pool, &plan).await;
    assert_eq!(report.executed, 4);

    let got = introspect(&pool).await;
    let names: Vec<&str> = got.tables().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["note", "tag"]);
    assert!(got.table("", "note").unwrap().get_column("id").unwrap().is_primary_key);

    let plan = diff(&got, &want, Mode::CREATE_MISSING | Mode::UPDATE_EXISTING).unwrap();
    assert!(plan.is_empty(), "{:?}", plan.statements());
}

#[tokio::test]
async fn snapshot_drives_the_next_migration() {
    let pool = create_test_pool().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schema.json");

    assert!(Snapshot::load_optional(&path).await.unwrap().is_none());
    let empty = Snapshot::new(Catalog::new(Dialect::Sqlite));
    apply(&pool, &empty.plan_to(&v1(), Mode::default()).unwrap()).await;
    Snapshot::new(v1()).save(&path).await.unwrap();

    let previous = Snapshot::load(&path).await.unwrap();
    let plan = previous.plan_to(&v2(), Mode::default()).unwrap();
    assert_eq!(
        plan.statements().unwrap(),
        vec![
            "ALTER TABLE note ADD COLUMN tag_id INTEGER",
            "CREATE TABLE tag (\n    id INTEGER PRIMARY KEY NOT NULL,\n    label TEXT NOT NULL\n)",
            "CREATE UNIQUE INDEX tag_label_idx ON tag (label)",
        ]
    );
    apply(&pool, &plan).await;
    Snapshot::new(v2()).save(&path).await.unwrap();

    let got = introspect(&pool).await;
    assert!(got.table("", "note").unwrap().get_column("tag_id").is_some());
    let saved = Snapshot::load(&path).await.unwrap();
    assert!(diff(&got, &saved.catalog, Mode::SYNC).unwrap().is_empty());
}

#[tokio::test]
async fn failed_run_leaves_the_database_unchanged() {
    let pool = create_test_pool().await;
    apply(
        &pool,
        &diff(&Catalog::new(Dialect::Sqlite), &v1(), Mode::default()).unwrap(),
    )
    .await;

    // The database already has `note`, the stale snapshot does not.
    let plan = diff(&Catalog::new(Dialect::Sqlite), &v2(), Mode::default()).unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let err = PlanExecutor::new()
        .execute(&mut *conn, &plan)
        .await
        .unwrap_err();
    drop(conn);
    assert!(err.statement().unwrap().starts_with("CREATE TABLE note"));

    let got = introspect(&pool).await;
    assert!(got.table("", "tag").is_none());
    assert!(diff(&got, &v1(), Mode::SYNC).unwrap().is_empty());
}
