//! Plan executor.
//!
//! This module applies a rendered [`Plan`] to a live database, one statement
//! at a time. Each statement's success gates the next; the first failure
//! aborts the run.

use oxide_ddl::{Feature, Phase, Plan, Renderer};
use sqlx::Executor;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Every statement of the plan, in execution order.
    pub statements: Vec<String>,
    /// Number of statements that ran successfully.
    pub executed: usize,
    /// Whether the run was wrapped in a transaction.
    pub transactional: bool,
    /// Whether the run was a dry run.
    pub dry_run: bool,
}

/// Executes migration plans against a database connection.
#[derive(Debug, Clone, Default)]
pub struct PlanExecutor {
    dry_run: bool,
    transactional: Option<bool>,
}

impl PlanExecutor {
    /// Creates an executor with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables dry-run mode (statements are logged but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Forces the run in or out of a single transaction. Without this, a
    /// transaction is used when the plan's dialect has transactional DDL.
    #[must_use]
    pub const fn transactional(mut self, enabled: bool) -> Self {
        self.transactional = Some(enabled);
        self
    }

    /// Whether a run of `plan` would be wrapped in a transaction.
    #[must_use]
    pub fn is_transactional(&self, plan: &Plan) -> bool {
        self.transactional
            .unwrap_or_else(|| plan.dialect().supports(Feature::TransactionalDdl))
    }

    /// Renders a plan into `(phase, statement)` pairs without running it.
    pub fn render(plan: &Plan) -> Result<Vec<(Phase, String)>> {
        let renderer = Renderer::new(plan.dialect());
        let mut statements = Vec::new();
        for (phase, commands) in plan.phases() {
            for command in commands {
                for sql in renderer.render(command)? {
                    statements.push((phase, sql));
                }
            }
        }
        Ok(statements)
    }

    /// Applies `plan` over `conn`.
    ///
    /// The whole plan is rendered before anything runs, so an unsupported
    /// command leaves the database untouched. In transactional mode a failed
    /// statement rolls back the run; otherwise the database keeps whatever
    /// the last successful statement produced.
    pub async fn execute<C>(&self, conn: &mut C, plan: &Plan) -> Result<ExecutionReport>
    where
        for<'c> &'c mut C: Executor<'c>,
    {
        let statements = Self::render(plan)?;
        let transactional = self.is_transactional(plan);

        info!(
            dialect = %plan.dialect(),
            statements = statements.len(),
            transactional,
            dry_run = self.dry_run,
            "Applying plan"
        );

        let mut report = ExecutionReport {
            statements: Vec::with_capacity(statements.len()),
            executed: 0,
            transactional,
            dry_run: self.dry_run,
        };

        if self.dry_run {
            for (phase, sql) in statements {
                info!(phase = %phase, sql = %sql, "Dry run");
                report.statements.push(sql);
            }
            return Ok(report);
        }

        if statements.is_empty() {
            return Ok(report);
        }

        if transactional {
            sqlx::raw_sql("BEGIN").execute(&mut *conn).await?;
        }

        for (phase, sql) in statements {
            debug!(phase = %phase, sql = %sql, "Executing SQL");
            if let Err(source) = sqlx::raw_sql(&sql).execute(&mut *conn).await {
                warn!(
                    phase = %phase,
                    sql = %sql,
                    error = %source,
                    executed = report.executed,
                    "Statement failed, aborting plan"
                );
                if transactional {
                    if let Err(err) = sqlx::raw_sql("ROLLBACK").execute(&mut *conn).await {
                        warn!(error = %err, "Rollback failed");
                    }
                }
                return Err(MigrateError::execution(sql, source));
            }
            report.executed += 1;
            report.statements.push(sql);
        }

        if transactional {
            sqlx::raw_sql("COMMIT").execute(&mut *conn).await?;
        }

        info!(executed = report.executed, "Plan applied successfully");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_ddl::catalog::{Catalog, Column, Constraint, Index, Table};
    use oxide_ddl::{diff, Command, Dialect, Mode};
    use sqlx::{Connection, SqliteConnection};

    async fn create_test_connection() -> SqliteConnection {
        SqliteConnection::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite database")
    }

    async fn table_names(conn: &mut SqliteConnection) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(conn)
        .await
        .unwrap()
    }

    fn shop() -> Catalog {
        let mut catalog = Catalog::new(Dialect::Sqlite);
        catalog.add_table(
            Table::new("", "customer")
                .column(Column::new("id", "INTEGER").not_null())
                .column(Column::new("email", "TEXT").not_null())
                .constraint(Constraint::primary_key(["id"]))
                .index(Index::new("customer_email_idx", ["email"]).unique()),
        );
        catalog.add_table(
            Table::new("", "purchase")
                .column(Column::new("id", "INTEGER").not_null())
                .column(Column::new("customer_id", "INTEGER"))
                .constraint(Constraint::primary_key(["id"]))
                .constraint(Constraint::foreign_key(["customer_id"], "", "customer", ["id"])),
        );
        catalog
    }

    fn duplicate_table_plan() -> Plan {
        let table = Table::new("", "t").column(Column::new("a", "INTEGER"));
        let mut plan = Plan::new(Dialect::Sqlite);
        plan.push(Phase::CreateTables, Command::create_table(table.clone()));
        plan.push(Phase::CreateTables, Command::create_table(table));
        plan
    }

    #[tokio::test]
    async fn test_apply_plan() {
        let mut conn = create_test_connection().await;
        let plan = diff(&Catalog::new(Dialect::Sqlite), &shop(), Mode::default()).unwrap();

        let report = PlanExecutor::new().execute(&mut conn, &plan).await.unwrap();
        assert!(report.transactional);
        assert_eq!(report.executed, 3);
        assert_eq!(report.statements.len(), 3);

        assert_eq!(table_names(&mut conn).await, vec!["customer", "purchase"]);
        let index: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'customer_email_idx'",
        )
        .fetch_optional(&mut conn)
        .await
        .unwrap();
        assert!(index.is_some());
    }

    #[tokio::test]
    async fn test_failed_statement_rolls_back() {
        let mut conn = create_test_connection().await;

        let err = PlanExecutor::new()
            .execute(&mut conn, &duplicate_table_plan())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Execution { .. }));
        assert_eq!(err.statement(), Some("CREATE TABLE t (\n    a INTEGER\n)"));

        assert!(table_names(&mut conn).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_statement_without_transaction_keeps_progress() {
        let mut conn = create_test_connection().await;

        let err = PlanExecutor::new()
            .transactional(false)
            .execute(&mut conn, &duplicate_table_plan())
            .await
            .unwrap_err();
        assert!(err.statement().is_some());

        assert_eq!(table_names(&mut conn).await, vec!["t"]);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let mut conn = create_test_connection().await;
        let plan = diff(&Catalog::new(Dialect::Sqlite), &shop(), Mode::default()).unwrap();

        let report = PlanExecutor::new()
            .dry_run(true)
            .execute(&mut conn, &plan)
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.executed, 0);
        assert_eq!(report.statements, plan.statements().unwrap());

        assert!(table_names(&mut conn).await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_plan_runs_nothing() {
        let mut conn = create_test_connection().await;
        let mut plan = Plan::new(Dialect::Sqlite);
        plan.push(
            Phase::CreateTables,
            Command::create_table(Table::new("", "t").column(Column::new("a", "INTEGER"))),
        );
        plan.push(Phase::CreateSchemas, Command::create_schema("sales"));

        let err = PlanExecutor::new().execute(&mut conn, &plan).await.unwrap_err();
        assert!(matches!(err, MigrateError::Schema(ref e) if e.is_unsupported()));
        assert!(table_names(&mut conn).await.is_empty());
    }

    #[test]
    fn test_transactional_defaults_to_dialect() {
        let executor = PlanExecutor::new();
        assert!(executor.is_transactional(&Plan::new(Dialect::Postgres)));
        assert!(executor.is_transactional(&Plan::new(Dialect::Sqlite)));
        assert!(!executor.is_transactional(&Plan::new(Dialect::Mysql)));
        assert!(executor
            .transactional(true)
            .is_transactional(&Plan::new(Dialect::Mysql)));
    }

    #[test]
    fn test_render_keeps_phase_order() {
        let plan = diff(&Catalog::new(Dialect::Sqlite), &shop(), Mode::default()).unwrap();
        let phases: Vec<Phase> = PlanExecutor::render(&plan)
            .unwrap()
            .into_iter()
            .map(|(phase, _)| phase)
            .collect();
        assert_eq!(
            phases,
            vec![Phase::CreateTables, Phase::CreateTables, Phase::CreateIndexes]
        );
    }
}
