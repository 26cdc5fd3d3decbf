//! Tables and columns.

use super::{DropTarget, Renderer};
use crate::catalog::{Column, ConstraintKind, IdentityKind, Table};
use crate::dialect::{Dialect, Feature};
use crate::error::{Result, SchemaError};
use crate::ident::{is_literal, is_parenthesized};
use crate::migrate::{AddColumn, AlterColumn, ColumnChange, DropColumn, DropTable, RenameColumn, RenameTable};

/// Whether `expr` is a literal SQLite accepts as the default of a column
/// added to a populated table.
fn is_constant_default(expr: &str) -> bool {
    is_literal(expr)
        && !matches!(
            expr.trim().to_ascii_uppercase().as_str(),
            "NULL" | "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME"
        )
}

impl Renderer {
    /// `CREATE TABLE`, followed by the statements for whatever indexes and
    /// triggers the table carries that cannot live inside it.
    pub fn create_table(&self, table: &Table) -> Result<Vec<String>> {
        let name = self.qualified(&table.schema, &table.name);

        if let Some(vt) = &table.virtual_table {
            self.require(Feature::VirtualTables)?;
            let mut statements = vec![format!(
                "CREATE VIRTUAL TABLE {name} USING {}({})",
                vt.module,
                vt.arguments.join(", ")
            )];
            for trigger in &table.triggers {
                statements.push(self.create_trigger(trigger));
            }
            return Ok(statements);
        }

        let inline_pk = if self.dialect == Dialect::Sqlite {
            table.single_column_primary_key()
        } else {
            None
        };

        let mut lines = Vec::new();
        for column in &table.columns {
            let inline = inline_pk == Some(column.name.as_str());
            lines.push(self.column_definition(&table.qualified_name(), column, inline)?);
        }
        for constraint in &table.constraints {
            if inline_pk.is_some() && constraint.kind == ConstraintKind::PrimaryKey {
                continue;
            }
            lines.push(self.constraint_definition(constraint)?);
        }
        let inline_indexes = self.dialect.supports(Feature::InlineIndexes);
        if inline_indexes {
            for index in &table.indexes {
                lines.push(self.inline_index_definition(index)?);
            }
        }

        let mut statements = vec![format!(
            "CREATE TABLE {name} (\n    {}\n)",
            lines.join(",\n    ")
        )];
        if !inline_indexes {
            for index in &table.indexes {
                statements.push(self.create_index(index, false)?);
            }
        }
        for trigger in &table.triggers {
            statements.push(self.create_trigger(trigger));
        }
        Ok(statements)
    }

    /// One column definition as it appears inside `CREATE TABLE` or after
    /// `ADD COLUMN`. `inline_pk` marks SQLite's inline primary key.
    pub(crate) fn column_definition(
        &self,
        table: &str,
        column: &Column,
        inline_pk: bool,
    ) -> Result<String> {
        let mut sql = format!("{} {}", self.ident(&column.name), column.data_type);

        if let Some(collation) = &column.collation {
            match self.dialect {
                Dialect::Postgres => {
                    sql.push_str(" COLLATE \"");
                    sql.push_str(&collation.replace('"', "\"\""));
                    sql.push('"');
                }
                Dialect::Mysql | Dialect::Sqlite => {
                    sql.push_str(" COLLATE ");
                    sql.push_str(collation);
                }
            }
        }

        if let Some(generated) = &column.generated {
            let feature = if generated.stored {
                Feature::StoredGeneratedColumns
            } else {
                Feature::VirtualGeneratedColumns
            };
            self.require(feature)?;
            sql.push_str(&format!(
                " GENERATED ALWAYS AS ({}) {}",
                generated.expression.trim(),
                if generated.stored { "STORED" } else { "VIRTUAL" }
            ));
        }

        match column.identity {
            Some(IdentityKind::Always) => {
                self.require(Feature::IdentityColumns)?;
                sql.push_str(" GENERATED ALWAYS AS IDENTITY");
            }
            Some(IdentityKind::ByDefault) => {
                self.require(Feature::IdentityColumns)?;
                sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            }
            Some(IdentityKind::AutoIncrement) => self.require(Feature::AutoIncrement)?,
            None => {}
        }

        if inline_pk {
            sql.push_str(" PRIMARY KEY");
        }
        if column.identity == Some(IdentityKind::AutoIncrement) && self.dialect == Dialect::Sqlite {
            if !inline_pk || !column.data_type.trim().eq_ignore_ascii_case("integer") {
                return Err(SchemaError::malformed(
                    format!("column {table}.{}", column.name),
                    "AUTOINCREMENT requires a single-column INTEGER PRIMARY KEY",
                ));
            }
            sql.push_str(" AUTOINCREMENT");
        }

        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if column.renders_default() {
            if let Some(default) = &column.default {
                sql.push_str(" DEFAULT ");
                sql.push_str(&self.default_expression(default));
            }
        }
        if column.on_update_current_timestamp {
            self.require(Feature::OnUpdateCurrentTimestamp)?;
            sql.push_str(" ON UPDATE CURRENT_TIMESTAMP");
        }
        if column.identity == Some(IdentityKind::AutoIncrement) && self.dialect == Dialect::Mysql {
            sql.push_str(" AUTO_INCREMENT");
        }
        Ok(sql)
    }

    /// Non-literal defaults must be parenthesized on MySQL and SQLite.
    fn default_expression(&self, expr: &str) -> String {
        let expr = expr.trim();
        if self.dialect == Dialect::Postgres || is_literal(expr) || is_parenthesized(expr) {
            expr.to_string()
        } else {
            format!("({expr})")
        }
    }

    pub(super) fn drop_table(&self, op: &DropTable) -> Result<String> {
        Ok(format!(
            "DROP TABLE {}{}",
            self.qualified(&op.schema, &op.name),
            self.cascade(op.cascade, DropTarget::Table)?
        ))
    }

    pub(super) fn rename_table(&self, op: &RenameTable) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.qualified(&op.schema, &op.from),
            self.ident(&op.to)
        )
    }

    // ========================================================================
    // Columns
    // ========================================================================

    pub(super) fn add_column(&self, op: &AddColumn) -> Result<String> {
        let table = self.qualified(&op.schema, &op.table);
        let column = &op.column;
        if self.dialect == Dialect::Sqlite {
            if column.is_primary_key || column.is_unique {
                return Err(self.unsupported("adding a PRIMARY KEY or UNIQUE column"));
            }
            if column.identity == Some(IdentityKind::AutoIncrement) {
                return Err(self.unsupported("adding an AUTOINCREMENT column"));
            }
            if column.generated.as_ref().is_some_and(|g| g.stored) {
                return Err(self.unsupported("adding a STORED generated column"));
            }
            if column.generated.is_none() {
                let default = column.default.as_deref();
                if default.is_some_and(|d| !is_literal(d)) {
                    return Err(self.unsupported("adding a column with a non-constant default"));
                }
                if column.not_null && !default.is_some_and(is_constant_default) {
                    return Err(self.unsupported(
                        "adding a NOT NULL column without a non-null constant default",
                    ));
                }
            }
        }
        Ok(format!(
            "ALTER TABLE {table} ADD COLUMN {}",
            self.column_definition(&op.table, column, false)?
        ))
    }

    pub(super) fn alter_column(&self, op: &AlterColumn) -> Result<Vec<String>> {
        self.require(Feature::AlterColumn)?;
        if op.changes.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.qualified(&op.schema, &op.table);

        if self.dialect == Dialect::Mysql {
            return Ok(vec![format!(
                "ALTER TABLE {table} MODIFY COLUMN {}",
                self.column_definition(&op.table, &op.column, false)?
            )]);
        }

        let column = self.ident(&op.column.name);
        let mut clauses = Vec::with_capacity(op.changes.len());
        for change in &op.changes {
            let clause = match change {
                ColumnChange::SetType {
                    data_type,
                    collation,
                } => match collation {
                    Some(c) => format!(
                        "TYPE {data_type} COLLATE \"{}\"",
                        c.replace('"', "\"\"")
                    ),
                    None => format!("TYPE {data_type}"),
                },
                ColumnChange::SetNotNull => "SET NOT NULL".to_string(),
                ColumnChange::DropNotNull => "DROP NOT NULL".to_string(),
                ColumnChange::SetDefault(expr) => format!("SET DEFAULT {}", expr.trim()),
                ColumnChange::DropDefault => "DROP DEFAULT".to_string(),
                ColumnChange::AddIdentity(kind) => {
                    format!("ADD {}", self.identity_generation(*kind)?)
                }
                ColumnChange::SetIdentity(kind) => {
                    format!("SET {}", self.identity_generation(*kind)?)
                }
                ColumnChange::DropIdentity => "DROP IDENTITY".to_string(),
                ColumnChange::SetGenerated => {
                    return Err(self.unsupported("changing a generated column expression"));
                }
                ColumnChange::SetOnUpdate(_) => {
                    self.require(Feature::OnUpdateCurrentTimestamp)?;
                    continue;
                }
            };
            clauses.push(format!("ALTER COLUMN {column} {clause}"));
        }
        Ok(vec![format!("ALTER TABLE {table} {}", clauses.join(", "))])
    }

    fn identity_generation(&self, kind: IdentityKind) -> Result<&'static str> {
        self.require(Feature::IdentityColumns)?;
        match kind {
            IdentityKind::Always => Ok("GENERATED ALWAYS AS IDENTITY"),
            IdentityKind::ByDefault => Ok("GENERATED BY DEFAULT AS IDENTITY"),
            IdentityKind::AutoIncrement => Err(self.unsupported(Feature::AutoIncrement.description())),
        }
    }

    pub(super) fn drop_column(&self, op: &DropColumn) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}{}",
            self.qualified(&op.schema, &op.table),
            self.ident(&op.column),
            self.cascade(op.cascade, DropTarget::Column)?
        ))
    }

    pub(super) fn rename_column(&self, op: &RenameColumn) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.qualified(&op.schema, &op.table),
            self.ident(&op.from),
            self.ident(&op.to)
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{Constraint, Index, Trigger};
    use crate::migrate::Command;

    fn actor() -> Table {
        Table::new("", "actor")
            .column(Column::new("actor_id", "INTEGER"))
            .column(Column::new("first_name", "TEXT").not_null())
            .column(Column::new("last_name", "TEXT").not_null())
            .constraint(Constraint::primary_key(["actor_id"]))
    }

    #[test]
    fn test_sqlite_inlines_single_column_primary_key() {
        let sql = Renderer::new(Dialect::Sqlite)
            .render(&Command::create_table(actor()))
            .unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE actor (\n    actor_id INTEGER PRIMARY KEY,\n    first_name TEXT NOT NULL,\n    last_name TEXT NOT NULL\n)"
            ]
        );
    }

    #[test]
    fn test_postgres_keeps_named_table_constraint() {
        let mut table = actor();
        table.schema = "public".into();
        let sql = Renderer::new(Dialect::Postgres).create_table(&table).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE public.actor (\n    actor_id INTEGER,\n    first_name TEXT NOT NULL,\n    last_name TEXT NOT NULL,\n    CONSTRAINT actor_actor_id_pkey PRIMARY KEY (actor_id)\n)"
            ]
        );
    }

    #[test]
    fn test_sqlite_composite_primary_key_stays_table_level() {
        let table = Table::new("", "film_actor")
            .column(Column::new("actor_id", "INTEGER").not_null())
            .column(Column::new("film_id", "INTEGER").not_null())
            .constraint(Constraint::primary_key(["actor_id", "film_id"]));
        let sql = Renderer::new(Dialect::Sqlite).create_table(&table).unwrap();
        assert_eq!(
            sql[0],
            "CREATE TABLE film_actor (\n    actor_id INTEGER NOT NULL,\n    film_id INTEGER NOT NULL,\n    CONSTRAINT film_actor_actor_id_film_id_pkey PRIMARY KEY (actor_id, film_id)\n)"
        );
    }

    #[test]
    fn test_sqlite_autoincrement() {
        let table = Table::new("", "t")
            .column(Column::new("id", "INTEGER").auto_increment())
            .constraint(Constraint::primary_key(["id"]));
        let sql = Renderer::new(Dialect::Sqlite).create_table(&table).unwrap();
        assert_eq!(sql[0], "CREATE TABLE t (\n    id INTEGER PRIMARY KEY AUTOINCREMENT\n)");

        let no_pk = Table::new("", "t").column(Column::new("id", "INTEGER").auto_increment());
        let err = Renderer::new(Dialect::Sqlite).create_table(&no_pk).unwrap_err();
        assert!(err.to_string().contains("AUTOINCREMENT requires"));
    }

    #[test]
    fn test_mysql_column_clauses() {
        let table = Table::new("", "orders")
            .column(Column::new("id", "bigint").not_null().auto_increment())
            .column(
                Column::new("updated_at", "timestamp")
                    .not_null()
                    .default("CURRENT_TIMESTAMP")
                    .on_update_current_timestamp(),
            )
            .column(Column::new("note", "varchar(20)").collate("utf8mb4_bin").default("uuid()"))
            .constraint(Constraint::primary_key(["id"]))
            .index(Index::new("orders_updated_at_idx", ["updated_at"]));
        let sql = Renderer::new(Dialect::Mysql).create_table(&table).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE orders (\n    id bigint NOT NULL AUTO_INCREMENT,\n    updated_at timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,\n    note varchar(20) COLLATE utf8mb4_bin DEFAULT (uuid()),\n    PRIMARY KEY (id),\n    INDEX orders_updated_at_idx (updated_at)\n)"
            ]
        );
    }

    #[test]
    fn test_postgres_identity_and_generated() {
        let table = Table::new("public", "line")
            .column(Column::new("id", "bigint").identity(IdentityKind::ByDefault).default("1"))
            .column(Column::new("qty", "int").not_null())
            .column(Column::new("price", "numeric").not_null())
            .column(Column::new("total", "numeric").generated("qty * price", true));
        let sql = Renderer::new(Dialect::Postgres).create_table(&table).unwrap();
        assert_eq!(
            sql[0],
            "CREATE TABLE public.line (\n    id bigint GENERATED BY DEFAULT AS IDENTITY,\n    qty int NOT NULL,\n    price numeric NOT NULL,\n    total numeric GENERATED ALWAYS AS (qty * price) STORED\n)"
        );
    }

    #[test]
    fn test_feature_gating_in_columns() {
        let virtual_col = Table::new("public", "t")
            .column(Column::new("a", "int"))
            .column(Column::new("b", "int").generated("a + 1", false));
        let err = Renderer::new(Dialect::Postgres).create_table(&virtual_col).unwrap_err();
        assert_eq!(err.to_string(), "postgres does not support VIRTUAL generated columns");

        let identity = Table::new("", "t").column(Column::new("a", "int").identity(IdentityKind::Always));
        assert!(Renderer::new(Dialect::Mysql).create_table(&identity).unwrap_err().is_unsupported());

        let on_update = Table::new("", "t").column(Column::new("a", "timestamp").on_update_current_timestamp());
        assert!(Renderer::new(Dialect::Sqlite).create_table(&on_update).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_non_inline_indexes_and_triggers_follow_the_table() {
        let table = actor()
            .index(Index::new("", ["last_name"]))
            .trigger(Trigger::new(
                "actor_touch",
                "CREATE TRIGGER actor_touch AFTER UPDATE ON actor BEGIN SELECT 1; END;",
            ));
        let sql = Renderer::new(Dialect::Sqlite).create_table(&table).unwrap();
        assert_eq!(sql.len(), 3);
        assert_eq!(sql[1], "CREATE INDEX actor_last_name_idx ON actor (last_name)");
        assert_eq!(
            sql[2],
            "CREATE TRIGGER actor_touch AFTER UPDATE ON actor BEGIN SELECT 1; END"
        );
    }

    #[test]
    fn test_virtual_table() {
        let table = Table::new("", "docs").virtual_using("fts5", ["title", "body"]);
        let sql = Renderer::new(Dialect::Sqlite).create_table(&table).unwrap();
        assert_eq!(sql, vec!["CREATE VIRTUAL TABLE docs USING fts5(title, body)"]);
        assert!(Renderer::new(Dialect::Postgres).create_table(&table).is_err());
    }

    #[test]
    fn test_add_not_null_column() {
        let cmd = Command::add_column("", "actor", Column::new("email", "TEXT").not_null());
        let err = Renderer::new(Dialect::Sqlite).render(&cmd).unwrap_err();
        assert!(err.is_unsupported());

        let cmd = Command::add_column("public", "actor", Column::new("email", "text").not_null());
        assert_eq!(
            Renderer::new(Dialect::Postgres).render(&cmd).unwrap(),
            vec!["ALTER TABLE public.actor ADD COLUMN email text NOT NULL"]
        );

        let with_default = Command::add_column(
            "",
            "actor",
            Column::new("email", "TEXT").not_null().default("''"),
        );
        assert_eq!(
            Renderer::new(Dialect::Sqlite).render(&with_default).unwrap(),
            vec!["ALTER TABLE actor ADD COLUMN email TEXT NOT NULL DEFAULT ''"]
        );
    }

    #[test]
    fn test_sqlite_add_column_restrictions() {
        let lite = Renderer::new(Dialect::Sqlite);
        let mut unique = Column::new("code", "TEXT");
        unique.is_unique = true;
        assert!(lite.render(&Command::add_column("", "t", unique)).is_err());

        let stored = Column::new("x", "INTEGER").generated("a * 2", true);
        assert!(lite.render(&Command::add_column("", "t", stored)).is_err());

        let virtual_col = Column::new("x", "INTEGER").generated("a * 2", false);
        assert!(lite.render(&Command::add_column("", "t", virtual_col)).is_ok());

        let now = Column::new("at", "TEXT").default("CURRENT_TIMESTAMP").not_null();
        assert!(lite.render(&Command::add_column("", "t", now)).is_err());

        let expr = Column::new("at", "TEXT").default("datetime('now')");
        assert!(lite.render(&Command::add_column("", "t", expr)).is_err());
    }

    #[test]
    fn test_alter_column_per_dialect() {
        let cmd = Command::alter_column(
            "public",
            "actor",
            Column::new("email", "varchar(320)").not_null().default("''"),
            vec![
                ColumnChange::SetType {
                    data_type: "varchar(320)".into(),
                    collation: None,
                },
                ColumnChange::SetNotNull,
                ColumnChange::SetDefault("''".into()),
            ],
        );
        assert_eq!(
            Renderer::new(Dialect::Postgres).render(&cmd).unwrap(),
            vec![
                "ALTER TABLE public.actor ALTER COLUMN email TYPE varchar(320), ALTER COLUMN email SET NOT NULL, ALTER COLUMN email SET DEFAULT ''"
            ]
        );
        assert_eq!(
            Renderer::new(Dialect::Mysql).render(&cmd).unwrap(),
            vec!["ALTER TABLE public.actor MODIFY COLUMN email varchar(320) NOT NULL DEFAULT ''"]
        );
        assert!(Renderer::new(Dialect::Sqlite).render(&cmd).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_alter_generated_expression_is_unsupported_on_postgres() {
        let cmd = Command::alter_column(
            "public",
            "t",
            Column::new("x", "int").generated("a + 2", true),
            vec![ColumnChange::SetGenerated],
        );
        assert!(Renderer::new(Dialect::Postgres).render(&cmd).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_drop_and_rename() {
        let pg = Renderer::new(Dialect::Postgres);
        assert_eq!(
            pg.render(&Command::drop_column("public", "t", "a", true)).unwrap(),
            vec!["ALTER TABLE public.t DROP COLUMN a CASCADE"]
        );
        assert_eq!(
            pg.render(&Command::rename_table("public", "t", "u")).unwrap(),
            vec!["ALTER TABLE public.t RENAME TO u"]
        );
        let my = Renderer::new(Dialect::Mysql);
        assert!(my.render(&Command::drop_column("", "t", "a", true)).is_err());
        assert_eq!(
            my.render(&Command::rename_column("", "t", "a", "order")).unwrap(),
            vec!["ALTER TABLE t RENAME COLUMN a TO `order`"]
        );
        assert_eq!(
            my.render(&Command::drop_table("", "t", true)).unwrap(),
            vec!["DROP TABLE t CASCADE"]
        );
        assert!(Renderer::new(Dialect::Sqlite)
            .render(&Command::drop_table("", "t", true))
            .is_err());
    }
}
