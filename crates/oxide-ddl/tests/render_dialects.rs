//! Rendering the same catalog for every dialect.

use oxide_ddl::catalog::{
    Catalog, Column, Constraint, Function, IdentityKind, Index, IndexMethod, Table, Trigger, View,
};
use oxide_ddl::migrate::Command;
use oxide_ddl::{diff, Dialect, Feature, Mode, Renderer};
use pretty_assertions::assert_eq;

fn customer() -> Table {
    Table::new("", "customer")
        .column(Column::new("id", "integer").not_null())
        .column(Column::new("email", "varchar(255)").not_null())
        .column(Column::new("created_at", "timestamp").default("CURRENT_TIMESTAMP"))
        .constraint(Constraint::primary_key(["id"]))
        .constraint(Constraint::unique(["email"]))
        .index(Index::new("customer_created_idx", ["created_at"]))
}

fn create(dialect: Dialect) -> Vec<String> {
    let mut want = Catalog::new(dialect);
    want.add_table(customer());
    diff(&Catalog::new(dialect), &want, Mode::CREATE_MISSING)
        .unwrap()
        .statements()
        .unwrap()
}

// =============================================================================
// CREATE TABLE per dialect
// =============================================================================

#[test]
fn postgres_indexes_follow_the_table() {
    assert_eq!(
        create(Dialect::Postgres),
        vec![
            "CREATE TABLE public.customer (\n    id integer NOT NULL,\n    email varchar(255) NOT NULL,\n    created_at timestamp DEFAULT CURRENT_TIMESTAMP,\n    CONSTRAINT customer_id_pkey PRIMARY KEY (id),\n    CONSTRAINT customer_email_key UNIQUE (email)\n)",
            "CREATE INDEX customer_created_idx ON public.customer (created_at)",
        ]
    );
}

#[test]
fn mysql_declares_indexes_inline() {
    assert_eq!(
        create(Dialect::Mysql),
        vec![
            "CREATE TABLE customer (\n    id integer NOT NULL,\n    email varchar(255) NOT NULL,\n    created_at timestamp DEFAULT CURRENT_TIMESTAMP,\n    PRIMARY KEY (id),\n    CONSTRAINT customer_email_key UNIQUE (email),\n    INDEX customer_created_idx (created_at)\n)",
        ]
    );
}

#[test]
fn sqlite_inlines_single_column_primary_key() {
    assert_eq!(
        create(Dialect::Sqlite),
        vec![
            "CREATE TABLE customer (\n    id integer PRIMARY KEY NOT NULL,\n    email varchar(255) NOT NULL,\n    created_at timestamp DEFAULT CURRENT_TIMESTAMP,\n    CONSTRAINT customer_email_key UNIQUE (email)\n)",
            "CREATE INDEX customer_created_idx ON customer (created_at)",
        ]
    );
}

// =============================================================================
// Dialect gating
// =============================================================================

#[test]
fn every_rendered_feature_is_gated() {
    let identity = Command::create_table(
        Table::new("", "t").column(Column::new("id", "bigint").identity(IdentityKind::Always)),
    );
    let deferrable = Command::add_constraint(
        "",
        "t",
        Constraint::foreign_key(["a"], "", "u", ["id"])
            .named("t_a_fkey")
            .deferrable(true),
    );
    let hash = Command::create_index(
        Index::new("t_doc_idx", ["doc"])
            .using(IndexMethod::Hash)
            .on_table("", "t"),
    );
    let materialized = Command::create_view(View::new("v", "SELECT 1 AS a").materialized(), false);
    let on_update = Command::create_table(
        Table::new("", "t").column(Column::new("touched", "timestamp").on_update_current_timestamp()),
    );
    let fts = Command::create_table(Table::new("", "docs").virtual_using("fts5", ["body"]));
    let function = Command::create_function(
        Function::new("CREATE FUNCTION one() RETURNS integer AS 'select 1' LANGUAGE sql").unwrap(),
        false,
    );

    let cases = [
        (&identity, Feature::IdentityColumns),
        (&deferrable, Feature::DeferrableConstraints),
        (&hash, Feature::IndexMethods),
        (&materialized, Feature::MaterializedViews),
        (&on_update, Feature::OnUpdateCurrentTimestamp),
        (&fts, Feature::VirtualTables),
        (&function, Feature::StoredFunctions),
    ];
    for (command, feature) in cases {
        for dialect in Dialect::ALL {
            let result = Renderer::new(dialect).render(command);
            if dialect.supports(feature) {
                assert!(result.is_ok(), "{dialect} {command}: {result:?}");
            } else {
                let err = result.unwrap_err();
                assert!(err.is_unsupported(), "{dialect} {command}: {err}");
            }
        }
    }
}

#[test]
fn triggers_render_verbatim() {
    let table = customer().trigger(Trigger::new(
        "customer_touch",
        "CREATE TRIGGER customer_touch AFTER UPDATE ON customer BEGIN SELECT 1; END;",
    ));
    let statements = Renderer::new(Dialect::Sqlite)
        .render(&Command::create_table(table))
        .unwrap();
    assert_eq!(
        statements.last().map(String::as_str),
        Some("CREATE TRIGGER customer_touch AFTER UPDATE ON customer BEGIN SELECT 1; END")
    );
}
