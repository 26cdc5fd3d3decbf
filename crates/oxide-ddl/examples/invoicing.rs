//! Invoicing System - Schema Migration Example
//!
//! This example declares a small multi-tenant invoicing schema with tag
//! strings, evolves it, and prints the migration script for every dialect:
//! - Companies, clients and invoices with foreign keys
//! - A second version adding invoice lines and a paid-at timestamp
//! - A reporting view (PostgreSQL and MySQL only)
//!
//! Run with: cargo run --example invoicing

use oxide_ddl::catalog::{Catalog, Table, View};
use oxide_ddl::tags::apply_column_tags;
use oxide_ddl::{diff, Dialect, Feature, Mode, Result};

// =============================================================================
// SCHEMA DEFINITIONS
// =============================================================================

fn table(name: &str, columns: &[(&str, &str)]) -> Result<Table> {
    let mut table = Table::new("", name);
    for (column, tags) in columns {
        apply_column_tags(&mut table, column, tags)?;
    }
    Ok(table)
}

fn companies() -> Result<Table> {
    table(
        "companies",
        &[
            ("id", "type=integer, notnull, pk"),
            ("name", "type=varchar(200), notnull"),
            ("tax_id", "type=varchar(50), unique"),
            ("default_currency", "type=char(3), notnull, default='EUR'"),
        ],
    )
}

fn clients() -> Result<Table> {
    table(
        "clients",
        &[
            ("id", "type=integer, notnull, pk"),
            ("company_id", "type=integer, notnull, references=companies.id, ondelete=cascade"),
            ("name", "type=varchar(200), notnull"),
            ("email", "type=varchar(255), index"),
        ],
    )
}

fn invoices(v2: bool) -> Result<Table> {
    let mut columns = vec![
        ("id", "type=integer, notnull, pk"),
        ("client_id", "type=integer, notnull, references=clients.id"),
        ("number", "type=varchar(30), notnull, unique"),
        ("status", "type=varchar(10), notnull, default='draft', index"),
        ("total", "type=numeric(12,2), notnull, default=0, check={total >= 0}"),
    ];
    if v2 {
        columns.push(("paid_at", "type=timestamp"));
    }
    table("invoices", &columns)
}

fn invoice_lines() -> Result<Table> {
    table(
        "invoice_lines",
        &[
            ("id", "type=integer, notnull, pk"),
            ("invoice_id", "type=integer, notnull, references=invoices.id, ondelete=cascade"),
            ("description", "type=text, notnull"),
            ("quantity", "type=integer, notnull, default=1"),
            ("unit_price", "type=numeric(12,2), notnull"),
        ],
    )
}

fn v1(dialect: Dialect) -> Result<Catalog> {
    let mut catalog = Catalog::new(dialect);
    catalog.add_table(companies()?);
    catalog.add_table(clients()?);
    catalog.add_table(invoices(false)?);
    Ok(catalog)
}

fn v2(dialect: Dialect) -> Result<Catalog> {
    let mut catalog = Catalog::new(dialect);
    catalog.add_table(companies()?);
    catalog.add_table(clients()?);
    catalog.add_table(invoices(true)?);
    catalog.add_table(invoice_lines()?);
    catalog.add_view(View::new(
        "open_invoices",
        "SELECT i.id, i.number, c.name AS client, i.total \
         FROM invoices i JOIN clients c ON c.id = i.client_id \
         WHERE i.paid_at IS NULL",
    ));
    Ok(catalog)
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> Result<()> {
    for dialect in Dialect::ALL {
        println!("-- =========================================================");
        println!("-- {dialect}: initial schema");
        println!("-- =========================================================");
        let initial = diff(&Catalog::new(dialect), &v1(dialect)?, Mode::default())?;
        print!("{}", initial.render()?);

        println!("-- {dialect}: v1 -> v2");
        match diff(&v1(dialect)?, &v2(dialect)?, Mode::default()) {
            Ok(plan) => {
                for (phase, commands) in plan.phases() {
                    println!("-- phase {phase}: {} command(s)", commands.len());
                }
                print!("{}", plan.render()?);
            }
            Err(err) if err.is_unsupported() => {
                println!("-- skipped: {err}");
            }
            Err(err) => return Err(err),
        }

        if !dialect.supports(Feature::AlterColumn) {
            println!("-- note: {dialect} cannot alter columns in place");
        }
        println!();
    }
    Ok(())
}
