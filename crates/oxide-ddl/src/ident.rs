//! Identifier quoting and literal escaping.
//!
//! Every renderer goes through these helpers so that quoting rules are the
//! same across statements. Identifiers are only quoted when they need to be.

use crate::dialect::Dialect;

/// Words that must be quoted when used as identifiers in any dialect.
const RESERVED: &[&str] = &[
    "all", "alter", "and", "any", "as", "asc", "between", "by", "case", "cast", "check",
    "collate", "column", "constraint", "create", "cross", "current_date", "current_time",
    "current_timestamp", "current_user", "default", "delete", "desc", "distinct", "drop", "else",
    "end", "except", "exists", "false", "fetch", "for", "foreign", "from", "full", "grant",
    "group", "having", "in", "inner", "insert", "intersect", "into", "is", "join", "left", "like",
    "limit", "natural", "not", "null", "offset", "on", "or", "order", "outer",
    "primary", "references", "right", "select", "set", "table", "then", "to", "true", "union",
    "unique", "update", "user", "using", "values", "when", "where", "window", "with",
];

/// Reserved in MySQL and SQLite, usable as-is in PostgreSQL.
const RESERVED_OUTSIDE_POSTGRES: &[&str] = &["add", "index", "key"];

/// Returns whether `name` is a reserved word in `dialect`.
#[must_use]
pub fn is_reserved(dialect: Dialect, name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED.binary_search(&lower.as_str()).is_ok()
        || (dialect != Dialect::Postgres
            && RESERVED_OUTSIDE_POSTGRES.contains(&lower.as_str()))
}

/// Returns whether `name` must be quoted to be used as an identifier.
#[must_use]
pub fn needs_quoting(dialect: Dialect, name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return true;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return true;
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return true;
    }
    if dialect.folds_to_lower_case() && name.chars().any(|c| c.is_ascii_uppercase()) {
        return true;
    }
    is_reserved(dialect, name)
}

/// Quotes an identifier if necessary, doubling embedded quote characters.
#[must_use]
pub fn quote_identifier(dialect: Dialect, name: &str) -> String {
    if !needs_quoting(dialect, name) {
        return name.to_string();
    }
    let q = dialect.identifier_quote();
    let mut out = String::with_capacity(name.len() + 2);
    out.push(q);
    for c in name.chars() {
        if c == q {
            out.push(q);
        }
        out.push(c);
    }
    out.push(q);
    out
}

/// Quotes `schema.name`, omitting the schema when it is empty.
#[must_use]
pub fn quote_qualified(dialect: Dialect, schema: &str, name: &str) -> String {
    if schema.is_empty() {
        quote_identifier(dialect, name)
    } else {
        format!(
            "{}.{}",
            quote_identifier(dialect, schema),
            quote_identifier(dialect, name)
        )
    }
}

/// Quotes and comma-joins a list of identifiers.
#[must_use]
pub fn quote_list(dialect: Dialect, names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(dialect, n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders a string literal, escaping quotes (and backslashes on MySQL).
#[must_use]
pub fn quote_literal(dialect: Dialect, value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' if dialect == Dialect::Mysql => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Returns whether a raw SQL expression is a plain literal: a number, a
/// quoted string, `NULL`, a boolean or one of the `CURRENT_*` keywords.
#[must_use]
pub fn is_literal(expr: &str) -> bool {
    let expr = expr.trim();
    if expr.is_empty() {
        return false;
    }
    let upper = expr.to_ascii_uppercase();
    if matches!(
        upper.as_str(),
        "NULL" | "TRUE" | "FALSE" | "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME"
    ) {
        return true;
    }
    if expr.len() >= 2 && expr.starts_with('\'') && expr.ends_with('\'') {
        // A single quoted string, not two adjacent ones.
        let inner = &expr[1..expr.len() - 1];
        return !inner.replace("''", "").contains('\'');
    }
    let digits = expr.strip_prefix(|c| c == '-' || c == '+').unwrap_or(expr);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits != "."
}

/// Returns whether `expr` is fully wrapped by one pair of parentheses.
#[must_use]
pub fn is_parenthesized(expr: &str) -> bool {
    let expr = expr.trim();
    if !(expr.starts_with('(') && expr.ends_with(')')) {
        return false;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, c) in expr.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != expr.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
