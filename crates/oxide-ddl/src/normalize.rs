//! Normalization of type names and raw SQL expressions for comparison.
//!
//! Introspected catalogs spell the same thing differently from hand-written
//! ones (`int4` vs `INTEGER`, `'x'::text` vs `'x'`). The diff engine compares
//! normalized forms so that such spellings do not produce spurious changes.

use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::Dialect;

static LITERAL_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^('(?:[^']|'')*')::[a-z_ ]+(?:\([0-9, ]*\))?(?:\[\])?$")
        .expect("literal cast pattern is valid")
});

static INT_DISPLAY_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(tinyint|smallint|mediumint|int|bigint)\([0-9]+\)(.*)$")
        .expect("display width pattern is valid")
});

/// Collapses runs of whitespace into one space and trims the ends, leaving
/// the content of string literals untouched.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut pending_space = false;
    for c in s.trim().chars() {
        if c == '\'' {
            in_string = !in_string;
        }
        if !in_string && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

/// Lower-cases everything outside string literals and quoted identifiers.
fn lower_outside_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    for c in s.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(c),
            None if matches!(c, '\'' | '"' | '`') => {
                quote = Some(c);
                out.push(c);
            }
            None => out.push(c.to_ascii_lowercase()),
        }
    }
    out
}

/// Removes spaces directly inside parentheses and around commas.
fn tighten_punctuation(s: &str) -> String {
    s.replace("( ", "(")
        .replace(" )", ")")
        .replace(" (", "(")
        .replace(" ,", ",")
        .replace(", ", ",")
}

/// Normalizes a declared column type for comparison.
#[must_use]
pub fn normalize_type(dialect: Dialect, data_type: &str) -> String {
    let ty = tighten_punctuation(&collapse_whitespace(&data_type.to_ascii_lowercase()));
    let (base, suffix) = match ty.find('(') {
        Some(i) => (ty[..i].to_string(), ty[i..].to_string()),
        None => (ty.clone(), String::new()),
    };
    match dialect {
        Dialect::Postgres => {
            let base = match base.as_str() {
                "int" | "int4" => "integer",
                "int8" => "bigint",
                "int2" => "smallint",
                "bool" => "boolean",
                "float8" => "double precision",
                "float4" => "real",
                "decimal" => "numeric",
                "character varying" => "varchar",
                "character" | "bpchar" => "char",
                "timestamp without time zone" => "timestamp",
                "timestamp with time zone" => "timestamptz",
                "time without time zone" => "time",
                "time with time zone" => "timetz",
                other => other,
            };
            format!("{base}{suffix}")
        }
        Dialect::Mysql => {
            if let Some(caps) = INT_DISPLAY_WIDTH.captures(&ty) {
                if &caps[1] == "tinyint" && ty.starts_with("tinyint(1)") {
                    return ty;
                }
                return format!("{}{}", &caps[1], &caps[2]);
            }
            let base = match base.as_str() {
                "integer" => "int",
                "bool" | "boolean" => return format!("tinyint(1){suffix}"),
                "dec" | "numeric" => "decimal",
                "character varying" => "varchar",
                "character" => "char",
                other => other,
            };
            format!("{base}{suffix}")
        }
        Dialect::Sqlite => ty,
    }
}

/// Normalizes a raw SQL expression (default, check, predicate, generated
/// expression) for comparison.
#[must_use]
pub fn normalize_expression(expr: &str) -> String {
    let mut e = tighten_punctuation(&lower_outside_quotes(&collapse_whitespace(expr)));
    loop {
        let trimmed = e.trim();
        if crate::ident::is_parenthesized(trimmed) {
            e = trimmed[1..trimmed.len() - 1].trim().to_string();
        } else {
            break;
        }
    }
    if let Some(caps) = LITERAL_CAST.captures(&e) {
        e = caps[1].to_string();
    }
    e
}

/// Compares two optional expressions after normalization.
#[must_use]
pub fn same_expression(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => normalize_expression(a) == normalize_expression(b),
        _ => false,
    }
}

/// Compares two raw SQL sources (view queries, function and trigger
/// bodies), ignoring whitespace differences and a trailing semicolon.
#[must_use]
pub fn same_source(a: &str, b: &str) -> bool {
    let strip = |s: &str| collapse_whitespace(s).trim_end_matches(';').trim_end().to_string();
    strip(a) == strip(b)
}
