//! Stored functions and procedures.
//!
//! Functions are kept as raw source text. The name, kind and argument list
//! are extracted from the source so that overloads can be told apart and
//! `DROP FUNCTION` can name the exact signature.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::cache::Named;
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::normalize::{normalize_type, same_source};

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:DEFINER\s*=\s*\S+\s+)?(FUNCTION|PROCEDURE)\s+((?:"[^"]+"|`[^`]+`|[\w$]+)(?:\s*\.\s*(?:"[^"]+"|`[^`]+`|[\w$]+))?)\s*\("#,
    )
    .expect("function header pattern is valid")
});

static ARG_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\s+(?:DEFAULT\s+|=\s*).*$").expect("argument default pattern is valid")
});

/// Type names made of several words, which must not be mistaken for an
/// argument name followed by a type.
const MULTI_WORD_TYPES: &[&str] = &[
    "bit varying",
    "character varying",
    "double precision",
    "time with time zone",
    "time without time zone",
    "timestamp with time zone",
    "timestamp without time zone",
];

/// Mode of a function argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgMode {
    /// `IN` (the default).
    In,
    /// `OUT`.
    Out,
    /// `INOUT`.
    InOut,
    /// `VARIADIC`.
    Variadic,
}

/// One argument of a function signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArg {
    /// Argument mode.
    pub mode: ArgMode,
    /// Argument name, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument type.
    pub data_type: String,
}

/// Whether the source declares a function or a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineKind {
    /// `CREATE FUNCTION`.
    Function,
    /// `CREATE PROCEDURE`.
    Procedure,
}

impl RoutineKind {
    /// SQL keyword for the kind.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::Procedure => "PROCEDURE",
        }
    }
}

/// A stored function or procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Schema name.
    pub schema: String,
    /// Function name.
    pub name: String,
    /// Function or procedure.
    pub kind: RoutineKind,
    /// Complete `CREATE FUNCTION` text.
    pub source: String,
    /// Arguments extracted from the source.
    #[serde(default)]
    pub args: Vec<FunctionArg>,
    /// The function references no table, so it can be created before them.
    #[serde(default)]
    pub independent: bool,
}

impl Named for Function {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Function {
    /// Parses a function from its `CREATE FUNCTION` / `CREATE PROCEDURE`
    /// source. A schema named in the source wins over the one the function
    /// is later added to.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let caps = HEADER.captures(&source).ok_or_else(|| {
            SchemaError::malformed("function", "source does not start with CREATE FUNCTION")
        })?;
        let kind = if caps[1].eq_ignore_ascii_case("procedure") {
            RoutineKind::Procedure
        } else {
            RoutineKind::Function
        };
        let (schema, name) = split_qualified(&caps[2]);
        let open = caps.get(0).map_or(0, |m| m.end());
        let close = matching_paren(&source, open).ok_or_else(|| {
            SchemaError::malformed(format!("function {name}"), "unbalanced argument list")
        })?;
        let args = split_top_level(&source[open..close])
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| parse_arg(&a))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                SchemaError::Malformed { message, .. } => {
                    SchemaError::malformed(format!("function {name}"), message)
                }
                other => other,
            })?;
        Ok(Self {
            schema: schema.unwrap_or_default(),
            name,
            kind,
            source,
            args,
            independent: false,
        })
    }

    /// Marks the function as independent of any table.
    #[must_use]
    pub fn independent(mut self) -> Self {
        self.independent = true;
        self
    }

    /// Types of the arguments that make up the call signature (`OUT`
    /// arguments excluded), as used by `DROP FUNCTION`.
    #[must_use]
    pub fn identity_args(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter(|a| a.mode != ArgMode::Out)
            .map(|a| a.data_type.as_str())
            .collect()
    }

    /// Returns `true` when both functions have the same call signature.
    #[must_use]
    pub fn same_signature(&self, other: &Self, dialect: Dialect) -> bool {
        let a = self.identity_args();
        let b = other.identity_args();
        self.name == other.name
            && a.len() == b.len()
            && a
                .iter()
                .zip(&b)
                .all(|(x, y)| normalize_type(dialect, x) == normalize_type(dialect, y))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SchemaError::malformed(
                format!("schema {}", self.schema),
                "function with an empty name",
            ));
        }
        Ok(())
    }

    /// Compares the source text (whitespace-insensitive) and the flags.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.name == other.name
            && self.kind == other.kind
            && self.independent == other.independent
            && same_source(&self.source, &other.source)
    }
}

fn unquote(ident: &str) -> String {
    let ident = ident.trim();
    let quoted = (ident.starts_with('"') && ident.ends_with('"'))
        || (ident.starts_with('`') && ident.ends_with('`'));
    if quoted && ident.len() >= 2 {
        ident[1..ident.len() - 1].to_string()
    } else {
        ident.to_string()
    }
}

fn split_qualified(raw: &str) -> (Option<String>, String) {
    let parts = split_outside_quotes(raw, '.');
    match parts.as_slice() {
        [schema, name] => (Some(unquote(schema)), unquote(name)),
        _ => (None, unquote(raw)),
    }
}

fn split_outside_quotes(raw: &str, sep: char) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut quote: Option<char> = None;
    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '"' || c == '`' => quote = Some(c),
            None if c == sep => {
                parts.push(String::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = parts.last_mut() {
            last.push(c);
        }
    }
    parts
}

/// Byte offset of the `)` closing the parenthesis opened just before `start`.
fn matching_paren(source: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_string = false;
    for (i, c) in source[start..].char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut depth = 0usize;
    let mut in_string = false;
    for c in list.chars() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                parts.push(String::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = parts.last_mut() {
            last.push(c);
        }
    }
    parts
}

fn parse_arg(raw: &str) -> Result<FunctionArg> {
    let without_default = ARG_DEFAULT.replace(raw.trim(), "");
    let mut rest = without_default.trim();
    let mut mode = ArgMode::In;
    if let Some((first, tail)) = rest.split_once(char::is_whitespace) {
        let parsed = match first.to_ascii_uppercase().as_str() {
            "IN" => Some(ArgMode::In),
            "OUT" => Some(ArgMode::Out),
            "INOUT" => Some(ArgMode::InOut),
            "VARIADIC" => Some(ArgMode::Variadic),
            _ => None,
        };
        if let Some(parsed) = parsed {
            mode = parsed;
            rest = tail.trim();
        }
    }
    if rest.is_empty() {
        return Err(SchemaError::malformed("function", format!("argument {raw:?} has no type")));
    }
    let lower = rest.to_ascii_lowercase();
    let starts_with_type = MULTI_WORD_TYPES.iter().any(|t| lower.starts_with(t));
    let (name, data_type) = match rest.split_once(char::is_whitespace) {
        Some((name, ty)) if !starts_with_type => (Some(unquote(name)), ty.trim().to_string()),
        _ => (None, rest.to_string()),
    };
    Ok(FunctionArg {
        mode,
        name,
        data_type,
    })
}
