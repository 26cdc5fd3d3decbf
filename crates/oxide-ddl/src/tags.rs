//! Tag modifiers.
//!
//! Column declarations kept next to application types carry their DDL as a
//! compact tag string:
//!
//! ```text
//! type=varchar(255), notnull, unique, default='guest'
//! type=integer, fk={table=customer, column=id, ondelete=cascade}
//! type=tsvector, index={name=doc_search_idx, using=gin}
//! ```
//!
//! [`parse_modifiers`] splits such a string into [`Modifier`]s. Commas inside
//! braces, parentheses and quotes do not separate modifiers, so raw SQL
//! (`default=coalesce(a, b)`) and nested lists (`fk={...}`) pass through
//! intact. [`apply_column_tags`] turns the modifiers of one column into
//! builder calls on a [`Table`].
//!
//! ```rust
//! use oxide_ddl::catalog::Table;
//! use oxide_ddl::tags::apply_column_tags;
//!
//! let mut table = Table::new("public", "customer");
//! apply_column_tags(&mut table, "id", "type=bigint, identity, pk").unwrap();
//! apply_column_tags(&mut table, "email", "type=text, notnull, unique").unwrap();
//!
//! assert!(table.get_column("id").unwrap().is_primary_key);
//! assert!(table.constraints.contains("customer_email_key"));
//! ```

use std::str::FromStr;

use crate::catalog::{
    Column, Constraint, ConstraintKind, IdentityKind, Index, IndexMethod, IndexPart,
    ReferentialAction, Table,
};
use crate::error::{Result, SchemaError};

/// One `key` or `key=value` entry of a tag string.
///
/// Keys are lower-cased. A braced value is stored without its braces; any
/// other value is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    /// Modifier name.
    pub key: String,
    /// Raw value, if any.
    pub value: Option<String>,
}

impl Modifier {
    /// A modifier without a value.
    #[must_use]
    pub fn flag(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// A `key=value` modifier.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    fn required_value(&self, input: &str) -> Result<&str> {
        match self.value.as_deref() {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(SchemaError::modifier(
                input,
                format!("`{}` requires a value", self.key),
            )),
        }
    }

    fn no_value(&self, input: &str) -> Result<()> {
        match &self.value {
            None => Ok(()),
            Some(_) => Err(SchemaError::modifier(
                input,
                format!("`{}` takes no value", self.key),
            )),
        }
    }

    /// The nested modifiers of a braced value.
    fn nested(&self, input: &str) -> Result<Vec<Self>> {
        parse_modifiers(self.required_value(input)?)
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

/// Splits a tag string into modifiers.
///
/// ```rust
/// use oxide_ddl::tags::{parse_modifiers, Modifier};
///
/// let mods = parse_modifiers("notnull, default=coalesce(a, b), check={a > 0, b > 0}").unwrap();
/// assert_eq!(
///     mods,
///     vec![
///         Modifier::flag("notnull"),
///         Modifier::with_value("default", "coalesce(a, b)"),
///         Modifier::with_value("check", "a > 0, b > 0"),
///     ]
/// );
/// ```
pub fn parse_modifiers(input: &str) -> Result<Vec<Modifier>> {
    split_top_level(input)?
        .into_iter()
        .map(|token| parse_modifier(input, token))
        .collect()
}

fn parse_modifier(input: &str, token: &str) -> Result<Modifier> {
    let (key, value) = match token.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (token, None),
    };
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_key {
        return Err(SchemaError::modifier(
            input,
            format!("invalid modifier name {key:?}"),
        ));
    }
    let value = value.map(|v| {
        v.strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(v)
            .trim()
            .to_string()
    });
    Ok(Modifier {
        key: key.to_ascii_lowercase(),
        value,
    })
}

/// Splits on commas outside quotes, braces and parentheses.
fn split_top_level(input: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut open: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            // A doubled quote closes and reopens, which nets out.
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '{' | '(' => open.push(c),
            '}' | ')' => {
                let expected = if c == '}' { '{' } else { '(' };
                if open.pop() != Some(expected) {
                    return Err(SchemaError::modifier(
                        input,
                        format!("unbalanced {c:?} at offset {i}"),
                    ));
                }
            }
            ',' if open.is_empty() => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if let Some(q) = quote {
        return Err(SchemaError::modifier(input, format!("unterminated {q} quote")));
    }
    if let Some(c) = open.last() {
        return Err(SchemaError::modifier(input, format!("unclosed {c:?}")));
    }
    parts.push(input[start..].trim());
    parts.retain(|p| !p.is_empty());
    Ok(parts)
}

// ============================================================================
// Applier
// ============================================================================

/// Applies the tag string of one column to a table.
///
/// The column is fetched or created by name, updated and stored back at its
/// position. Key, reference, check and index modifiers add table-level
/// constraints and indexes; a repeated `pk` builds a composite primary key,
/// and `unique=name` / `index=name` shared by several columns build
/// composite ones. The table is left untouched when a modifier is rejected.
///
/// Recognized modifiers:
///
/// | Modifier | Effect |
/// |---|---|
/// | `type=T` | declared type |
/// | `notnull` / `null` | nullability |
/// | `default=expr` | raw default expression |
/// | `pk` | primary key member |
/// | `unique[=name]` | unique constraint |
/// | `identity[=always\|by_default]` | identity column |
/// | `autoincrement` | `AUTO_INCREMENT` / `AUTOINCREMENT` |
/// | `generated={expr}`, `stored` / `virtual` | generated column |
/// | `collate=name` | collation |
/// | `onupdate` | `ON UPDATE CURRENT_TIMESTAMP` |
/// | `index[=name]` or `index={name=, unique, using=, where=}` | index |
/// | `references=[schema.]table.column` | foreign key |
/// | `fk={table=, column=, schema=, name=, ondelete=, onupdate=, deferrable}` | foreign key |
/// | `ondelete=action` | `ON DELETE` of the column's foreign key |
/// | `check={expr}` | check constraint |
pub fn apply_column_tags(original: &mut Table, column: &str, tags: &str) -> Result<()> {
    let modifiers = parse_modifiers(tags)?;
    let mut work = original.clone();
    let table = &mut work;
    let (mut col, pos) = table.get_or_create_column(column);
    let mut generated: Option<String> = None;
    let mut stored = true;
    let mut foreign_key: Option<String> = None;

    for m in &modifiers {
        match m.key.as_str() {
            "type" => col.data_type = m.required_value(tags)?.to_string(),
            "notnull" => {
                m.no_value(tags)?;
                col.not_null = true;
            }
            "null" => {
                m.no_value(tags)?;
                col.not_null = false;
            }
            "default" => col.default = Some(m.required_value(tags)?.to_string()),
            "pk" => {
                m.no_value(tags)?;
                add_to_primary_key(table, column);
            }
            "unique" => add_unique(table, column, m.value.as_deref()),
            "identity" => {
                col.identity = Some(match m.value.as_deref() {
                    None => IdentityKind::ByDefault,
                    Some(kind) => parse_identity(tags, kind)?,
                });
            }
            "autoincrement" => {
                m.no_value(tags)?;
                col.identity = Some(IdentityKind::AutoIncrement);
            }
            "generated" => generated = Some(m.required_value(tags)?.to_string()),
            "stored" => {
                m.no_value(tags)?;
                stored = true;
            }
            "virtual" => {
                m.no_value(tags)?;
                stored = false;
            }
            "collate" => col.collation = Some(m.required_value(tags)?.to_string()),
            "onupdate" => {
                m.no_value(tags)?;
                col.on_update_current_timestamp = true;
            }
            "index" => add_index(table, column, tags, m)?,
            "references" | "fk" => {
                let mut fk = if m.key == "fk" {
                    foreign_key_block(tags, column, &m.nested(tags)?)?
                } else {
                    reference_shorthand(tags, column, m.required_value(tags)?)?
                };
                if fk.name.is_empty() {
                    fk.name = fk.default_name(&table.name);
                }
                foreign_key = Some(fk.name.clone());
                table.add_constraint(fk);
            }
            "ondelete" => {
                let action = parse_action(tags, m.required_value(tags)?)?;
                let name = foreign_key.as_deref().ok_or_else(|| {
                    SchemaError::modifier(tags, "`ondelete` needs a preceding `references` or `fk`")
                })?;
                set_on_delete(table, name, action);
            }
            "check" => {
                let check = Constraint::check(m.required_value(tags)?)
                    .named(format!("{}_{column}_check", table.name));
                table.add_constraint(check);
            }
            other => {
                return Err(SchemaError::modifier(
                    tags,
                    format!("unknown modifier `{other}`"),
                ));
            }
        }
    }

    if let Some(expression) = generated {
        col = col.generated(expression, stored);
    }
    if col.data_type.trim().is_empty() {
        return Err(SchemaError::modifier(
            tags,
            format!("column {column:?} has no `type`"),
        ));
    }
    table.store_column(pos, col)?;
    table.backfill_key_flags();
    *original = work;
    Ok(())
}

fn add_to_primary_key(table: &mut Table, column: &str) {
    match table.primary_key().cloned() {
        Some(mut pk) => {
            if !pk.columns.iter().any(|c| c == column) {
                pk.columns.push(column.to_string());
            }
            table.add_constraint(pk);
        }
        None => {
            table.add_constraint(Constraint::primary_key([column]));
        }
    }
}

fn add_unique(table: &mut Table, column: &str, name: Option<&str>) {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        table.add_constraint(Constraint::unique([column]));
        return;
    };
    match table.constraints.get_by_name(name).cloned() {
        Some(mut unique) if unique.kind == ConstraintKind::Unique => {
            if !unique.columns.iter().any(|c| c == column) {
                unique.columns.push(column.to_string());
            }
            table.add_constraint(unique);
        }
        _ => {
            table.add_constraint(Constraint::unique([column]).named(name));
        }
    }
}

fn add_index(table: &mut Table, column: &str, tags: &str, m: &Modifier) -> Result<()> {
    let mut name = String::new();
    let mut unique = false;
    let mut method = None;
    let mut predicate = None;

    match m.value.as_deref() {
        None => {}
        Some(value) if !value.contains(['=', ',']) && value != "unique" => {
            name = value.to_string();
        }
        Some(_) => {
            for option in m.nested(tags)? {
                match option.key.as_str() {
                    "name" => name = option.required_value(tags)?.to_string(),
                    "unique" => {
                        option.no_value(tags)?;
                        unique = true;
                    }
                    "using" | "method" => {
                        method = Some(
                            IndexMethod::from_str(option.required_value(tags)?)
                                .map_err(|err| SchemaError::modifier(tags, err.to_string()))?,
                        );
                    }
                    "where" => predicate = Some(option.required_value(tags)?.to_string()),
                    other => {
                        return Err(SchemaError::modifier(
                            tags,
                            format!("unknown index option `{other}`"),
                        ));
                    }
                }
            }
        }
    }

    if !name.is_empty() {
        if let Some(mut index) = table.indexes.get_by_name(&name).cloned() {
            if !index.key_columns().any(|c| c == column) {
                index.parts.push(IndexPart::Column(column.to_string()));
            }
            index.unique |= unique;
            if method.is_some() {
                index.method = method;
            }
            if predicate.is_some() {
                index.predicate = predicate;
            }
            table.add_index(index);
            return Ok(());
        }
    }

    let mut index = Index::new(name, [column]);
    index.unique = unique;
    index.method = method;
    index.predicate = predicate;
    table.add_index(index);
    Ok(())
}

/// `references=[schema.]table.column`.
fn reference_shorthand(tags: &str, column: &str, target: &str) -> Result<Constraint> {
    let parts: Vec<&str> = target.split('.').map(str::trim).collect();
    let (schema, table, target_column) = match parts.as_slice() {
        [table, target_column] => ("", *table, *target_column),
        [schema, table, target_column] => (*schema, *table, *target_column),
        _ => {
            return Err(SchemaError::modifier(
                tags,
                format!("`references` expects [schema.]table.column, got {target:?}"),
            ));
        }
    };
    if table.is_empty() || target_column.is_empty() {
        return Err(SchemaError::modifier(
            tags,
            format!("`references` expects [schema.]table.column, got {target:?}"),
        ));
    }
    Ok(Constraint::foreign_key([column], schema, table, [target_column]))
}

/// `fk={table=..., column=..., ...}`.
fn foreign_key_block(tags: &str, column: &str, options: &[Modifier]) -> Result<Constraint> {
    let mut schema = "";
    let mut target = None;
    let mut target_column = None;
    let mut name = None;
    let mut on_delete = None;
    let mut on_update = None;
    let mut deferrable = None;

    for option in options {
        match option.key.as_str() {
            "schema" => schema = option.required_value(tags)?,
            "table" => target = Some(option.required_value(tags)?),
            "column" => target_column = Some(option.required_value(tags)?),
            "name" => name = Some(option.required_value(tags)?),
            "ondelete" => on_delete = Some(parse_action(tags, option.required_value(tags)?)?),
            "onupdate" => on_update = Some(parse_action(tags, option.required_value(tags)?)?),
            "deferrable" => deferrable = Some(false),
            "deferred" => deferrable = Some(true),
            other => {
                return Err(SchemaError::modifier(
                    tags,
                    format!("unknown foreign key option `{other}`"),
                ));
            }
        }
    }

    let target = target.ok_or_else(|| SchemaError::modifier(tags, "`fk` requires `table`"))?;
    let mut fk = Constraint::foreign_key([column], schema, target, [target_column.unwrap_or(column)]);
    if let Some(name) = name {
        fk.name = name.to_string();
    }
    if let Some(action) = on_delete {
        fk = fk.on_delete(action);
    }
    if let Some(action) = on_update {
        fk = fk.on_update(action);
    }
    if let Some(initially_deferred) = deferrable {
        fk = fk.deferrable(initially_deferred);
    }
    Ok(fk)
}

fn set_on_delete(table: &mut Table, name: &str, action: ReferentialAction) {
    if let Some(fk) = table.constraints.get_by_name(name).cloned() {
        table.add_constraint(fk.on_delete(action));
    }
}

fn parse_action(tags: &str, value: &str) -> Result<ReferentialAction> {
    ReferentialAction::from_str(value).map_err(|err| SchemaError::modifier(tags, err.to_string()))
}

fn parse_identity(tags: &str, value: &str) -> Result<IdentityKind> {
    match value.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
        "always" => Ok(IdentityKind::Always),
        "by_default" | "bydefault" => Ok(IdentityKind::ByDefault),
        other => Err(SchemaError::modifier(
            tags,
            format!("unknown identity kind {other:?}"),
        )),
    }
}

/// Builds a standalone column from a tag string. Modifiers that need a
/// table (keys, references, checks, indexes) are rejected.
///
/// ```rust
/// use oxide_ddl::tags::column_from_tags;
///
/// let col = column_from_tags("created_at", "type=timestamp, notnull, default=CURRENT_TIMESTAMP").unwrap();
/// assert!(col.not_null);
/// ```
pub fn column_from_tags(name: &str, tags: &str) -> Result<Column> {
    let mut scratch = Table::new("", "");
    apply_column_tags(&mut scratch, name, tags)?;
    if !scratch.constraints.is_empty() || !scratch.indexes.is_empty() {
        return Err(SchemaError::modifier(
            tags,
            "key, reference, check and index modifiers need a table",
        ));
    }
    scratch
        .get_column(name)
        .cloned()
        .ok_or_else(|| SchemaError::Internal(format!("column {name:?} vanished while applying tags")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_tokenizer_respects_nesting() {
        let mods = parse_modifiers(
            "type=varchar(255), default='a, b', fk={table=t, column=id, ondelete=set null}",
        )
        .unwrap();
        assert_eq!(mods.len(), 3);
        assert_eq!(mods[0], Modifier::with_value("type", "varchar(255)"));
        assert_eq!(mods[1], Modifier::with_value("default", "'a, b'"));
        assert_eq!(
            mods[2],
            Modifier::with_value("fk", "table=t, column=id, ondelete=set null")
        );
        let nested = parse_modifiers(mods[2].value.as_deref().unwrap()).unwrap();
        assert_eq!(nested[2], Modifier::with_value("ondelete", "set null"));
    }

    #[test]
    fn test_tokenizer_keys_are_lowercased_and_empty_entries_skipped() {
        let mods = parse_modifiers(" NotNull ,, PK ").unwrap();
        assert_eq!(mods, vec![Modifier::flag("notnull"), Modifier::flag("pk")]);
        assert!(parse_modifiers("").unwrap().is_empty());
    }

    #[test]
    fn test_tokenizer_errors() {
        for input in ["check={a > 0", "default='abc", "type=int)", "check={a)}", "=1", "a b=1"] {
            let err = parse_modifiers(input).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidModifier { .. }),
                "{input}: {err}"
            );
        }
    }

    #[test]
    fn test_column_modifiers() {
        let mut table = Table::new("shop", "item");
        apply_column_tags(
            &mut table,
            "price",
            "type=numeric(10,2), notnull, default=0, collate=C",
        )
        .unwrap();
        apply_column_tags(&mut table, "total", "type=int, generated={price * 2}, virtual").unwrap();
        apply_column_tags(&mut table, "touched", "type=timestamp, onupdate").unwrap();

        let price = table.get_column("price").unwrap();
        assert_eq!(price.data_type, "numeric(10,2)");
        assert!(price.not_null);
        assert_eq!(price.default.as_deref(), Some("0"));
        assert_eq!(price.collation.as_deref(), Some("C"));

        let total = table.get_column("total").unwrap();
        let generated = total.generated.as_ref().unwrap();
        assert_eq!(generated.expression, "price * 2");
        assert!(!generated.stored);
        assert!(table.get_column("touched").unwrap().on_update_current_timestamp);
    }

    #[test]
    fn test_composite_keys_from_repeated_tags() {
        let mut table = Table::new("", "film_actor");
        apply_column_tags(&mut table, "actor_id", "type=int, pk").unwrap();
        apply_column_tags(&mut table, "film_id", "type=int, pk, unique=film_actor_pair").unwrap();
        apply_column_tags(&mut table, "actor_id", "unique=film_actor_pair").unwrap();

        let pk = table.primary_key().unwrap();
        assert_eq!(pk.columns, vec!["actor_id", "film_id"]);
        let pair = table.constraints.get_by_name("film_actor_pair").unwrap();
        assert_eq!(pair.columns, vec!["film_id", "actor_id"]);
        // Composite keys do not mark single columns.
        assert!(!table.get_column("actor_id").unwrap().is_primary_key);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_foreign_keys() {
        let mut table = Table::new("", "payment");
        apply_column_tags(&mut table, "customer_id", "type=int, references=sales.customer.id, ondelete=cascade").unwrap();
        apply_column_tags(
            &mut table,
            "staff_id",
            "type=int, fk={table=staff, name=payment_staff_fk, onupdate=restrict, deferred}",
        )
        .unwrap();

        let fk = table.constraints.get_by_name("payment_customer_id_fkey").unwrap();
        let target = fk.references.as_ref().unwrap();
        assert_eq!((target.schema.as_str(), target.table.as_str()), ("sales", "customer"));
        assert_eq!(target.columns, vec!["id"]);
        assert_eq!(target.on_delete, Some(ReferentialAction::Cascade));

        let staff = table.constraints.get_by_name("payment_staff_fk").unwrap();
        let target = staff.references.as_ref().unwrap();
        assert_eq!(target.columns, vec!["staff_id"]);
        assert_eq!(target.on_update, Some(ReferentialAction::Restrict));
        assert!(staff.deferrable && staff.initially_deferred);
    }

    #[test]
    fn test_indexes_and_checks() {
        let mut table = Table::new("public", "doc");
        apply_column_tags(&mut table, "body", "type=tsvector, index={name=doc_search_idx, using=gin}").unwrap();
        apply_column_tags(&mut table, "a", "type=int, index=doc_ab_idx, check={a > 0}").unwrap();
        apply_column_tags(&mut table, "b", "type=int, index=doc_ab_idx").unwrap();
        apply_column_tags(&mut table, "c", "type=int, index={unique, where={c > 0}}").unwrap();

        let search = table.indexes.get_by_name("doc_search_idx").unwrap();
        assert_eq!(search.method, Some(IndexMethod::Gin));
        let ab = table.indexes.get_by_name("doc_ab_idx").unwrap();
        assert_eq!(ab.key_columns().collect::<Vec<_>>(), vec!["a", "b"]);
        let c = table.indexes.get_by_name("doc_c_idx").unwrap();
        assert!(c.unique);
        assert_eq!(c.predicate.as_deref(), Some("c > 0"));
        assert_eq!(
            table.constraints.get_by_name("doc_a_check").unwrap().check.as_deref(),
            Some("a > 0")
        );
    }

    #[test]
    fn test_applier_errors() {
        let mut table = Table::new("", "t");
        let cases = [
            ("a", "notnull"),
            ("a", "type=int, frobnicate"),
            ("a", "type=int, notnull=yes"),
            ("a", "type=int, identity=sometimes"),
            ("a", "type=int, ondelete=cascade"),
            ("a", "type=int, fk={column=id}"),
            ("a", "type=int, references=nowhere"),
            ("a", "type=int, index={using=zigzag}"),
        ];
        for (column, tags) in cases {
            let err = apply_column_tags(&mut table, column, tags).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidModifier { .. }),
                "{tags}: {err}"
            );
        }
    }

    #[test]
    fn test_column_from_tags() {
        let col = column_from_tags("id", "type=bigint, identity=always").unwrap();
        assert_eq!(col.identity, Some(IdentityKind::Always));
        assert!(column_from_tags("id", "type=bigint, pk").is_err());
    }
}
