//! Table constraints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cache::Named;
use super::index::IndexPart;
use crate::error::{Result, SchemaError};
use crate::normalize::{normalize_expression, same_expression};

/// The kind of a table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `PRIMARY KEY`.
    PrimaryKey,
    /// `FOREIGN KEY`.
    ForeignKey,
    /// `UNIQUE`.
    Unique,
    /// `CHECK`.
    Check,
    /// `EXCLUDE`.
    Exclude,
}

impl ConstraintKind {
    /// SQL keyword for the kind.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Unique => "UNIQUE",
            Self::Check => "CHECK",
            Self::Exclude => "EXCLUDE",
        }
    }

    /// Suffix used for generated constraint names.
    #[must_use]
    pub const fn name_suffix(self) -> &'static str {
        match self {
            Self::PrimaryKey => "pkey",
            Self::ForeignKey => "fkey",
            Self::Unique => "key",
            Self::Check => "check",
            Self::Exclude => "excl",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `ON UPDATE` / `ON DELETE` action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    /// `NO ACTION`.
    NoAction,
    /// `RESTRICT`.
    Restrict,
    /// `CASCADE`.
    Cascade,
    /// `SET NULL`.
    SetNull,
    /// `SET DEFAULT`.
    SetDefault,
}

impl ReferentialAction {
    /// SQL spelling of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl FromStr for ReferentialAction {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        let words: Vec<String> = s
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        match words.join(" ").as_str() {
            "no action" | "noaction" => Ok(Self::NoAction),
            "restrict" => Ok(Self::Restrict),
            "cascade" => Ok(Self::Cascade),
            "set null" | "setnull" => Ok(Self::SetNull),
            "set default" | "setdefault" => Ok(Self::SetDefault),
            _ => Err(SchemaError::malformed(
                "referential action",
                format!("unknown action {s:?}"),
            )),
        }
    }
}

// NO ACTION is the implicit action in every dialect.
fn effective_action(action: Option<ReferentialAction>) -> ReferentialAction {
    action.unwrap_or(ReferentialAction::NoAction)
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyTarget {
    /// Referenced schema.
    pub schema: String,
    /// Referenced table.
    pub table: String,
    /// Referenced columns, parallel to the constraint columns.
    pub columns: Vec<String>,
    /// `ON UPDATE` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    /// `ON DELETE` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
}

/// One element of an `EXCLUDE` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionElement {
    /// Column or expression.
    pub part: IndexPart,
    /// Comparison operator, e.g. `=` or `&&`.
    pub operator: String,
}

/// Body of an `EXCLUDE` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    /// Index method, e.g. `gist`.
    pub method: String,
    /// Elements, in order.
    pub elements: Vec<ExclusionElement>,
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint name. Generated when left empty.
    pub name: String,
    /// Constraint kind.
    pub kind: ConstraintKind,
    /// Participating columns, in order.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Foreign key target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyTarget>,
    /// Raw boolean expression of a check constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Exclusion body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion: Option<Exclusion>,
    /// `DEFERRABLE`.
    #[serde(default)]
    pub deferrable: bool,
    /// `INITIALLY DEFERRED`.
    #[serde(default)]
    pub initially_deferred: bool,
    /// MySQL `NOT ENFORCED` check.
    #[serde(default)]
    pub not_enforced: bool,
    /// Postgres `NOT VALID`, honoured when the constraint is added to an
    /// existing table.
    #[serde(default)]
    pub not_valid: bool,
}

impl Named for Constraint {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Constraint {
    fn new(kind: ConstraintKind, columns: Vec<String>) -> Self {
        Self {
            name: String::new(),
            kind,
            columns,
            references: None,
            check: None,
            exclusion: None,
            deferrable: false,
            initially_deferred: false,
            not_enforced: false,
            not_valid: false,
        }
    }

    /// `PRIMARY KEY (columns)`.
    #[must_use]
    pub fn primary_key<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            ConstraintKind::PrimaryKey,
            columns.into_iter().map(Into::into).collect(),
        )
    }

    /// `UNIQUE (columns)`.
    #[must_use]
    pub fn unique<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            ConstraintKind::Unique,
            columns.into_iter().map(Into::into).collect(),
        )
    }

    /// `FOREIGN KEY (columns) REFERENCES schema.table (target_columns)`.
    #[must_use]
    pub fn foreign_key<S: Into<String>, T: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        schema: impl Into<String>,
        table: impl Into<String>,
        target_columns: impl IntoIterator<Item = T>,
    ) -> Self {
        let mut constraint = Self::new(
            ConstraintKind::ForeignKey,
            columns.into_iter().map(Into::into).collect(),
        );
        constraint.references = Some(ForeignKeyTarget {
            schema: schema.into(),
            table: table.into(),
            columns: target_columns.into_iter().map(Into::into).collect(),
            on_update: None,
            on_delete: None,
        });
        constraint
    }

    /// `CHECK (expression)`.
    #[must_use]
    pub fn check(expression: impl Into<String>) -> Self {
        let mut constraint = Self::new(ConstraintKind::Check, Vec::new());
        constraint.check = Some(expression.into());
        constraint
    }

    /// `EXCLUDE USING method (element WITH operator, ...)`.
    #[must_use]
    pub fn exclude(method: impl Into<String>, elements: Vec<ExclusionElement>) -> Self {
        let columns = elements
            .iter()
            .filter_map(|e| e.part.column().map(str::to_string))
            .collect();
        let mut constraint = Self::new(ConstraintKind::Exclude, columns);
        constraint.exclusion = Some(Exclusion {
            method: method.into(),
            elements,
        });
        constraint
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the foreign key `ON DELETE` action.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(target) = &mut self.references {
            target.on_delete = Some(action);
        }
        self
    }

    /// Sets the foreign key `ON UPDATE` action.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        if let Some(target) = &mut self.references {
            target.on_update = Some(action);
        }
        self
    }

    /// Marks the constraint `DEFERRABLE`, optionally `INITIALLY DEFERRED`.
    #[must_use]
    pub fn deferrable(mut self, initially_deferred: bool) -> Self {
        self.deferrable = true;
        self.initially_deferred = initially_deferred;
        self
    }

    /// Marks a check constraint `NOT ENFORCED`.
    #[must_use]
    pub fn not_enforced(mut self) -> Self {
        self.not_enforced = true;
        self
    }

    /// Marks the constraint `NOT VALID`.
    #[must_use]
    pub fn not_valid(mut self) -> Self {
        self.not_valid = true;
        self
    }

    /// The name generated for an unnamed constraint:
    /// `{table}_{columns}_{pkey|fkey|key|check|excl}`.
    #[must_use]
    pub fn default_name(&self, table: &str) -> String {
        if self.columns.is_empty() {
            format!("{table}_{}", self.kind.name_suffix())
        } else {
            format!("{table}_{}_{}", self.columns.join("_"), self.kind.name_suffix())
        }
    }

    /// Returns `true` for foreign keys.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        self.kind == ConstraintKind::ForeignKey
    }

    /// Returns the single column of a one-column constraint.
    #[must_use]
    pub fn single_column(&self) -> Option<&str> {
        match self.columns.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Checks the constraint against the columns of `table`.
    pub fn validate(&self, table: &str, has_column: impl Fn(&str) -> bool) -> Result<()> {
        let entity = || format!("constraint {table}.{}", self.name);
        if self.name.is_empty() {
            return Err(SchemaError::malformed(
                format!("table {table}"),
                "constraint with an empty name",
            ));
        }
        if let Some(c) = self.columns.iter().find(|c| !has_column(c.as_str())) {
            return Err(SchemaError::malformed(entity(), format!("unknown column {c:?}")));
        }
        if self.initially_deferred && !self.deferrable {
            return Err(SchemaError::malformed(
                entity(),
                "INITIALLY DEFERRED requires DEFERRABLE",
            ));
        }
        match self.kind {
            ConstraintKind::PrimaryKey | ConstraintKind::Unique if self.columns.is_empty() => {
                Err(SchemaError::malformed(entity(), "no columns"))
            }
            ConstraintKind::ForeignKey => {
                let Some(target) = &self.references else {
                    return Err(SchemaError::malformed(entity(), "foreign key without a target"));
                };
                if self.columns.is_empty() || target.table.is_empty() {
                    return Err(SchemaError::malformed(entity(), "incomplete foreign key"));
                }
                if target.columns.len() != self.columns.len() {
                    return Err(SchemaError::malformed(
                        entity(),
                        format!(
                            "{} columns reference {} target columns",
                            self.columns.len(),
                            target.columns.len()
                        ),
                    ));
                }
                Ok(())
            }
            ConstraintKind::Check => match &self.check {
                Some(expr) if !expr.trim().is_empty() => Ok(()),
                _ => Err(SchemaError::malformed(entity(), "check without an expression")),
            },
            ConstraintKind::Exclude => match &self.exclusion {
                Some(ex) if !ex.elements.is_empty() => Ok(()),
                _ => Err(SchemaError::malformed(entity(), "exclusion without elements")),
            },
            _ => Ok(()),
        }
    }

    /// Compares every semantically significant field. `NOT VALID` only
    /// affects how the constraint is added and is ignored.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.columns == other.columns
            && same_target(self.references.as_ref(), other.references.as_ref())
            && same_expression(self.check.as_deref(), other.check.as_deref())
            && same_exclusion(self.exclusion.as_ref(), other.exclusion.as_ref())
            && self.deferrable == other.deferrable
            && self.initially_deferred == other.initially_deferred
            && self.not_enforced == other.not_enforced
    }
}

fn same_target(a: Option<&ForeignKeyTarget>, b: Option<&ForeignKeyTarget>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.schema == b.schema
                && a.table == b.table
                && a.columns == b.columns
                && effective_action(a.on_update) == effective_action(b.on_update)
                && effective_action(a.on_delete) == effective_action(b.on_delete)
        }
        _ => false,
    }
}

fn same_exclusion(a: Option<&Exclusion>, b: Option<&Exclusion>) -> bool {
    let part_key = |p: &IndexPart| match p {
        IndexPart::Column(c) => c.clone(),
        IndexPart::Expression(e) => normalize_expression(e),
    };
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.method.eq_ignore_ascii_case(&b.method)
                && a.elements.len() == b.elements.len()
                && a.elements.iter().zip(&b.elements).all(|(x, y)| {
                    x.operator == y.operator && part_key(&x.part) == part_key(&y.part)
                })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(cols: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |c| cols.iter().any(|known| *known == c)
    }

    #[test]
    fn test_default_names() {
        assert_eq!(Constraint::primary_key(["id"]).default_name("actor"), "actor_id_pkey");
        assert_eq!(
            Constraint::foreign_key(["a", "b"], "public", "t1", ["x", "y"]).default_name("t2"),
            "t2_a_b_fkey"
        );
        assert_eq!(Constraint::unique(["email"]).default_name("users"), "users_email_key");
        assert_eq!(Constraint::check("price > 0").default_name("items"), "items_check");
    }

    #[test]
    fn test_validate_foreign_key_arity() {
        let fk = Constraint::foreign_key(["a", "b"], "public", "t1", ["x"]).named("fk");
        let err = fk.validate("t2", has(&["a", "b"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed constraint t2.fk: 2 columns reference 1 target columns"
        );
    }

    #[test]
    fn test_validate_unknown_column_and_deferral() {
        let pk = Constraint::primary_key(["id"]).named("pk");
        assert!(pk.validate("t", has(&["id"])).is_ok());
        assert!(pk.validate("t", has(&["other"])).is_err());

        let mut bad = pk.clone();
        bad.initially_deferred = true;
        let err = bad.validate("t", has(&["id"])).unwrap_err();
        assert!(err.to_string().contains("INITIALLY DEFERRED requires DEFERRABLE"));
    }

    #[test]
    fn test_check_requires_expression() {
        let chk = Constraint::check("  ").named("c");
        assert!(chk.validate("t", has(&[])).is_err());
    }

    #[test]
    fn test_referential_action_parsing() {
        assert_eq!(
            "SET NULL".parse::<ReferentialAction>().unwrap(),
            ReferentialAction::SetNull
        );
        assert_eq!(
            "no_action".parse::<ReferentialAction>().unwrap(),
            ReferentialAction::NoAction
        );
        assert!("explode".parse::<ReferentialAction>().is_err());
    }

    #[test]
    fn test_same_definition_defaults_actions() {
        let a = Constraint::foreign_key(["a"], "s", "t", ["id"]).named("fk");
        let b = a.clone().on_delete(ReferentialAction::NoAction).not_valid();
        assert!(a.same_definition(&b));
        let c = a.clone().on_delete(ReferentialAction::Cascade);
        assert!(!a.same_definition(&c));
    }

    #[test]
    fn test_exclusion_columns_are_collected() {
        let ex = Constraint::exclude(
            "gist",
            vec![
                ExclusionElement {
                    part: IndexPart::Column("room".into()),
                    operator: "=".into(),
                },
                ExclusionElement {
                    part: IndexPart::Expression("tsrange(starts, ends)".into()),
                    operator: "&&".into(),
                },
            ],
        );
        assert_eq!(ex.columns, vec!["room".to_string()]);
        assert_eq!(ex.default_name("booking"), "booking_room_excl");
    }
}
