//! Table constraints.

use super::{DropTarget, Renderer};
use crate::catalog::{Constraint, ConstraintKind, IndexPart};
use crate::dialect::{Dialect, Feature};
use crate::error::{Result, SchemaError};
use crate::ident::is_parenthesized;
use crate::migrate::{AddConstraint, DropConstraint, RenameConstraint};

impl Renderer {
    /// A constraint as it appears inside `CREATE TABLE` or after
    /// `ADD`.
    pub(crate) fn constraint_definition(&self, constraint: &Constraint) -> Result<String> {
        let entity = || format!("constraint {}", constraint.name);
        let mut sql = String::new();
        // MySQL always names the primary key PRIMARY.
        if !(self.dialect == Dialect::Mysql && constraint.kind == ConstraintKind::PrimaryKey) {
            sql.push_str("CONSTRAINT ");
            sql.push_str(&self.ident(&constraint.name));
            sql.push(' ');
        }

        match constraint.kind {
            ConstraintKind::PrimaryKey => {
                sql.push_str(&format!("PRIMARY KEY ({})", self.ident_list(&constraint.columns)));
            }
            ConstraintKind::Unique => {
                sql.push_str(&format!("UNIQUE ({})", self.ident_list(&constraint.columns)));
            }
            ConstraintKind::ForeignKey => {
                let target = constraint
                    .references
                    .as_ref()
                    .ok_or_else(|| SchemaError::malformed(entity(), "foreign key without a target"))?;
                sql.push_str(&format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.ident_list(&constraint.columns),
                    self.qualified(&target.schema, &target.table),
                    self.ident_list(&target.columns)
                ));
                if let Some(action) = target.on_update {
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(action.as_sql());
                }
                if let Some(action) = target.on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.as_sql());
                }
            }
            ConstraintKind::Check => {
                let expr = constraint
                    .check
                    .as_deref()
                    .ok_or_else(|| SchemaError::malformed(entity(), "check without an expression"))?;
                sql.push_str(&format!("CHECK ({})", expr.trim()));
            }
            ConstraintKind::Exclude => {
                self.require(Feature::ExcludeConstraints)?;
                let exclusion = constraint
                    .exclusion
                    .as_ref()
                    .ok_or_else(|| SchemaError::malformed(entity(), "exclusion without elements"))?;
                let elements: Vec<String> = exclusion
                    .elements
                    .iter()
                    .map(|e| {
                        let part = match &e.part {
                            IndexPart::Column(c) => self.ident(c),
                            IndexPart::Expression(x) if is_parenthesized(x) => x.trim().to_string(),
                            IndexPart::Expression(x) => format!("({})", x.trim()),
                        };
                        format!("{part} WITH {}", e.operator)
                    })
                    .collect();
                sql.push_str(&format!(
                    "EXCLUDE USING {} ({})",
                    exclusion.method,
                    elements.join(", ")
                ));
            }
        }

        if constraint.not_enforced {
            if constraint.kind != ConstraintKind::Check {
                return Err(SchemaError::malformed(
                    entity(),
                    "NOT ENFORCED applies to CHECK constraints only",
                ));
            }
            self.require(Feature::NotEnforcedConstraints)?;
            sql.push_str(" NOT ENFORCED");
        }

        if constraint.deferrable || constraint.initially_deferred {
            self.require(Feature::DeferrableConstraints)?;
            if constraint.kind == ConstraintKind::Check {
                return Err(self.unsupported("DEFERRABLE CHECK constraints"));
            }
            sql.push_str(" DEFERRABLE");
            if constraint.initially_deferred {
                sql.push_str(" INITIALLY DEFERRED");
            }
        }
        Ok(sql)
    }

    pub(super) fn add_constraint(&self, op: &AddConstraint) -> Result<String> {
        self.require(Feature::AddConstraint)?;
        let mut sql = format!(
            "ALTER TABLE {} ADD {}",
            self.qualified(&op.schema, &op.table),
            self.constraint_definition(&op.constraint)?
        );
        if op.constraint.not_valid {
            self.require(Feature::NotValidConstraints)?;
            if !matches!(
                op.constraint.kind,
                ConstraintKind::ForeignKey | ConstraintKind::Check
            ) {
                return Err(SchemaError::malformed(
                    format!("constraint {}", op.constraint.name),
                    "NOT VALID applies to FOREIGN KEY and CHECK constraints only",
                ));
            }
            sql.push_str(" NOT VALID");
        }
        Ok(sql)
    }

    pub(super) fn drop_constraint(&self, op: &DropConstraint) -> Result<String> {
        self.require(Feature::DropConstraint)?;
        let table = self.qualified(&op.schema, &op.table);
        let name = self.ident(&op.constraint.name);
        let cascade = self.cascade(op.cascade, DropTarget::Constraint)?;
        if self.dialect != Dialect::Mysql {
            return Ok(format!("ALTER TABLE {table} DROP CONSTRAINT {name}{cascade}"));
        }
        let target = match op.constraint.kind {
            ConstraintKind::PrimaryKey => "PRIMARY KEY".to_string(),
            ConstraintKind::ForeignKey => format!("FOREIGN KEY {name}"),
            ConstraintKind::Unique => format!("INDEX {name}"),
            ConstraintKind::Check => format!("CHECK {name}"),
            ConstraintKind::Exclude => {
                return Err(self.unsupported(Feature::ExcludeConstraints.description()));
            }
        };
        Ok(format!("ALTER TABLE {table} DROP {target}"))
    }

    pub(super) fn rename_constraint(&self, op: &RenameConstraint) -> Result<String> {
        self.require(Feature::RenameConstraint)?;
        Ok(format!(
            "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
            self.qualified(&op.schema, &op.table),
            self.ident(&op.from),
            self.ident(&op.to)
        ))
    }
}
