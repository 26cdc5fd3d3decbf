//! Functions, procedures and triggers.
//!
//! Both are kept as raw source and rendered close to verbatim.

use std::sync::LazyLock;

use regex::Regex;

use super::{trim_statement, DropTarget, Renderer};
use crate::catalog::Trigger;
use crate::dialect::{Dialect, Feature};
use crate::error::Result;
use crate::migrate::{CreateFunction, DropFunction, DropTrigger};

static CREATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?").expect("create prefix pattern is valid")
});

impl Renderer {
    pub(super) fn create_function(&self, op: &CreateFunction) -> Result<String> {
        self.require(Feature::StoredFunctions)?;
        let source = trim_statement(&op.function.source);
        if !op.or_replace {
            return Ok(source.to_string());
        }
        self.require(Feature::CreateOrReplaceFunction)?;
        Ok(CREATE_PREFIX
            .replace(source, "CREATE OR REPLACE ")
            .into_owned())
    }

    pub(super) fn drop_function(&self, op: &DropFunction) -> Result<String> {
        self.require(Feature::StoredFunctions)?;
        let function = &op.function;
        let name = self.qualified(&function.schema, &function.name);
        let signature = if self.dialect == Dialect::Postgres {
            format!("({})", function.identity_args().join(", "))
        } else {
            String::new()
        };
        Ok(format!(
            "DROP {} {name}{signature}{}",
            function.kind.as_sql(),
            self.cascade(op.cascade, DropTarget::Function)?
        ))
    }

    pub(super) fn create_trigger(&self, trigger: &Trigger) -> String {
        trim_statement(&trigger.source).to_string()
    }

    pub(super) fn drop_trigger(&self, op: &DropTrigger) -> Result<String> {
        let trigger = &op.trigger;
        let cascade = self.cascade(op.cascade, DropTarget::Trigger)?;
        Ok(match self.dialect {
            Dialect::Postgres => format!(
                "DROP TRIGGER {} ON {}{cascade}",
                self.ident(&trigger.name),
                self.qualified(&trigger.table_schema, &trigger.table_name)
            ),
            Dialect::Mysql | Dialect::Sqlite => format!(
                "DROP TRIGGER {}",
                self.qualified(&trigger.table_schema, &trigger.name)
            ),
        })
    }
}
