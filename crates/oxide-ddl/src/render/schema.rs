//! Schemas.

use super::{DropTarget, Renderer};
use crate::dialect::Feature;
use crate::error::{Result, SchemaError};
use crate::migrate::{CreateSchema, DropSchema};

impl Renderer {
    pub(super) fn create_schema(&self, op: &CreateSchema) -> Result<String> {
        self.require(Feature::Schemas)?;
        if op.name.is_empty() {
            return Err(SchemaError::malformed("schema", "empty schema name"));
        }
        Ok(format!("CREATE SCHEMA IF NOT EXISTS {}", self.ident(&op.name)))
    }

    pub(super) fn drop_schema(&self, op: &DropSchema) -> Result<String> {
        self.require(Feature::Schemas)?;
        if op.name.is_empty() {
            return Err(SchemaError::malformed("schema", "empty schema name"));
        }
        Ok(format!(
            "DROP SCHEMA {}{}",
            self.ident(&op.name),
            self.cascade(op.cascade, DropTarget::Schema)?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::migrate::Command;

    #[test]
    fn test_schema_statements() {
        let pg = Renderer::new(Dialect::Postgres);
        assert_eq!(
            pg.render(&Command::create_schema("sales")).unwrap(),
            vec!["CREATE SCHEMA IF NOT EXISTS sales"]
        );
        assert_eq!(
            pg.render(&Command::drop_schema("sales", true)).unwrap(),
            vec!["DROP SCHEMA sales CASCADE"]
        );
        assert!(pg.render(&Command::create_schema("")).is_err());

        let my = Renderer::new(Dialect::Mysql);
        assert_eq!(
            my.render(&Command::drop_schema("sales", false)).unwrap(),
            vec!["DROP SCHEMA sales"]
        );
        assert!(my.render(&Command::drop_schema("sales", true)).is_err());

        let err = Renderer::new(Dialect::Sqlite)
            .render(&Command::create_schema("sales"))
            .unwrap_err();
        assert_eq!(err.to_string(), "sqlite does not support schemas");
    }
}
