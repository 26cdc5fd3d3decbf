//! Views and materialized views.

use super::{trim_statement, DropTarget, Renderer};
use crate::dialect::Feature;
use crate::error::Result;
use crate::migrate::{CreateView, DropView};

impl Renderer {
    /// `CREATE [OR REPLACE] [MATERIALIZED] VIEW`. Indexes and triggers on a
    /// materialized view are separate commands.
    pub(super) fn create_view(&self, op: &CreateView) -> Result<String> {
        let view = &op.view;
        if view.materialized {
            self.require(Feature::MaterializedViews)?;
        }
        if op.or_replace {
            if view.materialized {
                return Err(self.unsupported("CREATE OR REPLACE MATERIALIZED VIEW"));
            }
            self.require(Feature::CreateOrReplaceView)?;
        }
        let columns = if view.columns.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.ident_list(&view.columns))
        };
        Ok(format!(
            "CREATE {}{}VIEW {}{columns} AS {}",
            if op.or_replace { "OR REPLACE " } else { "" },
            if view.materialized { "MATERIALIZED " } else { "" },
            self.qualified(&view.schema, &view.name),
            trim_statement(&view.query)
        ))
    }

    pub(super) fn drop_view(&self, op: &DropView) -> Result<String> {
        if op.materialized {
            self.require(Feature::MaterializedViews)?;
        }
        Ok(format!(
            "DROP {}VIEW {}{}",
            if op.materialized { "MATERIALIZED " } else { "" },
            self.qualified(&op.schema, &op.name),
            self.cascade(op.cascade, DropTarget::View)?
        ))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::View;
    use crate::dialect::Dialect;
    use crate::migrate::Command;

    fn active() -> View {
        let mut view = View::new("active_customer", "SELECT id, email FROM customer WHERE active;");
        view.schema = "public".into();
        view
    }

    #[test]
    fn test_create_view() {
        let cmd = Command::create_view(active().columns(["id", "email"]), true);
        assert_eq!(
            Renderer::new(Dialect::Postgres).render(&cmd).unwrap(),
            vec!["CREATE OR REPLACE VIEW public.active_customer (id, email) AS SELECT id, email FROM customer WHERE active"]
        );
        assert!(Renderer::new(Dialect::Sqlite).render(&cmd).unwrap_err().is_unsupported());

        let mut plain = active();
        plain.schema.clear();
        assert_eq!(
            Renderer::new(Dialect::Sqlite)
                .render(&Command::create_view(plain, false))
                .unwrap(),
            vec!["CREATE VIEW active_customer AS SELECT id, email FROM customer WHERE active"]
        );
    }

    #[test]
    fn test_materialized_views() {
        let mat = active().materialized();
        assert_eq!(
            Renderer::new(Dialect::Postgres)
                .render(&Command::create_view(mat.clone(), false))
                .unwrap(),
            vec!["CREATE MATERIALIZED VIEW public.active_customer AS SELECT id, email FROM customer WHERE active"]
        );
        let err = Renderer::new(Dialect::Postgres)
            .render(&Command::create_view(mat.clone(), true))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "postgres does not support CREATE OR REPLACE MATERIALIZED VIEW"
        );
        assert!(Renderer::new(Dialect::Mysql)
            .render(&Command::create_view(mat.clone(), false))
            .is_err());
        assert_eq!(
            Renderer::new(Dialect::Postgres)
                .render(&Command::drop_view(&mat, true))
                .unwrap(),
            vec!["DROP MATERIALIZED VIEW public.active_customer CASCADE"]
        );
    }
}
