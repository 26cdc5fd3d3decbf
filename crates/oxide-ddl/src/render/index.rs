//! Indexes.

use super::{DropTarget, Renderer};
use crate::catalog::{Index, IndexMethod, IndexPart};
use crate::dialect::{Dialect, Feature};
use crate::error::{Result, SchemaError};
use crate::ident::is_parenthesized;
use crate::migrate::DropIndex;

impl Renderer {
    /// Checks the parts of `index` this dialect cannot express.
    fn check_index(&self, index: &Index) -> Result<()> {
        if !index.include.is_empty() {
            self.require(Feature::IncludeColumns)?;
        }
        if index.predicate.is_some() {
            self.require(Feature::PartialIndexes)?;
        }
        if let Some(method) = index.method {
            self.require(Feature::IndexMethods)?;
            let valid = match self.dialect {
                Dialect::Postgres => !matches!(method, IndexMethod::Fulltext | IndexMethod::Spatial),
                Dialect::Mysql => matches!(
                    method,
                    IndexMethod::Btree | IndexMethod::Hash | IndexMethod::Fulltext | IndexMethod::Spatial
                ),
                Dialect::Sqlite => false,
            };
            if !valid {
                return Err(self.unsupported(format!("{method} indexes")));
            }
            if index.unique && matches!(method, IndexMethod::Fulltext | IndexMethod::Spatial) {
                return Err(SchemaError::malformed(
                    format!("index {}", index.name),
                    format!("a {method} index cannot be UNIQUE"),
                ));
            }
        }
        Ok(())
    }

    fn index_parts(&self, index: &Index) -> String {
        index
            .parts
            .iter()
            .map(|part| match part {
                IndexPart::Column(c) => self.ident(c),
                IndexPart::Expression(e) => parenthesize(e),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE INDEX` as a standalone statement.
    pub fn create_index(&self, index: &Index, concurrently: bool) -> Result<String> {
        self.check_index(index)?;
        if concurrently {
            self.require(Feature::IndexConcurrently)?;
        }
        let table = self.qualified(&index.table_schema, &index.table_name);
        let parts = self.index_parts(index);

        let sql = match self.dialect {
            Dialect::Postgres => {
                let mut sql = format!(
                    "CREATE {}INDEX {}{} ON {table}",
                    if index.unique { "UNIQUE " } else { "" },
                    if concurrently { "CONCURRENTLY " } else { "" },
                    self.ident(&index.name)
                );
                if let Some(method) = index.method {
                    sql.push_str(&format!(" USING {}", method.as_sql().to_ascii_lowercase()));
                }
                sql.push_str(&format!(" ({parts})"));
                if !index.include.is_empty() {
                    sql.push_str(&format!(" INCLUDE ({})", self.ident_list(&index.include)));
                }
                if let Some(predicate) = &index.predicate {
                    sql.push_str(&format!(" WHERE {}", predicate.trim()));
                }
                sql
            }
            Dialect::Mysql => {
                let mut sql = format!(
                    "CREATE {}INDEX {} ON {table} ({parts})",
                    mysql_index_prefix(index),
                    self.ident(&index.name)
                );
                if let Some(method @ (IndexMethod::Btree | IndexMethod::Hash)) = index.method {
                    sql.push_str(&format!(" USING {}", method.as_sql()));
                }
                sql
            }
            Dialect::Sqlite => {
                let mut sql = format!(
                    "CREATE {}INDEX {} ON {} ({parts})",
                    if index.unique { "UNIQUE " } else { "" },
                    self.qualified(&index.table_schema, &index.name),
                    self.ident(&index.table_name)
                );
                if let Some(predicate) = &index.predicate {
                    sql.push_str(&format!(" WHERE {}", predicate.trim()));
                }
                sql
            }
        };
        Ok(sql)
    }

    /// An index declared inside MySQL's `CREATE TABLE`.
    pub(crate) fn inline_index_definition(&self, index: &Index) -> Result<String> {
        self.require(Feature::InlineIndexes)?;
        self.check_index(index)?;
        let mut sql = format!(
            "{}INDEX {} ({})",
            mysql_index_prefix(index),
            self.ident(&index.name),
            self.index_parts(index)
        );
        if let Some(method @ (IndexMethod::Btree | IndexMethod::Hash)) = index.method {
            sql.push_str(&format!(" USING {}", method.as_sql()));
        }
        Ok(sql)
    }

    pub(super) fn drop_index(&self, op: &DropIndex) -> Result<String> {
        if op.concurrently {
            self.require(Feature::IndexConcurrently)?;
        }
        let cascade = self.cascade(op.cascade, DropTarget::Index)?;
        let index = &op.index;
        Ok(match self.dialect {
            Dialect::Postgres => format!(
                "DROP INDEX {}{}{cascade}",
                if op.concurrently { "CONCURRENTLY " } else { "" },
                self.qualified(&index.table_schema, &index.name)
            ),
            Dialect::Mysql => format!(
                "DROP INDEX {} ON {}",
                self.ident(&index.name),
                self.qualified(&index.table_schema, &index.table_name)
            ),
            Dialect::Sqlite => format!(
                "DROP INDEX {}",
                self.qualified(&index.table_schema, &index.name)
            ),
        })
    }
}

fn mysql_index_prefix(index: &Index) -> &'static str {
    match index.method {
        Some(IndexMethod::Fulltext) => "FULLTEXT ",
        Some(IndexMethod::Spatial) => "SPATIAL ",
        _ if index.unique => "UNIQUE ",
        _ => "",
    }
}

fn parenthesize(expr: &str) -> String {
    let expr = expr.trim();
    if is_parenthesized(expr) {
        expr.to_string()
    } else {
        format!("({expr})")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::migrate::Command;

    fn email_idx() -> Index {
        Index::new("customer_email_idx", ["email"]).on_table("public", "customer")
    }

    #[test]
    fn test_postgres_index_options() {
        let index = email_idx()
            .unique()
            .using(IndexMethod::Btree)
            .include(["name"])
            .predicate("deleted_at IS NULL");
        let pg = Renderer::new(Dialect::Postgres);
        assert_eq!(
            pg.render(&Command::create_index(index).concurrently()).unwrap(),
            vec![
                "CREATE UNIQUE INDEX CONCURRENTLY customer_email_idx ON public.customer USING btree (email) INCLUDE (name) WHERE deleted_at IS NULL"
            ]
        );
    }

    #[test]
    fn test_expression_parts() {
        let index = Index::new("lower_email_idx", Vec::<String>::new())
            .expression("lower(email)")
            .on_table("", "customer");
        for dialect in Dialect::ALL {
            assert_eq!(
                Renderer::new(dialect).create_index(&index, false).unwrap(),
                "CREATE INDEX lower_email_idx ON customer ((lower(email)))"
            );
        }
    }

    #[test]
    fn test_mysql_fulltext_and_hash() {
        let ft = Index::new("body_ft", ["body"])
            .using(IndexMethod::Fulltext)
            .on_table("", "post");
        assert_eq!(
            Renderer::new(Dialect::Mysql).create_index(&ft, false).unwrap(),
            "CREATE FULLTEXT INDEX body_ft ON post (body)"
        );
        let hash = Index::new("code_idx", ["code"]).using(IndexMethod::Hash).on_table("", "post");
        assert_eq!(
            Renderer::new(Dialect::Mysql).inline_index_definition(&hash).unwrap(),
            "INDEX code_idx (code) USING HASH"
        );
        assert!(Renderer::new(Dialect::Postgres).create_index(&ft, false).is_err());
    }

    #[test]
    fn test_index_feature_gating() {
        let gin = Index::new("tags_idx", ["tags"]).using(IndexMethod::Gin).on_table("", "post");
        assert!(Renderer::new(Dialect::Mysql).create_index(&gin, false).unwrap_err().is_unsupported());
        assert!(Renderer::new(Dialect::Sqlite).create_index(&gin, false).unwrap_err().is_unsupported());

        let partial = Index::new("p", ["a"]).predicate("a > 0").on_table("", "t");
        assert!(Renderer::new(Dialect::Mysql).create_index(&partial, false).is_err());
        assert_eq!(
            Renderer::new(Dialect::Sqlite).create_index(&partial, false).unwrap(),
            "CREATE INDEX p ON t (a) WHERE a > 0"
        );

        let include = Index::new("i", ["a"]).include(["b"]).on_table("", "t");
        assert!(Renderer::new(Dialect::Sqlite).create_index(&include, false).is_err());
        assert!(Renderer::new(Dialect::Mysql).create_index(&email_idx(), true).is_err());
    }

    #[test]
    fn test_drop_index_per_dialect() {
        let cmd = Command::drop_index(email_idx(), false);
        assert_eq!(
            Renderer::new(Dialect::Postgres).render(&cmd).unwrap(),
            vec!["DROP INDEX public.customer_email_idx"]
        );
        assert_eq!(
            Renderer::new(Dialect::Mysql).render(&cmd).unwrap(),
            vec!["DROP INDEX customer_email_idx ON public.customer"]
        );
        let lite = Command::drop_index(Index::new("i", ["a"]).on_table("", "t"), false);
        assert_eq!(Renderer::new(Dialect::Sqlite).render(&lite).unwrap(), vec!["DROP INDEX i"]);

        let cascade = Command::drop_index(email_idx(), true).concurrently();
        assert_eq!(
            Renderer::new(Dialect::Postgres).render(&cascade).unwrap(),
            vec!["DROP INDEX CONCURRENTLY public.customer_email_idx CASCADE"]
        );
    }
}
