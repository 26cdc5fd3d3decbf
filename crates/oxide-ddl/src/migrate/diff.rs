//! Catalog diff engine.
//!
//! Compares the current catalog ("got") with the desired one ("want") and
//! produces a [`Plan`] whose phases, executed in order, turn the former into
//! the latter. What may be emitted is controlled by [`Mode`]:
//!
//! - entities of want absent from got are created (`CREATE_MISSING`),
//! - entities present in both but different are altered or replaced
//!   (`UPDATE_EXISTING`),
//! - entities of got absent from want are dropped (`DROP_EXTRANEOUS`), with
//!   `CASCADE` where the dialect allows it (`DROP_CASCADE`).
//!
//! Equality is semantic: caches and derived key flags are ignored, types
//! are compared after dialect normalization and expressions after
//! whitespace and case folding.

use std::collections::BTreeSet;

use super::command::{ColumnChange, Command};
use super::mode::Mode;
use super::plan::{Phase, Plan};
use crate::catalog::{
    same_generated, Catalog, Column, Constraint, ConstraintKind, Function, Index, NamedList,
    Schema, Table, Trigger, View,
};
use crate::dialect::{Dialect, Feature};
use crate::error::{Result, SchemaError};
use crate::normalize::{normalize_type, same_expression};

/// Computes the plan that turns `got` into `want`.
///
/// Both catalogs are validated first; the first malformed entity or a
/// dialect mismatch aborts the diff.
///
/// ```rust
/// use oxide_ddl::catalog::{Catalog, Column, Table};
/// use oxide_ddl::migrate::{diff, Mode, Phase};
/// use oxide_ddl::Dialect;
///
/// let got = Catalog::new(Dialect::Postgres);
/// let mut want = Catalog::new(Dialect::Postgres);
/// want.add_table(Table::new("", "t1").column(Column::new("id", "int")));
///
/// let plan = diff(&got, &want, Mode::CREATE_MISSING).unwrap();
/// assert_eq!(plan.phase(Phase::CreateTables).len(), 1);
/// ```
pub fn diff(got: &Catalog, want: &Catalog, mode: Mode) -> Result<Plan> {
    if got.dialect != want.dialect {
        return Err(SchemaError::DialectMismatch {
            got: got.dialect,
            want: want.dialect,
        });
    }
    got.validate()?;
    want.validate()?;

    let empty = Schema::new(String::new());
    let mut differ = Differ {
        dialect: want.dialect,
        mode,
        plan: Plan::new(want.dialect),
        dropped_tables: Vec::new(),
        dropped_keys: Vec::new(),
    };

    for want_schema in &want.schemas {
        let got_schema = got.schemas.get_by_name(&want_schema.name);
        if got_schema.is_none() && mode.creates() && differ.is_named_schema(&want_schema.name) {
            differ.push(Phase::CreateSchemas, Command::create_schema(&want_schema.name));
        }
        differ.schema(got_schema.unwrap_or(&empty), want_schema)?;
    }

    if mode.drops() {
        for got_schema in &got.schemas {
            if want.schemas.contains(&got_schema.name) {
                continue;
            }
            differ.schema(got_schema, &empty)?;
            if differ.is_named_schema(&got_schema.name) {
                let cascade = differ.cascade(false);
                differ.push(
                    Phase::DropSchemas,
                    Command::drop_schema(&got_schema.name, cascade),
                );
            }
        }
    }

    differ.rebuild_referencing_foreign_keys(got, want)?;
    differ.drop_tables()?;
    tracing::debug!(
        dialect = %differ.dialect,
        commands = differ.plan.len(),
        "Computed migration plan"
    );
    Ok(differ.plan)
}

struct Differ<'a> {
    dialect: Dialect,
    mode: Mode,
    plan: Plan,
    /// Tables to drop, in got order. Emitted last, once their mutual
    /// references are known.
    dropped_tables: Vec<&'a Table>,
    /// Primary and unique keys dropped from tables that survive.
    dropped_keys: Vec<DroppedKey>,
}

struct DroppedKey {
    schema: String,
    table: String,
    kind: ConstraintKind,
    columns: Vec<String>,
}

impl<'a> Differ<'a> {
    fn push(&mut self, phase: Phase, command: Command) {
        self.plan.push(phase, command);
    }

    /// Schemas other than the empty name and the dialect default are
    /// created and dropped explicitly.
    fn is_named_schema(&self, name: &str) -> bool {
        !name.is_empty() && name != self.dialect.default_schema()
    }

    /// Whether a drop carries `CASCADE`. MySQL only cascades drops of
    /// tables and views.
    fn cascade(&self, relation: bool) -> bool {
        self.mode.cascades()
            && self.dialect.supports(Feature::DropCascade)
            && (relation || self.dialect != Dialect::Mysql)
    }

    fn schema(&mut self, got: &'a Schema, want: &Schema) -> Result<()> {
        self.functions(got, want)?;
        self.tables(got, want)?;
        self.views(got, want)?;
        Ok(())
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn functions(&mut self, got: &Schema, want: &Schema) -> Result<()> {
        let dialect = self.dialect;
        for function in &want.functions {
            let existing = got
                .functions
                .find_by(&function.name, |f| f.same_signature(function, dialect))
                .and_then(|pos| got.functions.get(pos));
            match existing {
                None if self.mode.creates() => self.create_function(function, false),
                Some(current) if self.mode.updates() && !current.same_definition(function) => {
                    if dialect.supports(Feature::CreateOrReplaceFunction) {
                        self.create_function(function, true);
                    } else {
                        let cascade = self.cascade(false);
                        self.push(
                            Phase::DropFunctions,
                            Command::drop_function(current.clone(), cascade),
                        );
                        self.create_function(function, false);
                    }
                }
                _ => {}
            }
        }

        if self.mode.drops() {
            for function in &got.functions {
                let kept = want
                    .functions
                    .find_by(&function.name, |f| f.same_signature(function, dialect))
                    .is_some();
                if !kept {
                    let cascade = self.cascade(false);
                    self.push(
                        Phase::DropFunctions,
                        Command::drop_function(function.clone(), cascade),
                    );
                }
            }
        }
        Ok(())
    }

    fn create_function(&mut self, function: &Function, or_replace: bool) {
        let phase = if function.independent {
            Phase::CreateIndependentFunctions
        } else {
            Phase::CreateDependentFunctions
        };
        self.push(phase, Command::create_function(function.clone(), or_replace));
    }

    // ========================================================================
    // Tables
    // ========================================================================

    fn tables(&mut self, got: &'a Schema, want: &Schema) -> Result<()> {
        for table in &want.tables {
            match got.tables.get_by_name(&table.name) {
                None if self.mode.creates() => self.create_table(table),
                Some(current) => self.update_table(current, table)?,
                _ => {}
            }
        }
        if self.mode.drops() {
            for table in &got.tables {
                if !want.tables.contains(&table.name) {
                    self.dropped_tables.push(table);
                }
            }
        }
        Ok(())
    }

    /// Emits `CREATE TABLE` for `table`. Whatever the dialect cannot declare
    /// inside the table moves to its own phase: foreign keys (unless they
    /// must stay inline), indexes (unless declared inline) and triggers
    /// (except on MySQL, where they follow the table in the same command).
    fn create_table(&mut self, table: &Table) {
        let mut payload = table.clone();

        if !self.dialect.supports(Feature::InlineForeignKeys) {
            payload.constraints.retain(|c| !c.is_foreign_key());
            for fk in table.foreign_keys() {
                self.push(
                    Phase::AddForeignKeys,
                    Command::add_constraint(&table.schema, &table.name, fk.clone()),
                );
            }
        }
        if !self.dialect.supports(Feature::InlineIndexes) {
            payload.indexes = NamedList::new();
            payload.triggers = NamedList::new();
            for index in &table.indexes {
                self.push(Phase::CreateIndexes, Command::create_index(index.clone()));
            }
            for trigger in &table.triggers {
                self.push(Phase::CreateTriggers, Command::create_trigger(trigger.clone()));
            }
        }
        self.push(Phase::CreateTables, Command::create_table(payload));
    }

    /// Brings an existing table in line. Each child follows the mode on its
    /// own: missing columns are added even when nothing may be altered.
    fn update_table(&mut self, got: &Table, want: &Table) -> Result<()> {
        if got.virtual_table.is_some() || want.virtual_table.is_some() {
            if self.mode.updates() && !same_virtual_table(got, want, self.dialect) {
                self.drop_table_with_children(got, false);
                self.create_table(want);
            }
            return Ok(());
        }
        self.drop_constraints(got, want)?;
        self.columns(got, want)?;
        self.add_constraints(got, want)?;
        self.indexes(&got.indexes, &want.indexes);
        self.triggers(&got.triggers, &want.triggers);
        Ok(())
    }

    fn columns(&mut self, got: &Table, want: &Table) -> Result<()> {
        for column in &want.columns {
            match got.get_column(&column.name) {
                None if self.mode.creates() => {
                    let mut column = column.clone();
                    column.is_primary_key =
                        want.column_has_single_constraint(&column.name, ConstraintKind::PrimaryKey);
                    column.is_unique =
                        want.column_has_single_constraint(&column.name, ConstraintKind::Unique);
                    self.push(
                        Phase::CreateTables,
                        Command::add_column(&want.schema, &want.name, column),
                    );
                }
                Some(current)
                    if self.mode.updates() && !current.same_definition(column, self.dialect) =>
                {
                    let changes = column_changes(self.dialect, current, column);
                    if changes.is_empty() {
                        continue;
                    }
                    self.dialect.require(Feature::AlterColumn)?;
                    self.push(
                        Phase::CreateTables,
                        Command::alter_column(&want.schema, &want.name, column.clone(), changes),
                    );
                }
                _ => {}
            }
        }
        if self.mode.drops() {
            for column in &got.columns {
                if !want.columns.contains(&column.name) {
                    let cascade = self.cascade(false);
                    self.push(
                        Phase::DropTables,
                        Command::drop_column(&got.schema, &got.name, &column.name, cascade),
                    );
                }
            }
        }
        Ok(())
    }

    /// Drops changed and extraneous constraints. Runs before the column
    /// drops of the same table, which share their phase. A non-foreign-key
    /// constraint whose columns all go away is left to the column drop.
    fn drop_constraints(&mut self, got: &Table, want: &Table) -> Result<()> {
        for constraint in &got.constraints {
            match want.constraints.get_by_name(&constraint.name) {
                Some(target) if self.mode.updates() && !constraint.same_definition(target) => {
                    self.drop_constraint(got, constraint, false)?;
                }
                None if self.mode.drops() => {
                    let implicit = !constraint.is_foreign_key()
                        && !constraint.columns.is_empty()
                        && constraint
                            .columns
                            .iter()
                            .all(|c| !want.columns.contains(c));
                    if implicit {
                        self.record_dropped_key(got, constraint);
                        continue;
                    }
                    let cascade = self.cascade(false);
                    self.drop_constraint(got, constraint, cascade)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn add_constraints(&mut self, got: &Table, want: &Table) -> Result<()> {
        for constraint in &want.constraints {
            match got.constraints.get_by_name(&constraint.name) {
                None if self.mode.creates() => self.add_constraint(want, constraint)?,
                Some(current) if self.mode.updates() && !current.same_definition(constraint) => {
                    self.add_constraint(want, constraint)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn add_constraint(&mut self, table: &Table, constraint: &Constraint) -> Result<()> {
        self.dialect.require(Feature::AddConstraint)?;
        let phase = if constraint.is_foreign_key() {
            Phase::AddForeignKeys
        } else {
            Phase::CreateTables
        };
        self.push(
            phase,
            Command::add_constraint(&table.schema, &table.name, constraint.clone()),
        );
        Ok(())
    }

    fn drop_constraint(&mut self, table: &Table, constraint: &Constraint, cascade: bool) -> Result<()> {
        self.dialect.require(Feature::DropConstraint)?;
        self.record_dropped_key(table, constraint);
        let phase = if constraint.is_foreign_key() {
            Phase::DropForeignKeys
        } else {
            Phase::DropTables
        };
        self.push(
            phase,
            Command::drop_constraint(&table.schema, &table.name, constraint.clone(), cascade),
        );
        Ok(())
    }

    fn record_dropped_key(&mut self, table: &Table, constraint: &Constraint) {
        if matches!(
            constraint.kind,
            ConstraintKind::PrimaryKey | ConstraintKind::Unique
        ) {
            self.dropped_keys.push(DroppedKey {
                schema: table.schema.clone(),
                table: table.name.clone(),
                kind: constraint.kind,
                columns: constraint.columns.clone(),
            });
        }
    }

    /// Whether `fk` points at a key dropped in this plan.
    fn references_dropped_key(&self, fk: &Constraint) -> bool {
        let Some(target) = &fk.references else {
            return false;
        };
        let schema = if target.schema.is_empty() {
            self.dialect.default_schema()
        } else {
            target.schema.as_str()
        };
        self.dropped_keys.iter().any(|key| {
            key.schema == schema
                && key.table == target.table
                && (key.columns == target.columns
                    || (target.columns.is_empty() && key.kind == ConstraintKind::PrimaryKey))
        })
    }

    /// Foreign keys left untouched on surviving tables still depend on the
    /// keys they reference. When such a key is dropped, the foreign key is
    /// dropped before it and added back once the new key exists.
    fn rebuild_referencing_foreign_keys(&mut self, got: &Catalog, want: &Catalog) -> Result<()> {
        if self.dropped_keys.is_empty() {
            return Ok(());
        }
        for table in got.tables() {
            let Some(kept) = want.table(&table.schema, &table.name) else {
                continue;
            };
            for fk in table.foreign_keys() {
                let unchanged = kept
                    .constraints
                    .get_by_name(&fk.name)
                    .is_some_and(|target| target.same_definition(fk));
                if unchanged && self.references_dropped_key(fk) {
                    self.drop_constraint(table, fk, false)?;
                    self.add_constraint(kept, fk)?;
                }
            }
        }
        Ok(())
    }

    fn indexes(&mut self, got: &NamedList<Index>, want: &NamedList<Index>) {
        for index in want {
            match got.get_by_name(&index.name) {
                None if self.mode.creates() => {
                    self.push(Phase::CreateIndexes, Command::create_index(index.clone()));
                }
                Some(current) if self.mode.updates() && !current.same_definition(index) => {
                    self.push(Phase::DropIndexes, Command::drop_index(current.clone(), false));
                    self.push(Phase::CreateIndexes, Command::create_index(index.clone()));
                }
                _ => {}
            }
        }
        if self.mode.drops() {
            for index in got {
                if !want.contains(&index.name) {
                    let cascade = self.cascade(false);
                    self.push(Phase::DropIndexes, Command::drop_index(index.clone(), cascade));
                }
            }
        }
    }

    fn triggers(&mut self, got: &NamedList<Trigger>, want: &NamedList<Trigger>) {
        for trigger in want {
            match got.get_by_name(&trigger.name) {
                None if self.mode.creates() => {
                    self.push(Phase::CreateTriggers, Command::create_trigger(trigger.clone()));
                }
                Some(current) if self.mode.updates() && !current.same_definition(trigger) => {
                    self.push(Phase::DropTriggers, Command::drop_trigger(current.clone(), false));
                    self.push(Phase::CreateTriggers, Command::create_trigger(trigger.clone()));
                }
                _ => {}
            }
        }
        if self.mode.drops() {
            for trigger in got {
                if !want.contains(&trigger.name) {
                    let cascade = self.cascade(false);
                    self.push(Phase::DropTriggers, Command::drop_trigger(trigger.clone(), cascade));
                }
            }
        }
    }

    /// Drops a table with its triggers and, where the dialect can drop
    /// constraints, its foreign keys.
    fn drop_table_with_children(&mut self, table: &Table, cascade: bool) {
        let trigger_cascade = self.cascade(false);
        for trigger in &table.triggers {
            self.push(
                Phase::DropTriggers,
                Command::drop_trigger(trigger.clone(), trigger_cascade),
            );
        }
        if self.dialect.supports(Feature::DropConstraint) {
            for fk in table.foreign_keys() {
                self.push(
                    Phase::DropForeignKeys,
                    Command::drop_constraint(&table.schema, &table.name, fk.clone(), false),
                );
            }
        }
        self.push(
            Phase::DropTables,
            Command::drop_table(&table.schema, &table.name, cascade),
        );
    }

    /// Drops the collected tables, referencing tables before the tables
    /// they reference.
    fn drop_tables(&mut self) -> Result<()> {
        let tables = std::mem::take(&mut self.dropped_tables);
        let cascade = self.cascade(true);
        for pos in drop_order(&tables) {
            let table = tables
                .get(pos)
                .ok_or_else(|| SchemaError::Internal(format!("drop order position {pos} out of range")))?;
            self.drop_table_with_children(table, cascade);
        }
        Ok(())
    }

    // ========================================================================
    // Views
    // ========================================================================

    fn views(&mut self, got: &Schema, want: &Schema) -> Result<()> {
        for view in &want.views {
            match got.views.get_by_name(&view.name) {
                None if self.mode.creates() => self.create_view(view, false),
                Some(current) if self.mode.updates() => self.update_view(current, view),
                _ => {}
            }
        }
        if self.mode.drops() {
            for view in &got.views {
                if !want.views.contains(&view.name) {
                    let cascade = self.cascade(true);
                    self.push(Phase::DropViews, Command::drop_view(view, cascade));
                }
            }
        }
        Ok(())
    }

    fn create_view(&mut self, view: &View, or_replace: bool) {
        let mut payload = view.clone();
        payload.indexes = NamedList::new();
        payload.triggers = NamedList::new();
        self.push(Phase::CreateViews, Command::create_view(payload, or_replace));
        if !or_replace {
            for index in &view.indexes {
                self.push(Phase::CreateIndexes, Command::create_index(index.clone()));
            }
            for trigger in &view.triggers {
                self.push(Phase::CreateTriggers, Command::create_trigger(trigger.clone()));
            }
        }
    }

    fn update_view(&mut self, got: &View, want: &View) {
        if got.same_definition(want) {
            self.indexes(&got.indexes, &want.indexes);
            self.triggers(&got.triggers, &want.triggers);
            return;
        }
        let replaceable = self.dialect.supports(Feature::CreateOrReplaceView)
            && !got.materialized
            && !want.materialized;
        if replaceable {
            self.create_view(want, true);
            self.indexes(&got.indexes, &want.indexes);
            self.triggers(&got.triggers, &want.triggers);
        } else {
            // Dropping the view takes its indexes and triggers with it.
            let cascade = self.cascade(true);
            self.push(Phase::DropViews, Command::drop_view(got, cascade));
            self.create_view(want, false);
        }
    }
}

fn same_virtual_table(got: &Table, want: &Table, dialect: Dialect) -> bool {
    got.virtual_table == want.virtual_table
        && got.columns.len() == want.columns.len()
        && got
            .columns
            .iter()
            .zip(&want.columns)
            .all(|(a, b)| a.same_definition(b, dialect))
}

/// The changes that turn column `got` into `want`, in the order they are
/// applied.
fn column_changes(dialect: Dialect, got: &Column, want: &Column) -> Vec<ColumnChange> {
    let mut changes = Vec::new();
    if normalize_type(dialect, &got.data_type) != normalize_type(dialect, &want.data_type)
        || got.collation != want.collation
    {
        changes.push(ColumnChange::SetType {
            data_type: want.data_type.clone(),
            collation: want.collation.clone(),
        });
    }
    match (got.not_null, want.not_null) {
        (false, true) => changes.push(ColumnChange::SetNotNull),
        (true, false) => changes.push(ColumnChange::DropNotNull),
        _ => {}
    }
    match (got.renders_default(), want.renders_default()) {
        (_, true) => {
            let current = got.default.as_deref().filter(|_| got.renders_default());
            if !same_expression(current, want.default.as_deref()) {
                if let Some(expr) = &want.default {
                    changes.push(ColumnChange::SetDefault(expr.clone()));
                }
            }
        }
        (true, false) => changes.push(ColumnChange::DropDefault),
        (false, false) => {}
    }
    match (got.identity, want.identity) {
        (None, Some(kind)) => changes.push(ColumnChange::AddIdentity(kind)),
        (Some(_), None) => changes.push(ColumnChange::DropIdentity),
        (Some(a), Some(b)) if a != b => changes.push(ColumnChange::SetIdentity(b)),
        _ => {}
    }
    if !same_generated(got.generated.as_ref(), want.generated.as_ref()) {
        changes.push(ColumnChange::SetGenerated);
    }
    if got.on_update_current_timestamp != want.on_update_current_timestamp {
        changes.push(ColumnChange::SetOnUpdate(want.on_update_current_timestamp));
    }
    changes
}

/// Order in which `tables` can be dropped: a table referencing another is
/// dropped first. Ties keep the input order; tables caught in a reference
/// cycle follow in input order.
fn drop_order(tables: &[&Table]) -> Vec<usize> {
    let position = |schema: &str, name: &str| {
        tables
            .iter()
            .position(|t| t.schema == schema && t.name == name)
    };
    // references[i]: tables that table i references.
    let references: Vec<BTreeSet<usize>> = tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            table
                .foreign_keys()
                .filter_map(|fk| fk.references.as_ref())
                .filter_map(|target| {
                    let schema = if target.schema.is_empty() {
                        table.schema.as_str()
                    } else {
                        target.schema.as_str()
                    };
                    position(schema, &target.table)
                })
                .filter(|&j| j != i)
                .collect()
        })
        .collect();

    let mut referenced_by = vec![0usize; tables.len()];
    for targets in &references {
        for &j in targets {
            referenced_by[j] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..tables.len()).filter(|&i| referenced_by[i] == 0).collect();
    let mut order = Vec::with_capacity(tables.len());
    let mut done = vec![false; tables.len()];
    while let Some(i) = ready.pop_first() {
        order.push(i);
        done[i] = true;
        for &j in &references[i] {
            referenced_by[j] -= 1;
            if referenced_by[j] == 0 {
                ready.insert(j);
            }
        }
    }
    if order.len() < tables.len() {
        tracing::warn!(
            tables = tables.len() - order.len(),
            "Reference cycle between dropped tables, dropping in catalog order"
        );
        order.extend((0..tables.len()).filter(|&i| !done[i]));
    }
    order
}
