//! Phased migration plans.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::Command;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::render::{script, Renderer};

/// A dependency-ordered group of commands. Phases execute in the order of
/// [`Phase::ALL`]: drops first, dependents before their dependencies, then
/// creation, dependencies before their dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Triggers of dropped or changed tables.
    DropTriggers,
    /// Dropped or changed indexes.
    DropIndexes,
    /// Foreign keys of dropped tables and dropped foreign keys.
    DropForeignKeys,
    /// Dropped or replaced views.
    DropViews,
    /// Dropped tables, columns and non-foreign-key constraints.
    DropTables,
    /// Dropped or replaced functions.
    DropFunctions,
    /// Dropped schemas.
    DropSchemas,
    /// New schemas.
    CreateSchemas,
    /// Functions that depend on no table.
    CreateIndependentFunctions,
    /// New tables, added or altered columns and non-foreign-key constraints.
    CreateTables,
    /// New or replaced views.
    CreateViews,
    /// New indexes.
    CreateIndexes,
    /// Functions that may reference tables.
    CreateDependentFunctions,
    /// New triggers.
    CreateTriggers,
    /// New foreign keys.
    AddForeignKeys,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Self; 15] = [
        Self::DropTriggers,
        Self::DropIndexes,
        Self::DropForeignKeys,
        Self::DropViews,
        Self::DropTables,
        Self::DropFunctions,
        Self::DropSchemas,
        Self::CreateSchemas,
        Self::CreateIndependentFunctions,
        Self::CreateTables,
        Self::CreateViews,
        Self::CreateIndexes,
        Self::CreateDependentFunctions,
        Self::CreateTriggers,
        Self::AddForeignKeys,
    ];

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DropTriggers => "drop_triggers",
            Self::DropIndexes => "drop_indexes",
            Self::DropForeignKeys => "drop_foreign_keys",
            Self::DropViews => "drop_views",
            Self::DropTables => "drop_tables",
            Self::DropFunctions => "drop_functions",
            Self::DropSchemas => "drop_schemas",
            Self::CreateSchemas => "create_schemas",
            Self::CreateIndependentFunctions => "create_independent_functions",
            Self::CreateTables => "create_tables",
            Self::CreateViews => "create_views",
            Self::CreateIndexes => "create_indexes",
            Self::CreateDependentFunctions => "create_dependent_functions",
            Self::CreateTriggers => "create_triggers",
            Self::AddForeignKeys => "add_foreign_keys",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The commands that turn one catalog into another, grouped by phase.
///
/// A plan is tied to the dialect of the catalogs it was computed from and
/// renders with that dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    dialect: Dialect,
    phases: Vec<Vec<Command>>,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            phases: vec![Vec::new(); Phase::ALL.len()],
        }
    }

    /// The plan's dialect.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Appends a command to a phase.
    pub fn push(&mut self, phase: Phase, command: Command) {
        tracing::debug!(phase = %phase, command = %command, "Planned command");
        if self.phases.len() < Phase::ALL.len() {
            self.phases.resize(Phase::ALL.len(), Vec::new());
        }
        self.phases[phase.index()].push(command);
    }

    /// The non-empty phases, in execution order.
    pub fn phases(&self) -> impl Iterator<Item = (Phase, &[Command])> {
        Phase::ALL
            .into_iter()
            .zip(&self.phases)
            .filter(|(_, commands)| !commands.is_empty())
            .map(|(phase, commands)| (phase, commands.as_slice()))
    }

    /// The commands of one phase.
    #[must_use]
    pub fn phase(&self, phase: Phase) -> &[Command] {
        self.phases.get(phase.index()).map_or(&[], Vec::as_slice)
    }

    /// Every command, in execution order.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.phases.iter().flatten()
    }

    /// Renders every command, in execution order.
    pub fn statements(&self) -> Result<Vec<String>> {
        Renderer::new(self.dialect).render_all(self.commands())
    }

    /// Renders the plan as a script.
    pub fn render(&self) -> Result<String> {
        Ok(script(&self.statements()?))
    }

    /// Whether the plan has no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.iter().all(Vec::is_empty)
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }
}
