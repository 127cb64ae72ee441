//! Validation scope: the data a level runs against

use crate::types::ValidationResult;
use axe_atom::{Atom, AtomId};
use axe_graph::{DependencyGraph, Wave};
use std::collections::HashMap;

/// Borrowed view of the entities one validation call inspects
///
/// Atom/task/milestone levels need the atoms in scope and their outputs;
/// the plan level additionally needs the dependency graph and wave
/// assignment. Lower-level results ride along so a level can aggregate
/// hierarchically.
#[derive(Debug, Clone, Copy)]
pub struct ValidationScope<'a> {
    /// Rendered id of the entity under validation
    pub subject: &'a str,
    /// Atoms in scope, in decomposition order
    pub atoms: &'a [Atom],
    /// Latest successful output per atom
    pub outputs: &'a HashMap<AtomId, String>,
    /// Dependency graph (plan level)
    pub graph: Option<&'a DependencyGraph>,
    /// Wave assignment (plan level)
    pub waves: Option<&'a [Wave]>,
    /// Results of the constituent lower level
    pub lower: &'a [ValidationResult],
}

impl<'a> ValidationScope<'a> {
    /// Scope over a set of atoms with their outputs
    #[must_use]
    pub fn over(
        subject: &'a str,
        atoms: &'a [Atom],
        outputs: &'a HashMap<AtomId, String>,
    ) -> Self {
        Self {
            subject,
            atoms,
            outputs,
            graph: None,
            waves: None,
            lower: &[],
        }
    }

    /// With the plan's graph and waves
    #[inline]
    #[must_use]
    pub fn with_graph(mut self, graph: &'a DependencyGraph, waves: &'a [Wave]) -> Self {
        self.graph = Some(graph);
        self.waves = Some(waves);
        self
    }

    /// With lower-level results
    #[inline]
    #[must_use]
    pub fn with_lower(mut self, lower: &'a [ValidationResult]) -> Self {
        self.lower = lower;
        self
    }
}
