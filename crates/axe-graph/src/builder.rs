//! Dependency graph construction
//!
//! Edge inference runs in priority order: explicit ordering declared by the
//! decomposer, then symbol-based dependencies (a referencing atom runs after
//! the defining atom), then same-task same-file ordinal ordering as a
//! tie-break for otherwise-unordered atoms touching the same file region.
//! A cycle is a hard construction failure; edges are never dropped to
//! repair one.

use crate::error::GraphError;
use crate::graph::DependencyGraph;
use axe_atom::{Atom, AtomId};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Builds the "must-run-before" graph over a plan's atoms
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyGraphBuilder;

impl DependencyGraphBuilder {
    /// Create a new builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build the dependency graph for the full atom set of a plan
    ///
    /// # Errors
    /// - `GraphError::UnknownAtom` if a declared dependency is not in the set
    /// - `GraphError::CycleDetected` naming the participating atoms
    pub fn build(&self, atoms: &[Atom]) -> Result<DependencyGraph, GraphError> {
        let mut graph = DependencyGraph::new(atoms.iter().map(|a| a.id));

        self.add_declared_edges(atoms, &mut graph)?;
        self.add_symbol_edges(atoms, &mut graph)?;
        self.add_ordinal_edges(atoms, &mut graph)?;

        if let Some(cycle) = graph.find_cycle() {
            return Err(GraphError::CycleDetected { atoms: cycle });
        }

        Ok(graph)
    }

    /// Rule 1: explicit ordering declared by the decomposer
    fn add_declared_edges(
        &self,
        atoms: &[Atom],
        graph: &mut DependencyGraph,
    ) -> Result<(), GraphError> {
        for atom in atoms {
            for &dep in &atom.declared_deps {
                graph.add_edge(atom.id, dep)?;
            }
        }
        Ok(())
    }

    /// Rule 2: an atom referencing a name depends on the atom defining it
    ///
    /// The first definer in input order wins; input order is decomposition
    /// order (task order, then ordinal), so resolution is deterministic.
    fn add_symbol_edges(
        &self,
        atoms: &[Atom],
        graph: &mut DependencyGraph,
    ) -> Result<(), GraphError> {
        let mut definers: IndexMap<&str, AtomId> = IndexMap::new();
        for atom in atoms {
            for name in &atom.context.defines {
                definers.entry(name.as_str()).or_insert(atom.id);
            }
        }

        for atom in atoms {
            for name in &atom.context.references {
                if let Some(&definer) = definers.get(name.as_str()) {
                    if definer != atom.id {
                        graph.add_edge(atom.id, definer)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Rule 3: ordinal tie-break for unordered atoms in the same file region
    fn add_ordinal_edges(
        &self,
        atoms: &[Atom],
        graph: &mut DependencyGraph,
    ) -> Result<(), GraphError> {
        let mut by_region: HashMap<(axe_atom::TaskId, &str), Vec<&Atom>> = HashMap::new();
        for atom in atoms {
            by_region
                .entry((atom.task_id, atom.target.file.as_str()))
                .or_default()
                .push(atom);
        }

        // Group values were pushed in input order; sort by ordinal to be
        // independent of it.
        let mut groups: Vec<Vec<&Atom>> = by_region.into_values().collect();
        for group in &mut groups {
            group.sort_by_key(|a| a.ordinal);
        }
        groups.sort_by_key(|g| g.first().map(|a| a.id));

        for group in groups {
            for pair in group.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                if prev.target.overlaps(&next.target) && !graph.ordered(prev.id, next.id) {
                    graph.add_edge(next.id, prev.id)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axe_atom::{AtomContext, TargetLocation, TaskId};

    fn atom_with(
        task: TaskId,
        ordinal: u32,
        defines: &[&str],
        references: &[&str],
    ) -> Atom {
        let mut ctx = AtomContext::new();
        ctx.defines = defines.iter().map(|s| s.to_string()).collect();
        ctx.references = references.iter().map(|s| s.to_string()).collect();
        Atom::new(task, ordinal, format!("fragment {ordinal}"))
            .with_context(ctx)
            .with_target(TargetLocation::new("src/lib.rs", ordinal * 100, ordinal * 100 + 1))
    }

    #[test]
    fn declared_deps_become_edges() {
        let task = TaskId::new();
        let a = atom_with(task, 0, &[], &[]);
        let b = atom_with(task, 1, &[], &[]).depends_on(a.id);

        let graph = DependencyGraphBuilder::new().build(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(graph.deps_of(b.id).unwrap(), vec![a.id]);
    }

    #[test]
    fn symbol_reference_creates_edge_to_definer() {
        let task = TaskId::new();
        let definer = atom_with(task, 0, &["parse_header"], &[]);
        let user = atom_with(task, 1, &[], &["parse_header"]);

        let graph = DependencyGraphBuilder::new()
            .build(&[definer.clone(), user.clone()])
            .unwrap();
        assert_eq!(graph.deps_of(user.id).unwrap(), vec![definer.id]);
    }

    #[test]
    fn self_reference_is_not_an_edge() {
        let task = TaskId::new();
        let atom = atom_with(task, 0, &["recurse"], &["recurse"]);

        let graph = DependencyGraphBuilder::new().build(&[atom]).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn ordinal_tiebreak_orders_overlapping_regions() {
        let task = TaskId::new();
        let first = atom_with(task, 0, &[], &[])
            .with_target(TargetLocation::new("src/io.rs", 1, 10));
        let second = atom_with(task, 1, &[], &[])
            .with_target(TargetLocation::new("src/io.rs", 8, 20));

        let graph = DependencyGraphBuilder::new()
            .build(&[first.clone(), second.clone()])
            .unwrap();
        assert_eq!(graph.deps_of(second.id).unwrap(), vec![first.id]);
    }

    #[test]
    fn disjoint_regions_stay_unordered() {
        let task = TaskId::new();
        let first = atom_with(task, 0, &[], &[])
            .with_target(TargetLocation::new("src/io.rs", 1, 10));
        let second = atom_with(task, 1, &[], &[])
            .with_target(TargetLocation::new("src/io.rs", 50, 60));

        let graph = DependencyGraphBuilder::new()
            .build(&[first, second])
            .unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn tiebreak_skips_already_ordered_atoms() {
        let task = TaskId::new();
        let first = atom_with(task, 0, &["setup"], &[])
            .with_target(TargetLocation::new("src/io.rs", 1, 10));
        let second = atom_with(task, 1, &[], &["setup"])
            .with_target(TargetLocation::new("src/io.rs", 5, 15));

        let graph = DependencyGraphBuilder::new()
            .build(&[first.clone(), second.clone()])
            .unwrap();
        // symbol edge only; tie-break added nothing
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn cross_reference_cycle_is_fatal() {
        let task = TaskId::new();
        let a = atom_with(task, 0, &["alpha"], &["beta"]);
        let b = atom_with(task, 1, &["beta"], &["alpha"]);

        let err = DependencyGraphBuilder::new()
            .build(&[a.clone(), b.clone()])
            .unwrap_err();
        match err {
            GraphError::CycleDetected { atoms } => {
                assert!(atoms.contains(&a.id));
                assert!(atoms.contains(&b.id));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn declared_self_dependency_is_fatal() {
        let task = TaskId::new();
        let mut atom = atom_with(task, 0, &[], &[]);
        atom.declared_deps.push(atom.id);

        let err = DependencyGraphBuilder::new().build(&[atom.clone()]).unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                atoms: vec![atom.id]
            }
        );
    }
}
