//! Wave scheduling: layered topological sort
//!
//! Repeatedly collects every atom whose dependencies are all assigned,
//! gives the batch the next wave number, and removes it from the remaining
//! graph. Wave 0 is exactly the dependency-free atoms. Iteration is in
//! arena order only, so the same atom and edge set always yields the same
//! assignment.

use crate::error::GraphError;
use crate::graph::DependencyGraph;
use axe_atom::AtomId;
use serde::{Deserialize, Serialize};

/// One wave: mutually independent atoms eligible to run concurrently
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    /// Wave number, starting at 0
    pub number: u32,
    /// Atoms in this wave, in arena order
    pub atoms: Vec<AtomId>,
}

impl Wave {
    /// Number of atoms in the wave
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the wave is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// Assigns each atom a wave such that all of its dependencies belong to
/// strictly earlier waves
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveScheduler;

impl WaveScheduler {
    /// Create a new scheduler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute the wave partition of an acyclic graph
    ///
    /// # Errors
    /// `GraphError::LayeringStalled` if no progress can be made; this only
    /// happens when the graph contains a cycle, which construction should
    /// have rejected already.
    pub fn schedule(&self, graph: &DependencyGraph) -> Result<Vec<Wave>, GraphError> {
        let total = graph.len();
        let deps = graph.deps_indices();
        let mut assigned = vec![false; total];
        let mut assigned_count = 0usize;
        let mut waves = Vec::new();

        while assigned_count < total {
            let mut batch = Vec::new();
            for idx in 0..total {
                if !assigned[idx] && deps[idx].iter().all(|&d| assigned[d]) {
                    batch.push(idx);
                }
            }

            if batch.is_empty() {
                return Err(GraphError::LayeringStalled {
                    remaining: total - assigned_count,
                });
            }

            for &idx in &batch {
                assigned[idx] = true;
            }
            assigned_count += batch.len();

            waves.push(Wave {
                number: waves.len() as u32,
                atoms: batch.into_iter().map(|i| graph.atom_at(i)).collect(),
            });
        }

        Ok(waves)
    }
}
