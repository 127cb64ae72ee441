//! Graph construction and scheduling errors

use axe_atom::AtomId;

/// Errors from graph construction and wave scheduling
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The edge set contains a cycle; scheduling is impossible
    #[error("cycle detected among {} atoms", atoms.len())]
    CycleDetected {
        /// Atoms participating in the cycle
        atoms: Vec<AtomId>,
    },

    /// An edge references an atom outside the graph
    #[error("unknown atom in edge: {0}")]
    UnknownAtom(AtomId),

    /// Layering failed to make progress on an acyclic graph
    #[error("wave layering stalled with {remaining} atoms unassigned")]
    LayeringStalled {
        /// Atoms left without a wave
        remaining: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_names_participants() {
        let atoms = vec![AtomId::new(), AtomId::new()];
        let err = GraphError::CycleDetected {
            atoms: atoms.clone(),
        };
        assert!(err.to_string().contains("2 atoms"));
        if let GraphError::CycleDetected { atoms: found } = err {
            assert_eq!(found, atoms);
        }
    }
}
