//! Engine error taxonomy
//!
//! Atom-level failures are contained: they never raise out of a wave. Only
//! cycle detection and infrastructure failures (persistence) abort a run.

use crate::traits::{GenerationError, PersistenceError};
use axe_atom::{AtomId, EntryId, RunId, TransitionError};
use axe_decompose::DecompositionError;
use axe_graph::GraphError;
use axe_validate::ValidationError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A task could not be split; it contributes zero atoms
    #[error("decomposition failed: {0}")]
    Decomposition(#[from] DecompositionError),

    /// Graph construction failed; a cycle is fatal to the whole plan
    #[error("graph construction failed: {0}")]
    Graph(#[from] GraphError),

    /// One generation attempt failed; recoverable via retry
    #[error("execution failed: {0}")]
    Generation(#[from] GenerationError),

    /// The per-atom attempt cap was reached without success
    #[error("retry budget exhausted for atom {atom_id}")]
    RetryExhausted {
        /// Atom whose budget ran out
        atom_id: AtomId,
    },

    /// The validation gate itself failed (not a failing check)
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A human reviewer rejected the atom
    #[error("review rejected atom {atom_id}")]
    ReviewRejected {
        /// Rejected atom
        atom_id: AtomId,
    },

    /// Durable storage is unavailable; the run aborts
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Illegal atom status transition
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// No run registered under this handle
    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    /// No atom with this id in the run
    #[error("unknown atom: {0}")]
    UnknownAtom(AtomId),

    /// No review entry with this id
    #[error("unknown review entry: {0}")]
    UnknownEntry(EntryId),

    /// The entry was already resolved
    #[error("review entry already resolved: {0}")]
    EntryAlreadyResolved(EntryId),

    /// The run was cancelled
    #[error("run cancelled")]
    Cancelled,
}

impl EngineError {
    /// Errors that abort the whole run
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Graph(GraphError::CycleDetected { .. }) | Self::Persistence(_)
        )
    }

    /// Errors the retry orchestrator may recover from
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_and_persistence_are_fatal() {
        let cycle = EngineError::Graph(GraphError::CycleDetected {
            atoms: vec![AtomId::new()],
        });
        assert!(cycle.is_fatal());

        let store = EngineError::Persistence(PersistenceError("connection refused".to_string()));
        assert!(store.is_fatal());

        let attempt = EngineError::Generation(GenerationError("timeout".to_string()));
        assert!(!attempt.is_fatal());
        assert!(attempt.is_retryable());
    }

    #[test]
    fn decomposition_is_contained() {
        let err = EngineError::Decomposition(DecompositionError::EmptyPayload);
        assert!(!err.is_fatal());
        assert!(!err.is_retryable());
    }
}
