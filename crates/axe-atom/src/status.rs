//! Atom status state machine
//!
//! Scheduling states move `Pending → Ready → InProgress → {Completed, Failed}`.
//! The `needs_review` flag on [`crate::Atom`] is orthogonal: an atom can be
//! `Completed` or `Failed` and still be flagged for review. Review
//! resolutions drive the remaining transitions: an approval converts a
//! failure to `Completed`, a rejection converts a low-confidence success to
//! `Failed`, and an edit re-queues a failed atom through `Ready` for one
//! extra attempt.

use serde::{Deserialize, Serialize};

/// Scheduling state of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomStatus {
    /// Created, dependencies not yet satisfied
    Pending,
    /// All dependencies satisfied, eligible for dispatch
    Ready,
    /// An execution attempt is in flight
    InProgress,
    /// Terminal success
    Completed,
    /// Terminal failure (execution, retry exhaustion, rejection, or skip)
    Failed,
}

impl AtomStatus {
    /// Terminal for scheduling purposes
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AtomStatus::Completed | AtomStatus::Failed)
    }
}

impl std::fmt::Display for AtomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AtomStatus::Pending => "pending",
            AtomStatus::Ready => "ready",
            AtomStatus::InProgress => "in_progress",
            AtomStatus::Completed => "completed",
            AtomStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Illegal state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition: {from} -> {to}")]
pub struct TransitionError {
    /// State the atom was in
    pub from: AtomStatus,
    /// State the transition requested
    pub to: AtomStatus,
}

/// States reachable from `from` in one step
pub fn allowed_transitions(from: AtomStatus) -> Vec<AtomStatus> {
    use AtomStatus::*;
    match from {
        Pending => vec![Ready, Failed],
        Ready => vec![InProgress, Failed],
        InProgress => vec![Completed, Failed],
        // Review approval of a failed atom, or an edit re-queue.
        Failed => vec![Completed, Ready],
        // Review rejection of a low-confidence success.
        Completed => vec![Failed],
    }
}

/// Validate a single transition
pub fn validate_transition(from: AtomStatus, to: AtomStatus) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}
