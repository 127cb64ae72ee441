//! External collaborator contracts
//!
//! The engine never decides what code is correct and never stores anything
//! itself: generation and persistence are injected behind these traits.
//! Persistence assumes at-least-once durable writes and idempotent upserts
//! keyed by entity id.

use axe_atom::{Atom, AtomResult, ReviewQueueEntry, RunId};
use axe_graph::Wave;
use axe_validate::ValidationResult;

/// Output of one generation attempt
#[derive(Debug, Clone)]
pub struct Generated {
    /// The produced code
    pub output: String,
    /// Trust in the result, 0.0–1.0
    pub confidence: f64,
}

impl Generated {
    /// Create a generation result with a clamped confidence
    #[inline]
    #[must_use]
    pub fn new(output: impl Into<String>, confidence: f64) -> Self {
        Self {
            output: output.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A single generation attempt failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("generation failed: {0}")]
pub struct GenerationError(pub String);

/// Code-generation collaborator
///
/// May be slow (seconds); always invoked asynchronously. The previous
/// attempt's failure detail is passed back so the collaborator can adapt.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce the code for one atom
    #[cfg_attr(test, mockall::concretize)]
    async fn generate(
        &self,
        atom: &Atom,
        prior_failure: Option<&str>,
    ) -> Result<Generated, GenerationError>;
}

/// The persistence collaborator is unavailable; this aborts the run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("persistence unavailable: {0}")]
pub struct PersistenceError(pub String);

/// Durable storage collaborator
///
/// Writes happen after each completion, not batched at end-of-wave, so
/// partial progress survives a crash.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Upsert one atom record
    async fn upsert_atom(&self, atom: &Atom) -> Result<(), PersistenceError>;

    /// Append one attempt result
    async fn append_result(&self, result: &AtomResult) -> Result<(), PersistenceError>;

    /// Upsert one review-queue entry
    async fn upsert_entry(&self, entry: &ReviewQueueEntry) -> Result<(), PersistenceError>;

    /// Record a run's wave assignment
    async fn record_waves(&self, run_id: RunId, waves: &[Wave]) -> Result<(), PersistenceError>;

    /// Record a validation result
    async fn record_validation(
        &self,
        run_id: RunId,
        result: &ValidationResult,
    ) -> Result<(), PersistenceError>;
}
