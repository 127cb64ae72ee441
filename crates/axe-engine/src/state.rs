//! Shared state of one run
//!
//! The dependency graph and wave assignment are read-only once computed.
//! Atom records are the only mutable shared state during a wave; every
//! mutation goes through the map's entry lock, which gives the
//! at-most-one-writer-at-a-time discipline per atom.

use crate::error::EngineError;
use axe_atom::{
    status, Atom, AtomId, AtomStatus, EntryId, MilestoneId, PlanId, PlanStatus, ResultLog,
    ReviewQueueEntry, RunId, TaskId,
};
use axe_graph::{DependencyGraph, Wave};
use axe_validate::ValidationResult;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Point-in-time view of one atom, for status reporting
#[derive(Debug, Clone)]
pub struct AtomSnapshot {
    /// Atom identifier
    pub atom_id: AtomId,
    /// Parent task
    pub task_id: TaskId,
    /// Stable ordering within the task
    pub ordinal: u32,
    /// Scheduling state
    pub status: AtomStatus,
    /// Attempts consumed
    pub attempts: u32,
    /// Result confidence
    pub confidence: f64,
    /// Decomposition quality
    pub atomicity: f64,
    /// Flagged for review
    pub needs_review: bool,
    /// Review priority, if flagged
    pub review_priority: Option<u8>,
    /// Why the atom was skipped, if it was
    pub skip_reason: Option<String>,
}

/// Aggregate status plus the full per-atom snapshot
#[derive(Debug, Clone)]
pub struct RunStatus {
    /// Run identifier
    pub run_id: RunId,
    /// Derived aggregate status
    pub status: PlanStatus,
    /// The run loop has finished
    pub finished: bool,
    /// The run was cancelled
    pub cancelled: bool,
    /// Per-atom snapshots in decomposition order
    pub atoms: Vec<AtomSnapshot>,
}

/// Mutable state of one run
#[derive(Debug)]
pub struct RunState {
    /// Run identifier
    pub run_id: RunId,
    /// Plan under execution
    pub plan_id: PlanId,
    atoms: DashMap<AtomId, Atom>,
    order: Vec<AtomId>,
    /// Read-only once computed
    pub graph: DependencyGraph,
    /// Read-only once computed
    pub waves: Vec<Wave>,
    /// Append-only attempt history
    pub results: ResultLog,
    outputs: DashMap<AtomId, String>,
    entries: DashMap<EntryId, ReviewQueueEntry>,
    validations: parking_lot::Mutex<Vec<ValidationResult>>,
    milestones: Vec<(MilestoneId, Vec<TaskId>)>,
    cancelled: AtomicBool,
    finished: AtomicBool,
    /// Signalled on every review resolution and on cancellation
    pub review_notify: Notify,
}

impl RunState {
    /// Assemble the state for a freshly scheduled run
    #[must_use]
    pub fn new(
        run_id: RunId,
        plan_id: PlanId,
        atoms: Vec<Atom>,
        graph: DependencyGraph,
        waves: Vec<Wave>,
        milestones: Vec<(MilestoneId, Vec<TaskId>)>,
    ) -> Self {
        let order: Vec<AtomId> = atoms.iter().map(|a| a.id).collect();
        let map = DashMap::new();
        for atom in atoms {
            map.insert(atom.id, atom);
        }
        Self {
            run_id,
            plan_id,
            atoms: map,
            order,
            graph,
            waves,
            results: ResultLog::new(),
            outputs: DashMap::new(),
            entries: DashMap::new(),
            validations: parking_lot::Mutex::new(Vec::new()),
            milestones,
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            review_notify: Notify::new(),
        }
    }

    /// Total atom count
    #[inline]
    #[must_use]
    pub fn total_atoms(&self) -> usize {
        self.order.len()
    }

    /// Clone of one atom record
    #[must_use]
    pub fn atom(&self, atom_id: AtomId) -> Option<Atom> {
        self.atoms.get(&atom_id).map(|a| a.clone())
    }

    /// Current status of one atom
    #[must_use]
    pub fn status_of(&self, atom_id: AtomId) -> Option<AtomStatus> {
        self.atoms.get(&atom_id).map(|a| a.status)
    }

    /// Mutate one atom under its entry lock
    pub fn with_atom_mut<R>(&self, atom_id: AtomId, f: impl FnOnce(&mut Atom) -> R) -> Option<R> {
        self.atoms.get_mut(&atom_id).map(|mut a| f(&mut a))
    }

    /// Transition one atom, validating against the state machine
    pub fn transition(&self, atom_id: AtomId, to: AtomStatus) -> Result<(), EngineError> {
        let mut atom = self
            .atoms
            .get_mut(&atom_id)
            .ok_or(EngineError::UnknownAtom(atom_id))?;
        status::validate_transition(atom.status, to)?;
        atom.status = to;
        Ok(())
    }

    /// Record the latest successful output of an atom
    pub fn set_output(&self, atom_id: AtomId, output: String) {
        self.outputs.insert(atom_id, output);
    }

    /// Latest successful outputs, keyed by atom
    #[must_use]
    pub fn outputs_snapshot(&self) -> HashMap<AtomId, String> {
        self.outputs
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    /// Register a review entry
    pub fn insert_entry(&self, entry: ReviewQueueEntry) {
        self.entries.insert(entry.id, entry);
    }

    /// Clone of one review entry
    #[must_use]
    pub fn entry(&self, entry_id: EntryId) -> Option<ReviewQueueEntry> {
        self.entries.get(&entry_id).map(|e| e.clone())
    }

    /// Mutate one review entry under its entry lock
    pub fn with_entry_mut<R>(
        &self,
        entry_id: EntryId,
        f: impl FnOnce(&mut ReviewQueueEntry) -> R,
    ) -> Option<R> {
        self.entries.get_mut(&entry_id).map(|mut e| f(&mut e))
    }

    /// Review entries still awaiting a reviewer
    #[must_use]
    pub fn pending_review_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Whether an atom has an unresolved review entry
    #[must_use]
    pub fn has_pending_review(&self, atom_id: AtomId) -> bool {
        self.entries
            .iter()
            .any(|e| e.atom_id == atom_id && e.is_pending())
    }

    /// Record a validation result
    pub fn push_validation(&self, result: ValidationResult) {
        self.validations.lock().push(result);
    }

    /// Snapshot of recorded validation results
    #[must_use]
    pub fn validations(&self) -> Vec<ValidationResult> {
        self.validations.lock().clone()
    }

    /// Milestone → task grouping, in plan order
    #[must_use]
    pub fn milestones(&self) -> &[(MilestoneId, Vec<TaskId>)] {
        &self.milestones
    }

    /// Request cancellation: in-flight atoms finish, nothing new dispatches
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.review_notify.notify_waiters();
    }

    /// Whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the run loop finished
    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Whether the run loop has finished
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Derived aggregate status over all atoms
    #[must_use]
    pub fn aggregate(&self) -> PlanStatus {
        let failed = self
            .order
            .iter()
            .filter(|id| self.status_of(**id) == Some(AtomStatus::Failed))
            .count();
        PlanStatus::aggregate(failed, self.order.len())
    }

    /// Full status snapshot in decomposition order
    #[must_use]
    pub fn snapshot(&self) -> RunStatus {
        let atoms = self
            .order
            .iter()
            .filter_map(|id| self.atoms.get(id))
            .map(|a| AtomSnapshot {
                atom_id: a.id,
                task_id: a.task_id,
                ordinal: a.ordinal,
                status: a.status,
                attempts: a.attempts,
                confidence: a.confidence,
                atomicity: a.atomicity,
                needs_review: a.needs_review,
                review_priority: a.review_priority,
                skip_reason: a.skip_reason.clone(),
            })
            .collect();

        RunStatus {
            run_id: self.run_id,
            status: self.aggregate(),
            finished: self.is_finished(),
            cancelled: self.is_cancelled(),
            atoms,
        }
    }
}
