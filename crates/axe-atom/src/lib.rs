//! Core data model for the atomic execution engine
//!
//! Defines the records owned and mutated by the engine during a run:
//! - Identifiers for every entity (ULID-based, sortable)
//! - [`Atom`]: the smallest independently executable unit of generated work
//! - The atom status state machine and its legal transitions
//! - [`AtomResult`] and the append-only, hash-chained [`ResultLog`]
//! - [`ReviewQueueEntry`] records for the human-review queue
//! - The plan hierarchy (plan → phase → milestone → task) and the derived
//!   aggregate [`PlanStatus`]

pub mod atom;
pub mod ids;
pub mod plan;
pub mod result;
pub mod review;
pub mod status;

pub use atom::{Atom, AtomContext, TargetLocation};
pub use ids::{AtomId, EntryId, MilestoneId, PhaseId, PlanId, RunId, TaskId};
pub use plan::{Milestone, Phase, Plan, PlanStatus, TaskSpec};
pub use result::{AtomResult, AttemptOutcome, ResultLog, ResultLogError};
pub use review::{ReviewDecision, ReviewQueueEntry, ReviewStatus};
pub use status::{AtomStatus, TransitionError};
