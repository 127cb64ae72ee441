//! Human-review queue records
//!
//! Entries are created by the engine (low confidence, atomicity flags,
//! exhausted retries); their resolution is owned by an external reviewer and
//! fed back through the engine's resolution intake.

use crate::ids::{AtomId, EntryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a review entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Waiting for a reviewer
    Pending,
    /// Reviewer accepted the result as-is
    Approved,
    /// Reviewer rejected the result
    Rejected,
    /// Reviewer supplied an edit; one extra attempt was granted
    Edited,
}

/// Reviewer decision fed into the resolution intake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Treat the atom as completed
    Approve,
    /// Treat the atom as terminally failed
    Reject,
    /// Re-queue one extra attempt, optionally replacing the payload
    Edit {
        /// Replacement payload, if the reviewer rewrote the unit
        replacement_payload: Option<String>,
    },
}

/// One entry in the human-review queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQueueEntry {
    /// Entry identifier
    pub id: EntryId,
    /// Atom under review
    pub atom_id: AtomId,
    /// Why the atom was enqueued
    pub reason: String,
    /// 1 highest – 5 lowest
    pub priority: u8,
    /// Entry lifecycle state
    pub status: ReviewStatus,
    /// Reviewer the entry is assigned to
    pub assigned_reviewer: Option<String>,
    /// Resolution feedback from the reviewer
    pub feedback: Option<String>,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
}

impl ReviewQueueEntry {
    /// Create a pending entry
    #[must_use]
    pub fn new(atom_id: AtomId, reason: impl Into<String>, priority: u8) -> Self {
        Self {
            id: EntryId::new(),
            atom_id,
            reason: reason.into(),
            priority: priority.clamp(1, 5),
            status: ReviewStatus::Pending,
            assigned_reviewer: None,
            feedback: None,
            created_at: Utc::now(),
        }
    }

    /// With an assigned reviewer
    #[inline]
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.assigned_reviewer = Some(reviewer.into());
        self
    }

    /// Entry is still awaiting a reviewer
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.status, ReviewStatus::Pending)
    }

    /// Apply a reviewer decision, recording feedback
    pub fn resolve(&mut self, decision: &ReviewDecision, feedback: Option<String>) {
        self.status = match decision {
            ReviewDecision::Approve => ReviewStatus::Approved,
            ReviewDecision::Reject => ReviewStatus::Rejected,
            ReviewDecision::Edit { .. } => ReviewStatus::Edited,
        };
        self.feedback = feedback;
    }
}
