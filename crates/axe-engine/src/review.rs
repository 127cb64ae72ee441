//! Review routing
//!
//! Pure decision function over an atom's scores and outcome: decides
//! whether it enters the human-review queue and at what priority. Priority
//! comes from how many downstream atoms the entry blocks; more blocked
//! dependents means a numerically lower (more urgent) value.

use crate::retry::AtomOutcome;
use axe_atom::{Atom, ReviewQueueEntry};
use axe_validate::ValidationResult;

/// Decides which atoms need a human
#[derive(Debug, Clone, Copy)]
pub struct ReviewRouter {
    confidence_threshold: f64,
}

impl ReviewRouter {
    /// Create a router with the given confidence threshold
    #[inline]
    #[must_use]
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold: confidence_threshold.clamp(0.0, 1.0),
        }
    }

    /// Priority for an entry blocking `blocked` downstream atoms
    #[must_use]
    pub fn priority_for(blocked: usize) -> u8 {
        match blocked {
            b if b >= 8 => 1,
            b if b >= 4 => 2,
            b if b >= 2 => 3,
            1 => 4,
            _ => 5,
        }
    }

    /// Decide whether an executed atom needs review
    #[must_use]
    pub fn route(&self, atom: &Atom, outcome: &AtomOutcome, blocked: usize) -> Option<ReviewQueueEntry> {
        let priority = Self::priority_for(blocked);

        if outcome.retry_exhausted {
            return Some(ReviewQueueEntry::new(atom.id, "retry exhausted", priority));
        }
        if outcome.succeeded && outcome.confidence < self.confidence_threshold {
            return Some(ReviewQueueEntry::new(
                atom.id,
                format!(
                    "low confidence: {:.2} below threshold {:.2}",
                    outcome.confidence, self.confidence_threshold
                ),
                priority,
            ));
        }
        if outcome.succeeded && atom.needs_review {
            return Some(ReviewQueueEntry::new(
                atom.id,
                "atomicity below threshold at decomposition",
                priority,
            ));
        }
        None
    }

    /// Decide whether an invalid validation result needs review (strict mode)
    #[must_use]
    pub fn route_validation(
        &self,
        atom: &Atom,
        result: &ValidationResult,
        blocked: usize,
    ) -> Option<ReviewQueueEntry> {
        if result.valid {
            return None;
        }
        Some(ReviewQueueEntry::new(
            atom.id,
            format!("validation failure at {} level", result.level),
            Self::priority_for(blocked),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axe_atom::{AtomId, TaskId};
    use axe_validate::{ValidationLevel, Violation};

    fn outcome(atom_id: AtomId, succeeded: bool, confidence: f64, exhausted: bool) -> AtomOutcome {
        AtomOutcome {
            atom_id,
            succeeded,
            confidence,
            attempts: 1,
            output: succeeded.then(|| "fn f() {}".to_string()),
            last_error: (!succeeded).then(|| "boom".to_string()),
            retry_exhausted: exhausted,
        }
    }

    #[test]
    fn priority_ladder() {
        assert_eq!(ReviewRouter::priority_for(12), 1);
        assert_eq!(ReviewRouter::priority_for(8), 1);
        assert_eq!(ReviewRouter::priority_for(5), 2);
        assert_eq!(ReviewRouter::priority_for(2), 3);
        assert_eq!(ReviewRouter::priority_for(1), 4);
        assert_eq!(ReviewRouter::priority_for(0), 5);
    }

    #[test]
    fn retry_exhaustion_always_routes() {
        let router = ReviewRouter::new(0.85);
        let atom = Atom::new(TaskId::new(), 0, "x");
        let entry = router
            .route(&atom, &outcome(atom.id, false, 0.0, true), 0)
            .unwrap();
        assert_eq!(entry.reason, "retry exhausted");
        assert_eq!(entry.priority, 5);
    }

    #[test]
    fn low_confidence_success_routes() {
        let router = ReviewRouter::new(0.85);
        let atom = Atom::new(TaskId::new(), 0, "x");
        let entry = router
            .route(&atom, &outcome(atom.id, true, 0.5, false), 4)
            .unwrap();
        assert!(entry.reason.contains("low confidence"));
        assert_eq!(entry.priority, 2);
    }

    #[test]
    fn confident_clean_success_passes() {
        let router = ReviewRouter::new(0.85);
        let atom = Atom::new(TaskId::new(), 0, "x");
        assert!(router
            .route(&atom, &outcome(atom.id, true, 0.95, false), 0)
            .is_none());
    }

    #[test]
    fn decomposition_flag_routes_even_when_confident() {
        let router = ReviewRouter::new(0.85);
        let mut atom = Atom::new(TaskId::new(), 0, "x");
        atom.needs_review = true;
        let entry = router
            .route(&atom, &outcome(atom.id, true, 0.95, false), 0)
            .unwrap();
        assert!(entry.reason.contains("atomicity"));
    }

    #[test]
    fn validation_routing_only_on_invalid() {
        let router = ReviewRouter::new(0.85);
        let atom = Atom::new(TaskId::new(), 0, "x");

        let valid = ValidationResult::from_violations(ValidationLevel::Atomic, "a", vec![]);
        assert!(router.route_validation(&atom, &valid, 0).is_none());

        let invalid = ValidationResult::from_violations(
            ValidationLevel::Atomic,
            "a",
            vec![Violation::error("bad output")],
        );
        let entry = router.route_validation(&atom, &invalid, 2).unwrap();
        assert!(entry.reason.contains("atomic level"));
        assert_eq!(entry.priority, 3);
    }
}
