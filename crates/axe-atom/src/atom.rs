//! The atom: smallest independently executable unit of generated work
//!
//! An atom carries everything needed to act on it in isolation: the payload
//! to produce, its target location, and the injected context (imports, type
//! signatures, pre/post-conditions, example tests). Two independent scores
//! travel with it: the atomicity score measures decomposition quality, the
//! confidence score measures trust in the execution result.

use crate::ids::{AtomId, TaskId};
use crate::status::AtomStatus;
use serde::{Deserialize, Serialize};

/// Where the produced code lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLocation {
    /// Target file path
    pub file: String,
    /// First line of the target range (1-based)
    pub line_start: u32,
    /// Last line of the target range (inclusive)
    pub line_end: u32,
}

impl TargetLocation {
    /// Create a new target location
    #[inline]
    #[must_use]
    pub fn new(file: impl Into<String>, line_start: u32, line_end: u32) -> Self {
        Self {
            file: file.into(),
            line_start,
            line_end,
        }
    }

    /// Line ranges overlap or touch
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &TargetLocation) -> bool {
        self.file == other.file
            && self.line_start <= other.line_end.saturating_add(1)
            && other.line_start <= self.line_end.saturating_add(1)
    }
}

/// Context injected so an atom can execute independently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomContext {
    /// Import lines required by the fragment
    pub imports: Vec<String>,
    /// Symbols this atom defines
    pub defines: Vec<String>,
    /// Symbols this atom references but does not define
    pub references: Vec<String>,
    /// Type signatures of the involved declarations
    pub type_signatures: Vec<String>,
    /// Conditions that must hold before execution
    pub preconditions: Vec<String>,
    /// Conditions that must hold after execution
    pub postconditions: Vec<String>,
    /// Example tests retrieved for this fragment
    pub example_tests: Vec<String>,
}

impl AtomContext {
    /// Create an empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Smallest independently executable unit of generated work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Atom identifier
    pub id: AtomId,
    /// Parent task
    pub task_id: TaskId,
    /// Stable ordering within the parent task (display/debug and tie-breaks)
    pub ordinal: u32,
    /// What must be produced
    pub payload: String,
    /// Target file and line range
    pub target: TargetLocation,
    /// Language tag of the payload
    pub language: String,
    /// Estimated size in lines of code
    pub estimated_loc: u32,
    /// Estimated complexity (nesting-depth derived)
    pub estimated_complexity: f64,
    /// Injected context
    pub context: AtomContext,
    /// Explicit must-run-after dependencies declared by the decomposer
    pub declared_deps: Vec<AtomId>,
    /// Decomposition quality, 0.0–1.0
    pub atomicity: f64,
    /// Atomicity heuristic findings
    pub violations: Vec<String>,
    /// Scheduling state
    pub status: AtomStatus,
    /// Attempts consumed so far
    pub attempts: u32,
    /// Attempt cap
    pub max_attempts: u32,
    /// Trust in the execution result, 0.0–1.0
    pub confidence: f64,
    /// Flagged for human review
    pub needs_review: bool,
    /// Review priority, 1 highest – 5 lowest
    pub review_priority: Option<u8>,
    /// Why the atom was skipped instead of executed, if it was
    pub skip_reason: Option<String>,
}

impl Atom {
    /// Create a new atom in `Pending` state
    #[must_use]
    pub fn new(task_id: TaskId, ordinal: u32, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        let loc = payload.lines().count() as u32;
        Self {
            id: AtomId::new(),
            task_id,
            ordinal,
            payload,
            target: TargetLocation::new("", 1, loc.max(1)),
            language: String::new(),
            estimated_loc: loc,
            estimated_complexity: 1.0,
            context: AtomContext::new(),
            declared_deps: Vec::new(),
            atomicity: 1.0,
            violations: Vec::new(),
            status: AtomStatus::Pending,
            attempts: 0,
            max_attempts: 3,
            confidence: 0.0,
            needs_review: false,
            review_priority: None,
            skip_reason: None,
        }
    }

    /// With target location
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: TargetLocation) -> Self {
        self.target = target;
        self
    }

    /// With language tag
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// With injected context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: AtomContext) -> Self {
        self.context = context;
        self
    }

    /// With an explicit dependency
    #[inline]
    #[must_use]
    pub fn depends_on(mut self, atom_id: AtomId) -> Self {
        self.declared_deps.push(atom_id);
        self
    }

    /// With atomicity score (clamped to 0.0–1.0)
    #[inline]
    #[must_use]
    pub fn with_atomicity(mut self, score: f64) -> Self {
        self.atomicity = score.clamp(0.0, 1.0);
        self
    }

    /// With attempt cap
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, cap: u32) -> Self {
        self.max_attempts = cap;
        self
    }

    /// With estimated complexity
    #[inline]
    #[must_use]
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.estimated_complexity = complexity;
        self
    }

    /// Record the confidence of an execution result (clamped to 0.0–1.0)
    #[inline]
    pub fn set_confidence(&mut self, score: f64) {
        self.confidence = score.clamp(0.0, 1.0);
    }

    /// Attempt budget remains
    #[inline]
    #[must_use]
    pub fn attempts_remaining(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_builder() {
        let task = TaskId::new();
        let dep = AtomId::new();
        let atom = Atom::new(task, 0, "fn add(a: i32, b: i32) -> i32 { a + b }")
            .with_language("rust")
            .with_target(TargetLocation::new("src/math.rs", 10, 12))
            .with_atomicity(0.9)
            .depends_on(dep);

        assert_eq!(atom.task_id, task);
        assert_eq!(atom.language, "rust");
        assert_eq!(atom.declared_deps, vec![dep]);
        assert_eq!(atom.status, AtomStatus::Pending);
        assert!((atom.atomicity - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn scores_are_clamped() {
        let mut atom = Atom::new(TaskId::new(), 0, "x").with_atomicity(1.7);
        assert!((atom.atomicity - 1.0).abs() < f64::EPSILON);
        atom.set_confidence(-0.2);
        assert!((atom.confidence - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scores_are_independent() {
        let mut atom = Atom::new(TaskId::new(), 0, "x").with_atomicity(0.3);
        atom.set_confidence(0.95);
        assert!((atom.atomicity - 0.3).abs() < f64::EPSILON);
        assert!((atom.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn attempt_budget() {
        let mut atom = Atom::new(TaskId::new(), 0, "x").with_max_attempts(2);
        assert!(atom.attempts_remaining());
        atom.attempts = 2;
        assert!(!atom.attempts_remaining());
    }

    #[test]
    fn target_overlap() {
        let a = TargetLocation::new("lib.rs", 1, 5);
        let b = TargetLocation::new("lib.rs", 6, 9);
        let c = TargetLocation::new("lib.rs", 20, 25);
        let d = TargetLocation::new("other.rs", 1, 5);

        // adjacent ranges count as the same file region
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }
}
