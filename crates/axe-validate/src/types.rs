//! Validation result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four validation levels, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    /// One atom's output
    Atomic,
    /// Cross-atom consistency within one task
    Task,
    /// Contract consistency across a milestone's tasks
    Milestone,
    /// Architecture-wide checks over the whole plan
    Plan,
}

impl std::fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidationLevel::Atomic => "atomic",
            ValidationLevel::Task => "task",
            ValidationLevel::Milestone => "milestone",
            ValidationLevel::Plan => "plan",
        };
        write!(f, "{name}")
    }
}

/// Severity of a single violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory observation
    Info,
    /// Suspicious but not disqualifying
    Warning,
    /// Disqualifying finding
    Error,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Finding severity
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
}

impl Violation {
    /// Create a violation
    #[inline]
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    /// Error-severity shorthand
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Warning-severity shorthand
    #[inline]
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Info-severity shorthand
    #[inline]
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }
}

/// Outcome of running one validation level against one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Level the result belongs to
    pub level: ValidationLevel,
    /// Entity the level ran against (atom/task/milestone/plan id)
    pub subject: String,
    /// Whether the entity passed
    pub valid: bool,
    /// Score, 0.0–1.0
    pub score: f64,
    /// Findings, most severe first
    pub violations: Vec<Violation>,
    /// When the check ran
    pub checked_at: DateTime<Utc>,
}

impl ValidationResult {
    /// Build a result from findings: invalid on any error-severity finding,
    /// score deducted per finding and clamped
    #[must_use]
    pub fn from_violations(
        level: ValidationLevel,
        subject: impl Into<String>,
        mut violations: Vec<Violation>,
    ) -> Self {
        violations.sort_by(|a, b| b.severity.cmp(&a.severity));

        let mut score = 1.0f64;
        let mut valid = true;
        for v in &violations {
            match v.severity {
                Severity::Error => {
                    score -= 0.25;
                    valid = false;
                }
                Severity::Warning => score -= 0.1,
                Severity::Info => score -= 0.02,
            }
        }

        Self {
            level,
            subject: subject.into(),
            valid,
            score: score.clamp(0.0, 1.0),
            violations,
            checked_at: Utc::now(),
        }
    }

    /// Mean score of whichever levels were requested
    #[must_use]
    pub fn aggregate_score(results: &[ValidationResult]) -> f64 {
        if results.is_empty() {
            return 1.0;
        }
        results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_invalidate() {
        let result = ValidationResult::from_violations(
            ValidationLevel::Atomic,
            "atom-1",
            vec![Violation::error("unbalanced output")],
        );
        assert!(!result.valid);
        assert!((result.score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn warnings_deduct_but_pass() {
        let result = ValidationResult::from_violations(
            ValidationLevel::Task,
            "task-1",
            vec![Violation::warning("x"), Violation::info("y")],
        );
        assert!(result.valid);
        assert!((result.score - 0.88).abs() < 1e-9);
    }

    #[test]
    fn violations_sorted_most_severe_first() {
        let result = ValidationResult::from_violations(
            ValidationLevel::Plan,
            "plan-1",
            vec![
                Violation::info("a"),
                Violation::error("b"),
                Violation::warning("c"),
            ],
        );
        assert_eq!(result.violations[0].severity, Severity::Error);
        assert_eq!(result.violations[2].severity, Severity::Info);
    }

    #[test]
    fn aggregate_is_mean_of_requested_levels() {
        let a = ValidationResult::from_violations(ValidationLevel::Atomic, "a", vec![]);
        let b = ValidationResult::from_violations(
            ValidationLevel::Task,
            "b",
            vec![Violation::warning("w")],
        );
        let mean = ValidationResult::aggregate_score(&[a, b]);
        assert!((mean - 0.95).abs() < 1e-9);
        assert!((ValidationResult::aggregate_score(&[]) - 1.0).abs() < f64::EPSILON);
    }
}
