//! The validation gate
//!
//! Holds one validator per level, dependency-injected with built-in
//! heuristic implementations as the default. The gate reports; the run
//! coordinator owns the policy for what an invalid result triggers.

use crate::error::ValidationError;
use crate::levels::{AtomicChecks, MilestoneChecks, PlanChecks, TaskChecks};
use crate::scope::ValidationScope;
use crate::types::{ValidationLevel, ValidationResult};
use std::sync::Arc;

/// One validation level's implementation
#[async_trait::async_trait]
pub trait LevelValidator: Send + Sync {
    /// Level this validator implements
    fn level(&self) -> ValidationLevel;

    /// Run the level against a scope
    async fn validate(
        &self,
        scope: &ValidationScope<'_>,
    ) -> Result<ValidationResult, ValidationError>;
}

/// Dispatches validation calls to the validator for each level
pub struct ValidationGate {
    atomic: Arc<dyn LevelValidator>,
    task: Arc<dyn LevelValidator>,
    milestone: Arc<dyn LevelValidator>,
    plan: Arc<dyn LevelValidator>,
}

impl ValidationGate {
    /// Create a gate with the built-in validators
    #[must_use]
    pub fn new() -> Self {
        Self {
            atomic: Arc::new(AtomicChecks),
            task: Arc::new(TaskChecks),
            milestone: Arc::new(MilestoneChecks),
            plan: Arc::new(PlanChecks),
        }
    }

    /// Replace the validator for the level it reports
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn LevelValidator>) -> Self {
        match validator.level() {
            ValidationLevel::Atomic => self.atomic = validator,
            ValidationLevel::Task => self.task = validator,
            ValidationLevel::Milestone => self.milestone = validator,
            ValidationLevel::Plan => self.plan = validator,
        }
        self
    }

    /// Run one level against a scope
    pub async fn validate(
        &self,
        level: ValidationLevel,
        scope: &ValidationScope<'_>,
    ) -> Result<ValidationResult, ValidationError> {
        let validator = match level {
            ValidationLevel::Atomic => &self.atomic,
            ValidationLevel::Task => &self.task,
            ValidationLevel::Milestone => &self.milestone,
            ValidationLevel::Plan => &self.plan,
        };
        validator.validate(scope).await
    }
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Violation;
    use axe_atom::{Atom, TaskId};
    use std::collections::HashMap;

    struct AlwaysInvalid;

    #[async_trait::async_trait]
    impl LevelValidator for AlwaysInvalid {
        fn level(&self) -> ValidationLevel {
            ValidationLevel::Atomic
        }

        async fn validate(
            &self,
            scope: &ValidationScope<'_>,
        ) -> Result<ValidationResult, ValidationError> {
            Ok(ValidationResult::from_violations(
                ValidationLevel::Atomic,
                scope.subject,
                vec![Violation::error("always invalid")],
            ))
        }
    }

    #[tokio::test]
    async fn gate_dispatches_to_injected_validator() {
        let gate = ValidationGate::new().with_validator(Arc::new(AlwaysInvalid));

        let atoms = vec![Atom::new(TaskId::new(), 0, "fn f() {}")];
        let outputs = HashMap::new();
        let scope = ValidationScope::over("atom-under-test", &atoms, &outputs);

        let result = gate.validate(ValidationLevel::Atomic, &scope).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.subject, "atom-under-test");
    }

    #[tokio::test]
    async fn default_gate_covers_every_level() {
        let gate = ValidationGate::new();
        let atoms: Vec<Atom> = Vec::new();
        let outputs = HashMap::new();
        let scope = ValidationScope::over("empty", &atoms, &outputs);

        for level in [
            ValidationLevel::Atomic,
            ValidationLevel::Task,
            ValidationLevel::Milestone,
        ] {
            let result = gate.validate(level, &scope).await.unwrap();
            assert_eq!(result.level, level);
            assert!(result.valid);
        }
    }
}
