//! Built-in level validators
//!
//! Heuristic implementations of the four levels. Each folds the constituent
//! lower-level results into its verdict: a level is invalid whenever any
//! lower result is invalid, regardless of its own findings.

use crate::error::ValidationError;
use crate::gate::LevelValidator;
use crate::scope::ValidationScope;
use crate::types::{ValidationLevel, ValidationResult, Violation};
use axe_atom::AtomStatus;
use std::collections::HashMap;

/// Waves larger than this draw a performance flag at plan level
const WAVE_SIZE_FLAG: usize = 500;

fn lower_level_findings(scope: &ValidationScope<'_>) -> Vec<Violation> {
    scope
        .lower
        .iter()
        .filter(|r| !r.valid)
        .map(|r| Violation::error(format!("constituent {} result invalid: {}", r.level, r.subject)))
        .collect()
}

fn balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    for c in text.chars() {
        match c {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

/// Atomic level: syntax, output presence, and decomposition quality of one
/// atom's result
pub struct AtomicChecks;

#[async_trait::async_trait]
impl LevelValidator for AtomicChecks {
    fn level(&self) -> ValidationLevel {
        ValidationLevel::Atomic
    }

    async fn validate(
        &self,
        scope: &ValidationScope<'_>,
    ) -> Result<ValidationResult, ValidationError> {
        let mut violations = lower_level_findings(scope);

        for atom in scope.atoms {
            match scope.outputs.get(&atom.id) {
                Some(output) => {
                    if output.trim().is_empty() {
                        violations.push(Violation::error(format!("atom {}: empty output", atom.id)));
                    } else if !balanced(output) {
                        violations.push(Violation::error(format!(
                            "atom {}: unbalanced delimiters in output",
                            atom.id
                        )));
                    }
                }
                None => {
                    if atom.status == AtomStatus::Completed {
                        violations.push(Violation::error(format!(
                            "atom {}: completed without recorded output",
                            atom.id
                        )));
                    }
                }
            }

            for finding in &atom.violations {
                violations.push(Violation::warning(format!("atom {}: {finding}", atom.id)));
            }
        }

        Ok(ValidationResult::from_violations(
            ValidationLevel::Atomic,
            scope.subject,
            violations,
        ))
    }
}

/// Task level: cross-atom consistency within one task
pub struct TaskChecks;

#[async_trait::async_trait]
impl LevelValidator for TaskChecks {
    fn level(&self) -> ValidationLevel {
        ValidationLevel::Task
    }

    async fn validate(
        &self,
        scope: &ValidationScope<'_>,
    ) -> Result<ValidationResult, ValidationError> {
        let mut violations = lower_level_findings(scope);

        // Two atoms defining the same symbol cannot integrate.
        let mut definers: HashMap<&str, &axe_atom::Atom> = HashMap::new();
        for atom in scope.atoms {
            for name in &atom.context.defines {
                if let Some(prior) = definers.get(name.as_str()) {
                    violations.push(Violation::error(format!(
                        "symbol `{name}` defined by both atom {} and atom {}",
                        prior.id, atom.id
                    )));
                } else {
                    definers.insert(name, atom);
                }
            }
        }

        // Import coherence: a duplicate within one atom's injected imports
        // means context inference double-counted a dependency.
        for atom in scope.atoms {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for import in &atom.context.imports {
                *seen.entry(import.as_str()).or_default() += 1;
            }
            for (import, count) in seen {
                if count > 1 {
                    violations.push(Violation::info(format!(
                        "atom {}: import `{import}` injected {count} times",
                        atom.id
                    )));
                }
            }
        }

        Ok(ValidationResult::from_violations(
            ValidationLevel::Task,
            scope.subject,
            violations,
        ))
    }
}

/// Milestone level: interface consistency across the milestone's tasks
pub struct MilestoneChecks;

#[async_trait::async_trait]
impl LevelValidator for MilestoneChecks {
    fn level(&self) -> ValidationLevel {
        ValidationLevel::Milestone
    }

    async fn validate(
        &self,
        scope: &ValidationScope<'_>,
    ) -> Result<ValidationResult, ValidationError> {
        let mut violations = lower_level_findings(scope);

        // The same interface symbol owned by atoms of different tasks is a
        // contract conflict between siblings.
        let mut owners: HashMap<&str, axe_atom::TaskId> = HashMap::new();
        for atom in scope.atoms {
            for name in &atom.context.defines {
                match owners.get(name.as_str()) {
                    Some(&task) if task != atom.task_id => {
                        violations.push(Violation::error(format!(
                            "interface `{name}` defined by two sibling tasks"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(name, atom.task_id);
                    }
                }
            }
        }

        Ok(ValidationResult::from_violations(
            ValidationLevel::Milestone,
            scope.subject,
            violations,
        ))
    }
}

/// Plan level: architecture-wide checks
pub struct PlanChecks;

#[async_trait::async_trait]
impl LevelValidator for PlanChecks {
    fn level(&self) -> ValidationLevel {
        ValidationLevel::Plan
    }

    async fn validate(
        &self,
        scope: &ValidationScope<'_>,
    ) -> Result<ValidationResult, ValidationError> {
        let graph = scope.graph.ok_or_else(|| ValidationError::IncompleteScope {
            level: ValidationLevel::Plan,
            missing: "dependency graph".to_string(),
        })?;
        let waves = scope.waves.ok_or_else(|| ValidationError::IncompleteScope {
            level: ValidationLevel::Plan,
            missing: "wave assignment".to_string(),
        })?;

        let mut violations = lower_level_findings(scope);

        // Dependency direction: every dependency must sit in an earlier wave.
        let mut wave_of = HashMap::new();
        for wave in waves {
            for &atom in &wave.atoms {
                wave_of.insert(atom, wave.number);
            }
        }
        for atom in graph.atom_ids() {
            let Some(&own_wave) = wave_of.get(&atom) else {
                violations.push(Violation::error(format!("atom {atom} missing from waves")));
                continue;
            };
            if let Ok(deps) = graph.deps_of(atom) {
                for dep in deps {
                    if wave_of.get(&dep).map_or(true, |&w| w >= own_wave) {
                        violations.push(Violation::error(format!(
                            "dependency direction violated: {atom} scheduled before {dep}"
                        )));
                    }
                }
            }
        }

        // Cross-module consistency: one symbol owned by atoms in different
        // target files.
        let mut file_of: HashMap<&str, &str> = HashMap::new();
        for atom in scope.atoms {
            for name in &atom.context.defines {
                match file_of.get(name.as_str()) {
                    Some(&file) if file != atom.target.file => {
                        violations.push(Violation::warning(format!(
                            "symbol `{name}` defined in both {file} and {}",
                            atom.target.file
                        )));
                    }
                    Some(_) => {}
                    None => {
                        file_of.insert(name, &atom.target.file);
                    }
                }
            }
        }

        // Performance red flag: a wave too wide to schedule fairly.
        for wave in waves {
            if wave.len() > WAVE_SIZE_FLAG {
                violations.push(Violation::info(format!(
                    "wave {} holds {} atoms; expect queueing at the concurrency bound",
                    wave.number,
                    wave.len()
                )));
            }
        }

        Ok(ValidationResult::from_violations(
            ValidationLevel::Plan,
            scope.subject,
            violations,
        ))
    }
}
