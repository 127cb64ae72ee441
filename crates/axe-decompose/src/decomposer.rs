//! The atom decomposer
//!
//! Splits one task's payload into atoms, attaches inferred context, chains
//! fragments that were carved out of one original unit, scores atomicity,
//! and flags low-quality fragments for review.

use crate::context;
use crate::error::DecompositionError;
use crate::provider::ContextProvider;
use crate::score;
use crate::split::{split_payload, Fragment};
use axe_atom::{Atom, TargetLocation, TaskSpec};
use std::sync::Arc;

/// Decomposes task payloads into atoms
pub struct AtomDecomposer {
    granularity: usize,
    atomicity_threshold: f64,
    max_split_depth: usize,
    default_max_attempts: u32,
    context_provider: Option<Arc<dyn ContextProvider>>,
}

impl AtomDecomposer {
    /// Create a decomposer with the reference defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            granularity: 10,
            atomicity_threshold: 0.85,
            max_split_depth: 8,
            default_max_attempts: 3,
            context_provider: None,
        }
    }

    /// With target granularity in lines
    #[inline]
    #[must_use]
    pub fn with_granularity(mut self, lines: usize) -> Self {
        self.granularity = lines.max(1);
        self
    }

    /// With atomicity quality threshold
    #[inline]
    #[must_use]
    pub fn with_atomicity_threshold(mut self, threshold: f64) -> Self {
        self.atomicity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// With per-atom attempt cap
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, cap: u32) -> Self {
        self.default_max_attempts = cap.max(1);
        self
    }

    /// With a context/retrieval collaborator
    #[inline]
    #[must_use]
    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    /// Decompose one task into an ordered list of atoms
    ///
    /// # Errors
    /// `DecompositionError` if the payload cannot be parsed; the task then
    /// contributes zero atoms and the rest of the plan continues.
    pub async fn decompose(&self, task: &TaskSpec) -> Result<Vec<Atom>, DecompositionError> {
        let fragments = split_payload(&task.payload, self.granularity, self.max_split_depth)?;
        tracing::debug!(
            task_id = %task.id,
            fragments = fragments.len(),
            "decomposed task payload"
        );

        let mut atoms = Vec::with_capacity(fragments.len());
        for (ordinal, fragment) in fragments.iter().enumerate() {
            let atom = self
                .build_atom(task, ordinal as u32, fragment, atoms.last())
                .await;
            atoms.push(atom);
        }
        Ok(atoms)
    }

    async fn build_atom(
        &self,
        task: &TaskSpec,
        ordinal: u32,
        fragment: &Fragment,
        previous: Option<&Atom>,
    ) -> Atom {
        let mut ctx = context::infer(&task.payload, &fragment.text);
        self.enrich(task, fragment, &mut ctx.example_tests).await;

        let (atomicity, violations) = score::atomicity(&fragment.text, self.granularity);
        let complexity = 1.0 + f64::from(context::nesting_depth(&fragment.text)) * 0.5;

        let mut atom = Atom::new(task.id, ordinal, fragment.text.clone())
            .with_language(task.language.clone())
            .with_target(TargetLocation::new(
                task.target_file.clone(),
                fragment.start_line,
                fragment.end_line,
            ))
            .with_context(ctx)
            .with_atomicity(atomicity)
            .with_complexity(complexity)
            .with_max_attempts(self.default_max_attempts);

        if fragment.chained_to_prev {
            if let Some(prev) = previous {
                atom = atom.depends_on(prev.id);
            }
        }

        atom.violations = violations;
        if atom.atomicity < self.atomicity_threshold {
            atom.needs_review = true;
        }
        atom
    }

    /// Best-effort context enrichment; failures degrade quality only
    async fn enrich(&self, task: &TaskSpec, fragment: &Fragment, examples: &mut Vec<String>) {
        let Some(provider) = &self.context_provider else {
            return;
        };
        match provider.examples_for(task, &fragment.text).await {
            Ok(mut found) => examples.append(&mut found),
            Err(e) => {
                tracing::debug!(task_id = %task.id, error = %e, "context enrichment skipped");
            }
        }
    }
}

impl Default for AtomDecomposer {
    fn default() -> Self {
        Self::new()
    }
}
