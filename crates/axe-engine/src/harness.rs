//! Simulation harness
//!
//! Scripted collaborators for driving the engine without real external
//! services: a seeded generator with a configurable failure rate and an
//! in-memory persistence store. Used by the `axe-engine` binary's
//! `simulate` subcommand.

use crate::traits::{
    CodeGenerator, Generated, GenerationError, PersistenceError, PersistenceStore,
};
use axe_atom::{
    Atom, AtomResult, Milestone, Phase, Plan, ReviewQueueEntry, RunId, TaskSpec,
};
use axe_graph::Wave;
use axe_validate::ValidationResult;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded generator: fails at a configured rate, succeeds with a sampled
/// confidence
pub struct SimGenerator {
    rng: Mutex<StdRng>,
    fail_rate: f64,
}

impl SimGenerator {
    /// Create a generator with a reproducible seed
    #[must_use]
    pub fn new(seed: u64, fail_rate: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            fail_rate: fail_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait::async_trait]
impl CodeGenerator for SimGenerator {
    async fn generate(
        &self,
        atom: &Atom,
        _prior_failure: Option<&str>,
    ) -> Result<Generated, GenerationError> {
        let (fails, confidence) = {
            let mut rng = self.rng.lock();
            (
                rng.gen_bool(self.fail_rate),
                0.70 + rng.gen_range(0.0..0.30),
            )
        };
        if fails {
            return Err(GenerationError(format!(
                "simulated failure for atom {}",
                atom.id
            )));
        }
        Ok(Generated::new(atom.payload.clone(), confidence))
    }
}

/// In-memory persistence, keyed by entity id
#[derive(Debug, Default)]
pub struct MemoryStore {
    atoms: DashMap<axe_atom::AtomId, Atom>,
    results: Mutex<Vec<AtomResult>>,
    entries: DashMap<axe_atom::EntryId, ReviewQueueEntry>,
    waves: DashMap<RunId, Vec<Wave>>,
    validations: Mutex<Vec<ValidationResult>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored atoms
    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of appended results
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.lock().len()
    }

    /// Number of review entries
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait::async_trait]
impl PersistenceStore for MemoryStore {
    async fn upsert_atom(&self, atom: &Atom) -> Result<(), PersistenceError> {
        self.atoms.insert(atom.id, atom.clone());
        Ok(())
    }

    async fn append_result(&self, result: &AtomResult) -> Result<(), PersistenceError> {
        self.results.lock().push(result.clone());
        Ok(())
    }

    async fn upsert_entry(&self, entry: &ReviewQueueEntry) -> Result<(), PersistenceError> {
        self.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn record_waves(&self, run_id: RunId, waves: &[Wave]) -> Result<(), PersistenceError> {
        self.waves.insert(run_id, waves.to_vec());
        Ok(())
    }

    async fn record_validation(
        &self,
        _run_id: RunId,
        result: &ValidationResult,
    ) -> Result<(), PersistenceError> {
        self.validations.lock().push(result.clone());
        Ok(())
    }
}

/// Build a synthetic plan: `tasks` tasks of small dependent fragments
#[must_use]
pub fn synthetic_plan(tasks: usize) -> Plan {
    let mut milestone = Milestone::new("synthetic milestone");
    for t in 0..tasks {
        let payload = format!(
            "fn setup_{t}() {{}}\n\nfn work_{t}() {{\n    setup_{t}()\n}}\n\nfn finish_{t}() {{\n    work_{t}()\n}}"
        );
        milestone = milestone.with_task(
            TaskSpec::new(format!("synthetic task {t}"), payload)
                .with_target_file(format!("src/task_{t}.rs"))
                .with_language("rust"),
        );
    }
    Plan::new("synthetic plan").with_phase(Phase::new("synthetic phase").with_milestone(milestone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sim_generator_is_reproducible() {
        let atom = Atom::new(axe_atom::TaskId::new(), 0, "fn f() {}");

        let a = SimGenerator::new(7, 0.5);
        let b = SimGenerator::new(7, 0.5);
        for _ in 0..10 {
            let ra = a.generate(&atom, None).await;
            let rb = b.generate(&atom, None).await;
            assert_eq!(ra.is_ok(), rb.is_ok());
        }
    }

    #[tokio::test]
    async fn memory_store_counts() {
        let store = MemoryStore::new();
        let atom = Atom::new(axe_atom::TaskId::new(), 0, "fn f() {}");

        store.upsert_atom(&atom).await.unwrap();
        store.upsert_atom(&atom).await.unwrap();
        assert_eq!(store.atom_count(), 1);

        store
            .append_result(&AtomResult::succeeded(atom.id, 1, "ok", 3))
            .await
            .unwrap();
        assert_eq!(store.result_count(), 1);
    }

    #[test]
    fn synthetic_plan_shape() {
        let plan = synthetic_plan(3);
        assert_eq!(plan.task_count(), 3);
    }
}
