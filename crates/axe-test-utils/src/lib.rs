//! Testing utilities for the AXE workspace
//!
//! Shared scripted collaborators, fixtures, and wait helpers.

#![allow(missing_docs)]

use axe_atom::{
    Atom, AtomId, AtomResult, Milestone, Phase, Plan, ReviewQueueEntry, RunId, TaskSpec,
};
use axe_engine::{
    CodeGenerator, Generated, GenerationError, PersistenceError, PersistenceStore, RunCoordinator,
    RunHandle, RunStatus,
};
use axe_graph::Wave;
use axe_validate::ValidationResult;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;

/// One scripted behavior, matched by a payload substring
#[derive(Debug, Clone)]
struct Rule {
    marker: String,
    fail_first: u32,
    always_fail: bool,
    confidence: f64,
    output: Option<String>,
}

/// Generator with per-atom scripted outcomes
///
/// Rules are matched against the atom payload; the first match wins. Atoms
/// with no matching rule succeed with the default confidence, echoing their
/// payload as output.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    rules: Vec<Rule>,
    default_confidence: f64,
    latency: Option<Duration>,
    attempts: DashMap<AtomId, u32>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_confidence: 0.95,
            latency: None,
            attempts: DashMap::new(),
        }
    }

    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Every attempt takes this long, simulating a slow collaborator
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Atoms whose payload contains `marker` fail their first `n` attempts
    pub fn fail_times(mut self, marker: impl Into<String>, n: u32) -> Self {
        let confidence = self.default_confidence;
        self.rules.push(Rule {
            marker: marker.into(),
            fail_first: n,
            always_fail: false,
            confidence,
            output: None,
        });
        self
    }

    /// Atoms whose payload contains `marker` never succeed
    pub fn always_fail(mut self, marker: impl Into<String>) -> Self {
        self.rules.push(Rule {
            marker: marker.into(),
            fail_first: 0,
            always_fail: true,
            confidence: 0.0,
            output: None,
        });
        self
    }

    /// Atoms whose payload contains `marker` succeed with this confidence
    pub fn confidence_for(mut self, marker: impl Into<String>, confidence: f64) -> Self {
        self.rules.push(Rule {
            marker: marker.into(),
            fail_first: 0,
            always_fail: false,
            confidence: confidence.clamp(0.0, 1.0),
            output: None,
        });
        self
    }

    /// Atoms whose payload contains `marker` succeed with this exact output
    pub fn output_for(mut self, marker: impl Into<String>, output: impl Into<String>) -> Self {
        let confidence = self.default_confidence;
        self.rules.push(Rule {
            marker: marker.into(),
            fail_first: 0,
            always_fail: false,
            confidence,
            output: Some(output.into()),
        });
        self
    }

    /// Attempts observed for one atom
    pub fn attempts_for(&self, atom_id: AtomId) -> u32 {
        self.attempts.get(&atom_id).map(|a| *a).unwrap_or(0)
    }

    /// Attempts observed across every atom
    pub fn total_attempts(&self) -> u32 {
        self.attempts.iter().map(|e| *e.value()).sum()
    }
}

#[async_trait::async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        atom: &Atom,
        _prior_failure: Option<&str>,
    ) -> Result<Generated, GenerationError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let attempt = {
            let mut counter = self.attempts.entry(atom.id).or_insert(0);
            *counter += 1;
            *counter
        };

        let rule = self.rules.iter().find(|r| atom.payload.contains(&r.marker));
        match rule {
            Some(r) if r.always_fail => Err(GenerationError(format!(
                "scripted failure (attempt {attempt})"
            ))),
            Some(r) if attempt <= r.fail_first => Err(GenerationError(format!(
                "scripted failure (attempt {attempt} of {})",
                r.fail_first
            ))),
            Some(r) => Ok(Generated::new(
                r.output.clone().unwrap_or_else(|| atom.payload.clone()),
                r.confidence,
            )),
            None => Ok(Generated::new(atom.payload.clone(), self.default_confidence)),
        }
    }
}

/// In-memory store exposing everything it was asked to persist
#[derive(Debug, Default)]
pub struct RecordingStore {
    atoms: DashMap<AtomId, Atom>,
    results: Mutex<Vec<AtomResult>>,
    entries: Mutex<Vec<ReviewQueueEntry>>,
    waves: DashMap<RunId, Vec<Wave>>,
    validations: Mutex<Vec<ValidationResult>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, atom_id: AtomId) -> Option<Atom> {
        self.atoms.get(&atom_id).map(|a| a.clone())
    }

    pub fn results(&self) -> Vec<AtomResult> {
        self.results.lock().clone()
    }

    pub fn results_for(&self, atom_id: AtomId) -> Vec<AtomResult> {
        self.results
            .lock()
            .iter()
            .filter(|r| r.atom_id == atom_id)
            .cloned()
            .collect()
    }

    /// Latest upserted state of each entry, in first-seen order
    pub fn entries(&self) -> Vec<ReviewQueueEntry> {
        let raw = self.entries.lock();
        let mut latest: Vec<ReviewQueueEntry> = Vec::new();
        for entry in raw.iter() {
            match latest.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => latest.push(entry.clone()),
            }
        }
        latest
    }

    pub fn waves_for(&self, run_id: RunId) -> Vec<Wave> {
        self.waves.get(&run_id).map(|w| w.clone()).unwrap_or_default()
    }

    pub fn validations(&self) -> Vec<ValidationResult> {
        self.validations.lock().clone()
    }
}

#[async_trait::async_trait]
impl PersistenceStore for RecordingStore {
    async fn upsert_atom(&self, atom: &Atom) -> Result<(), PersistenceError> {
        self.atoms.insert(atom.id, atom.clone());
        Ok(())
    }

    async fn append_result(&self, result: &AtomResult) -> Result<(), PersistenceError> {
        self.results.lock().push(result.clone());
        Ok(())
    }

    async fn upsert_entry(&self, entry: &ReviewQueueEntry) -> Result<(), PersistenceError> {
        self.entries.lock().push(entry.clone());
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

/// One task per payload, all in a single milestone
pub fn plan_of_payloads(payloads: &[&str]) -> Plan {
    let mut milestone = Milestone::new("milestone");
    for (i, payload) in payloads.iter().enumerate() {
        milestone = milestone.with_task(
            TaskSpec::new(format!("task {i}"), *payload)
                .with_target_file(format!("src/task_{i}.rs"))
                .with_language("rust"),
        );
    }
    Plan::new("test plan").with_phase(Phase::new("phase").with_milestone(milestone))
}

/// Single-task plan
pub fn single_task_plan(payload: &str) -> Plan {
    plan_of_payloads(&[payload])
}

/// Poll until the run loop finishes, panicking after ~5 seconds
pub async fn wait_finished(coordinator: &RunCoordinator, handle: &RunHandle) -> RunStatus {
    for _ in 0..500 {
        let status = coordinator.status(handle).expect("run should exist");
        if status.finished {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run did not finish in time");
}

/// Poll until a predicate holds on the run status, panicking after ~5 seconds
pub async fn wait_until(
    coordinator: &RunCoordinator,
    handle: &RunHandle,
    predicate: impl Fn(&RunStatus) -> bool,
) -> RunStatus {
    for _ in 0..500 {
        let status = coordinator.status(handle).expect("run should exist");
        if predicate(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition did not hold in time");
}
