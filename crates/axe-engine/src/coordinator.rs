//! The run coordinator
//!
//! Top-level driver: decompose → build graph → schedule waves → per wave
//! execute with retries → validate → route reviews, aggregating the final
//! plan status. Constructed once per process with concrete collaborators
//! injected; there is no hidden global and no test double baked into
//! production wiring.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::executor::ConcurrentExecutor;
use crate::retry::{RetryOrchestrator, RetryPolicy};
use crate::review::ReviewRouter;
use crate::state::{RunState, RunStatus};
use crate::traits::{CodeGenerator, PersistenceStore};
use axe_atom::{
    Atom, AtomId, AtomStatus, EntryId, MilestoneId, Plan, ReviewDecision, RunId, TaskId,
};
use axe_decompose::AtomDecomposer;
use axe_graph::{DependencyGraphBuilder, Wave, WaveScheduler};
use axe_validate::{ValidationGate, ValidationLevel, ValidationResult, ValidationScope};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque handle to a started run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle {
    run_id: RunId,
}

impl RunHandle {
    /// The run's identifier
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}

/// Orchestrates whole-plan runs
pub struct RunCoordinator {
    config: EngineConfig,
    decomposer: Arc<AtomDecomposer>,
    gate: Arc<ValidationGate>,
    router: ReviewRouter,
    executor: Arc<ConcurrentExecutor>,
    retry: Arc<RetryOrchestrator>,
    store: Arc<dyn PersistenceStore>,
    events: EventBus,
    runs: DashMap<RunId, Arc<RunState>>,
}

impl RunCoordinator {
    /// Wire a coordinator from its collaborators
    ///
    /// Returns the coordinator and the subscriber half of its progress
    /// stream.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        generator: Arc<dyn CodeGenerator>,
        store: Arc<dyn PersistenceStore>,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, rx) = EventBus::bounded(config.event_capacity);
        let policy = RetryPolicy::new(config.retry_base_delay, config.retry_max_delay);
        let retry = Arc::new(RetryOrchestrator::new(
            generator,
            Arc::clone(&store),
            events.clone(),
            policy,
        ));
        let executor = Arc::new(ConcurrentExecutor::new(
            config.max_concurrency,
            Arc::clone(&retry),
            Arc::clone(&store),
            events.clone(),
        ));
        let decomposer = Arc::new(
            AtomDecomposer::new()
                .with_granularity(config.granularity)
                .with_atomicity_threshold(config.atomicity_threshold)
                .with_max_attempts(config.max_attempts),
        );
        let router = ReviewRouter::new(config.confidence_threshold);

        (
            Self {
                config,
                decomposer,
                gate: Arc::new(ValidationGate::new()),
                router,
                executor,
                retry,
                store,
                events,
                runs: DashMap::new(),
            },
            rx,
        )
    }

    /// Replace the decomposer (e.g. to attach a context provider)
    #[must_use]
    pub fn with_decomposer(mut self, decomposer: Arc<AtomDecomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    /// Replace the validation gate
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<ValidationGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Decompose, schedule, and start executing a plan
    ///
    /// # Errors
    /// `CycleDetected` is fatal before any wave is computed or any atom
    /// executed; persistence failures abort the start.
    pub async fn start(&self, plan: Plan) -> Result<RunHandle, EngineError> {
        let run_id = RunId::new();
        let mut atoms: Vec<Atom> = Vec::new();
        let mut milestones: Vec<(MilestoneId, Vec<TaskId>)> = Vec::new();

        for milestone in plan.milestones() {
            let mut task_ids = Vec::new();
            for task in &milestone.tasks {
                task_ids.push(task.id);
                match self.decomposer.decompose(task).await {
                    Ok(mut task_atoms) => atoms.append(&mut task_atoms),
                    Err(e) => {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %e,
                            "task failed decomposition, contributing zero atoms"
                        );
                    }
                }
            }
            milestones.push((milestone.id, task_ids));
        }

        let graph = DependencyGraphBuilder::new().build(&atoms)?;
        let waves = WaveScheduler::new().schedule(&graph)?;
        tracing::info!(
            run_id = %run_id,
            atoms = atoms.len(),
            waves = waves.len(),
            "plan scheduled"
        );

        for atom in &atoms {
            self.store.upsert_atom(atom).await?;
        }
        self.store.record_waves(run_id, &waves).await?;

        let state = Arc::new(RunState::new(
            run_id, plan.id, atoms, graph, waves, milestones,
        ));
        self.runs.insert(run_id, Arc::clone(&state));

        let driver = RunDriver {
            config: self.config.clone(),
            executor: Arc::clone(&self.executor),
            router: self.router,
            gate: Arc::clone(&self.gate),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            state,
        };
        tokio::spawn(async move { driver.run().await });

        Ok(RunHandle { run_id })
    }

    /// Aggregate status plus the full per-atom snapshot
    pub fn status(&self, handle: &RunHandle) -> Result<RunStatus, EngineError> {
        let state = self
            .runs
            .get(&handle.run_id)
            .ok_or(EngineError::UnknownRun(handle.run_id))?;
        Ok(state.snapshot())
    }

    /// Plan-wide aggregate validation score: the mean over whichever levels
    /// have run so far
    pub fn validation_score(&self, handle: &RunHandle) -> Result<f64, EngineError> {
        let state = self
            .runs
            .get(&handle.run_id)
            .ok_or(EngineError::UnknownRun(handle.run_id))?;
        Ok(ValidationResult::aggregate_score(&state.validations()))
    }

    /// Abandon a run: in-flight atoms finish, nothing new is dispatched
    pub fn cancel(&self, handle: &RunHandle) -> Result<(), EngineError> {
        let state = self
            .runs
            .get(&handle.run_id)
            .ok_or(EngineError::UnknownRun(handle.run_id))?;
        state.cancel();
        Ok(())
    }

    /// Apply a human reviewer's decision to a queue entry
    ///
    /// Approve treats the atom as completed; reject as terminally failed;
    /// edit grants one extra execution attempt outside the retry budget.
    pub async fn resolve_review(
        &self,
        entry_id: EntryId,
        decision: ReviewDecision,
        feedback: Option<String>,
    ) -> Result<(), EngineError> {
        let state = self
            .runs
            .iter()
            .find(|r| r.value().entry(entry_id).is_some())
            .map(|r| Arc::clone(r.value()))
            .ok_or(EngineError::UnknownEntry(entry_id))?;

        let entry = state
            .entry(entry_id)
            .ok_or(EngineError::UnknownEntry(entry_id))?;
        if !entry.is_pending() {
            return Err(EngineError::EntryAlreadyResolved(entry_id));
        }
        let atom_id = entry.atom_id;

        state.with_entry_mut(entry_id, |e| e.resolve(&decision, feedback.clone()));
        state.with_atom_mut(atom_id, |a| a.needs_review = false);

        match &decision {
            ReviewDecision::Approve => {
                if state.status_of(atom_id) == Some(AtomStatus::Failed) {
                    state.transition(atom_id, AtomStatus::Completed)?;
                    self.emit_status(&state, atom_id, AtomStatus::Completed);
                }
            }
            ReviewDecision::Reject => {
                if state.status_of(atom_id) == Some(AtomStatus::Completed) {
                    state.transition(atom_id, AtomStatus::Failed)?;
                    self.emit_status(&state, atom_id, AtomStatus::Failed);
                }
            }
            ReviewDecision::Edit {
                replacement_payload,
            } => {
                if let Some(payload) = replacement_payload {
                    state.with_atom_mut(atom_id, |a| a.payload = payload.clone());
                }
                self.run_edit_attempt(&state, atom_id, feedback.as_deref())
                    .await?;
            }
        }

        if let Some(updated) = state.entry(entry_id) {
            self.store.upsert_entry(&updated).await?;
        }
        if let Some(atom) = state.atom(atom_id) {
            self.store.upsert_atom(&atom).await?;
        }
        state.review_notify.notify_waiters();
        Ok(())
    }

    /// One additional attempt granted by a reviewer edit
    async fn run_edit_attempt(
        &self,
        state: &Arc<RunState>,
        atom_id: AtomId,
        feedback: Option<&str>,
    ) -> Result<(), EngineError> {
        if state.status_of(atom_id) == Some(AtomStatus::Completed) {
            state.transition(atom_id, AtomStatus::Failed)?;
        }
        state.transition(atom_id, AtomStatus::Ready)?;
        state.transition(atom_id, AtomStatus::InProgress)?;
        self.emit_status(state, atom_id, AtomStatus::InProgress);

        let outcome = self.retry.run_extra_attempt(state, atom_id, feedback).await?;

        let final_status = if outcome.succeeded {
            AtomStatus::Completed
        } else {
            AtomStatus::Failed
        };
        state.with_atom_mut(atom_id, |a| a.set_confidence(outcome.confidence));
        if let Some(output) = &outcome.output {
            state.set_output(atom_id, output.clone());
        }
        state.transition(atom_id, final_status)?;
        self.emit_status(state, atom_id, final_status);
        Ok(())
    }

    fn emit_status(&self, state: &RunState, atom_id: AtomId, status: AtomStatus) {
        self.events.emit(EngineEvent::AtomStatusChanged {
            run_id: state.run_id,
            atom_id,
            status,
        });
    }
}

/// Owns one run's wave loop on a spawned task
struct RunDriver {
    config: EngineConfig,
    executor: Arc<ConcurrentExecutor>,
    router: ReviewRouter,
    gate: Arc<ValidationGate>,
    store: Arc<dyn PersistenceStore>,
    events: EventBus,
    state: Arc<RunState>,
}

impl RunDriver {
    async fn run(self) {
        let state = Arc::clone(&self.state);
        self.events.emit(EngineEvent::PlanStarted {
            run_id: state.run_id,
            plan_id: state.plan_id,
            total_atoms: state.total_atoms(),
        });

        let mut validated_tasks: HashSet<TaskId> = HashSet::new();
        let mut validated_milestones: HashSet<MilestoneId> = HashSet::new();
        let waves = state.waves.clone();

        for wave in &waves {
            if state.is_cancelled() {
                tracing::info!(run_id = %state.run_id, "run cancelled, stopping dispatch");
                break;
            }
            if let Err(e) = self
                .run_wave(wave, &mut validated_tasks, &mut validated_milestones)
                .await
            {
                tracing::error!(run_id = %state.run_id, error = %e, "run aborted");
                break;
            }
        }

        if !state.is_cancelled() {
            if let Err(e) = self.validate_plan().await {
                tracing::warn!(run_id = %state.run_id, error = %e, "plan validation incomplete");
            }
        }

        let final_status = state.aggregate();
        tracing::info!(run_id = %state.run_id, status = %final_status, "run finished");
        self.events.emit(EngineEvent::PlanFinished {
            run_id: state.run_id,
            status: final_status,
        });
        state.finish();
    }

    async fn run_wave(
        &self,
        wave: &Wave,
        validated_tasks: &mut HashSet<TaskId>,
        validated_milestones: &mut HashSet<MilestoneId>,
    ) -> Result<(), EngineError> {
        let state = &self.state;

        self.wait_for_review_blockers(wave).await;
        if state.is_cancelled() {
            return Ok(());
        }

        let mut eligible = Vec::new();
        for &atom_id in &wave.atoms {
            let deps = state.graph.deps_of(atom_id)?;
            let failed_dep = deps
                .iter()
                .find(|d| state.status_of(**d) == Some(AtomStatus::Failed))
                .copied();

            if let Some(dep) = failed_dep {
                state.with_atom_mut(atom_id, |a| {
                    a.skip_reason = Some(format!("dependency {dep} failed"));
                });
                state.transition(atom_id, AtomStatus::Failed)?;
                if let Some(atom) = state.atom(atom_id) {
                    self.store.upsert_atom(&atom).await?;
                }
                self.events.emit(EngineEvent::AtomStatusChanged {
                    run_id: state.run_id,
                    atom_id,
                    status: AtomStatus::Failed,
                });
                continue;
            }

            state.transition(atom_id, AtomStatus::Ready)?;
            self.events.emit(EngineEvent::AtomStatusChanged {
                run_id: state.run_id,
                atom_id,
                status: AtomStatus::Ready,
            });
            eligible.push(atom_id);
        }

        self.events.emit(EngineEvent::WaveStarted {
            run_id: state.run_id,
            number: wave.number,
            size: eligible.len(),
        });
        tracing::debug!(run_id = %state.run_id, wave = wave.number, size = eligible.len(), "wave dispatched");

        let outcomes = self.executor.execute_wave(state, &eligible).await?;

        for outcome in &outcomes {
            let atom = state
                .atom(outcome.atom_id)
                .ok_or(EngineError::UnknownAtom(outcome.atom_id))?;
            let blocked = state.graph.blocked_dependents(atom.id)?;
            if let Some(entry) = self.router.route(&atom, outcome, blocked) {
                self.enqueue_review(entry).await?;
            }
        }

        self.validate_wave(wave, validated_tasks, validated_milestones)
            .await?;

        if self.config.strict_validation {
            self.wait_for_all_reviews().await;
        }

        self.events.emit(EngineEvent::WaveCompleted {
            run_id: state.run_id,
            number: wave.number,
        });
        Ok(())
    }

    /// Park until no dependency of this wave has an unresolved review entry
    async fn wait_for_review_blockers(&self, wave: &Wave) {
        let state = &self.state;
        loop {
            let notified = state.review_notify.notified();
            if state.is_cancelled() {
                return;
            }
            let blocked = wave.atoms.iter().any(|&atom_id| {
                state
                    .graph
                    .deps_of(atom_id)
                    .map(|deps| deps.iter().any(|&d| state.has_pending_review(d)))
                    .unwrap_or(false)
            });
            if !blocked {
                return;
            }
            tracing::debug!(run_id = %state.run_id, wave = wave.number, "waiting on review resolutions");
            notified.await;
        }
    }

    /// Strict mode: park until every pending entry is resolved
    async fn wait_for_all_reviews(&self) {
        let state = &self.state;
        loop {
            let notified = state.review_notify.notified();
            if state.is_cancelled() || state.pending_review_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn enqueue_review(&self, entry: axe_atom::ReviewQueueEntry) -> Result<(), EngineError> {
        let state = &self.state;
        state.with_atom_mut(entry.atom_id, |a| {
            a.needs_review = true;
            a.review_priority = Some(entry.priority);
        });
        state.insert_entry(entry.clone());
        self.store.upsert_entry(&entry).await?;
        if let Some(atom) = state.atom(entry.atom_id) {
            self.store.upsert_atom(&atom).await?;
        }
        self.events.emit(EngineEvent::ReviewQueued {
            run_id: state.run_id,
            entry_id: entry.id,
            atom_id: entry.atom_id,
        });
        Ok(())
    }

    /// Post-wave validation: atomic for the wave's atoms, then task and
    /// milestone levels as their units reach terminal states
    async fn validate_wave(
        &self,
        wave: &Wave,
        validated_tasks: &mut HashSet<TaskId>,
        validated_milestones: &mut HashSet<MilestoneId>,
    ) -> Result<(), EngineError> {
        let state = &self.state;
        let outputs = state.outputs_snapshot();

        for &atom_id in &wave.atoms {
            let Some(atom) = state.atom(atom_id) else {
                continue;
            };
            if !atom.status.is_terminal() || atom.skip_reason.is_some() {
                continue;
            }
            let subject = atom_id.to_string();
            let atoms = [atom.clone()];
            let scope = ValidationScope::over(&subject, &atoms, &outputs);
            match self.gate.validate(ValidationLevel::Atomic, &scope).await {
                Ok(result) => self.record_validation(&atom, result).await?,
                Err(e) => tracing::warn!(atom_id = %atom_id, error = %e, "atomic validation skipped"),
            }
        }

        let by_task = self.atoms_by_task();
        for (task_id, task_atoms) in &by_task {
            if validated_tasks.contains(task_id)
                || !task_atoms.iter().all(|a| a.status.is_terminal())
            {
                continue;
            }
            let subject = task_id.to_string();
            let lower = self.results_for(ValidationLevel::Atomic, |s| {
                task_atoms.iter().any(|a| a.id.to_string() == s)
            });
            let scope = ValidationScope::over(&subject, task_atoms, &outputs).with_lower(&lower);
            match self.gate.validate(ValidationLevel::Task, &scope).await {
                Ok(result) => {
                    self.store.record_validation(state.run_id, &result).await?;
                    state.push_validation(result);
                    validated_tasks.insert(*task_id);
                }
                Err(e) => tracing::warn!(task_id = %task_id, error = %e, "task validation skipped"),
            }
        }

        let milestones = state.milestones().to_vec();
        for (milestone_id, task_ids) in &milestones {
            if validated_milestones.contains(milestone_id)
                || !task_ids.iter().all(|t| {
                    by_task
                        .iter()
                        .find(|(id, _)| id == t)
                        .map_or(true, |(_, atoms)| {
                            atoms.iter().all(|a| a.status.is_terminal())
                        })
                })
            {
                continue;
            }
            let milestone_atoms: Vec<Atom> = by_task
                .iter()
                .filter(|(id, _)| task_ids.contains(id))
                .flat_map(|(_, atoms)| atoms.iter().cloned())
                .collect();
            let subject = milestone_id.to_string();
            let lower = self.results_for(ValidationLevel::Task, |s| {
                task_ids.iter().any(|t| t.to_string() == s)
            });
            let scope =
                ValidationScope::over(&subject, &milestone_atoms, &outputs).with_lower(&lower);
            match self.gate.validate(ValidationLevel::Milestone, &scope).await {
                Ok(result) => {
                    self.store.record_validation(state.run_id, &result).await?;
                    state.push_validation(result);
                    validated_milestones.insert(*milestone_id);
                }
                Err(e) => {
                    tracing::warn!(milestone_id = %milestone_id, error = %e, "milestone validation skipped");
                }
            }
        }

        Ok(())
    }

    /// Architecture-wide checks once every wave has settled
    async fn validate_plan(&self) -> Result<(), EngineError> {
        let state = &self.state;
        let outputs = state.outputs_snapshot();
        let atoms: Vec<Atom> = state
            .snapshot()
            .atoms
            .iter()
            .filter_map(|s| state.atom(s.atom_id))
            .collect();
        let subject = state.plan_id.to_string();
        let lower = self.results_for(ValidationLevel::Milestone, |_| true);

        let scope = ValidationScope::over(&subject, &atoms, &outputs)
            .with_graph(&state.graph, &state.waves)
            .with_lower(&lower);
        let result = self.gate.validate(ValidationLevel::Plan, &scope).await?;
        self.store.record_validation(state.run_id, &result).await?;
        state.push_validation(result);
        Ok(())
    }

    async fn record_validation(
        &self,
        atom: &Atom,
        result: ValidationResult,
    ) -> Result<(), EngineError> {
        let state = &self.state;
        self.store.record_validation(state.run_id, &result).await?;

        if !result.valid && self.config.strict_validation && !state.has_pending_review(atom.id) {
            let blocked = state.graph.blocked_dependents(atom.id)?;
            if let Some(entry) = self.router.route_validation(atom, &result, blocked) {
                self.enqueue_review(entry).await?;
            }
        }

        state.push_validation(result);
        Ok(())
    }

    fn results_for(
        &self,
        level: ValidationLevel,
        subject_matches: impl Fn(&str) -> bool,
    ) -> Vec<ValidationResult> {
        self.state
            .validations()
            .into_iter()
            .filter(|r| r.level == level && subject_matches(&r.subject))
            .collect()
    }

    /// Atoms grouped by task in decomposition order
    fn atoms_by_task(&self) -> Vec<(TaskId, Vec<Atom>)> {
        let mut grouped: Vec<(TaskId, Vec<Atom>)> = Vec::new();
        for snapshot in self.state.snapshot().atoms {
            let Some(atom) = self.state.atom(snapshot.atom_id) else {
                continue;
            };
            match grouped.iter_mut().find(|(id, _)| *id == atom.task_id) {
                Some((_, atoms)) => atoms.push(atom),
                None => grouped.push((atom.task_id, vec![atom])),
            }
        }
        grouped
    }
}
