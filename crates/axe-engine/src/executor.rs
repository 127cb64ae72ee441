//! Bounded-concurrency wave execution
//!
//! Dispatches one wave's atoms into a `JoinSet`, each task gated by a
//! global semaphore: the bound applies across the whole wave, not per task.
//! One atom's failure never cancels its siblings. Results are persisted
//! after each completion, not batched at end-of-wave.

use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::retry::{AtomOutcome, RetryOrchestrator};
use crate::state::RunState;
use crate::traits::PersistenceStore;
use axe_atom::{AtomId, AtomStatus};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Executes the atoms of one wave concurrently
pub struct ConcurrentExecutor {
    semaphore: Arc<Semaphore>,
    retry: Arc<RetryOrchestrator>,
    store: Arc<dyn PersistenceStore>,
    events: EventBus,
}

impl ConcurrentExecutor {
    /// Create an executor with a global concurrency bound
    #[must_use]
    pub fn new(
        max_concurrency: usize,
        retry: Arc<RetryOrchestrator>,
        store: Arc<dyn PersistenceStore>,
        events: EventBus,
    ) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            retry,
            store,
            events,
        }
    }

    /// Execute the eligible atoms of one wave to terminal states
    ///
    /// Returns one outcome per dispatched atom. Atoms not dispatched due to
    /// cancellation are absent from the result.
    ///
    /// # Errors
    /// Only infrastructure failures (persistence) raise; they abort the run
    /// after every in-flight sibling has finished.
    pub async fn execute_wave(
        &self,
        state: &Arc<RunState>,
        eligible: &[AtomId],
    ) -> Result<Vec<AtomOutcome>, EngineError> {
        let mut set: JoinSet<Result<Option<AtomOutcome>, EngineError>> = JoinSet::new();

        for &atom_id in eligible {
            let semaphore = Arc::clone(&self.semaphore);
            let retry = Arc::clone(&self.retry);
            let store = Arc::clone(&self.store);
            let events = self.events.clone();
            let state = Arc::clone(state);

            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Ok(None);
                };
                if state.is_cancelled() {
                    return Ok(None);
                }

                state.transition(atom_id, AtomStatus::InProgress)?;
                events.emit(EngineEvent::AtomStatusChanged {
                    run_id: state.run_id,
                    atom_id,
                    status: AtomStatus::InProgress,
                });

                let outcome = retry.run_atom(&state, atom_id).await?;

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

                let atom = state
                    .atom(atom_id)
                    .ok_or(EngineError::UnknownAtom(atom_id))?;
                store.upsert_atom(&atom).await?;
                events.emit(EngineEvent::AtomStatusChanged {
                    run_id: state.run_id,
                    atom_id,
                    status: final_status,
                });

                Ok(Some(outcome))
            });
        }

        let mut outcomes = Vec::new();
        let mut first_error: Option<EngineError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(Some(outcome))) => outcomes.push(outcome),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "atom execution aborted");
                    first_error.get_or_insert(e);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "atom task panicked");
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }
}
