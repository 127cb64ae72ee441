//! Bounded retry with exponential backoff
//!
//! The orchestrator owns a single atom's execution slot for the duration of
//! `run_atom`: no two attempts for the same atom are ever in flight at
//! once. Every attempt, successful or not, appends one result to the
//! append-only history and persists it immediately.

use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::state::RunState;
use crate::traits::{CodeGenerator, PersistenceStore};
use axe_atom::{AtomId, AtomResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backoff policy for failed attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Base delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling on any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    #[inline]
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before the attempt following `failed_attempt`
    ///
    /// Doubles per failure: base × 2^(n-1), capped at `max_delay`.
    #[must_use]
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Final outcome of one atom's attempt loop
#[derive(Debug, Clone)]
pub struct AtomOutcome {
    /// Atom the outcome belongs to
    pub atom_id: AtomId,
    /// Whether the final attempt succeeded
    pub succeeded: bool,
    /// Confidence reported by the successful attempt
    pub confidence: f64,
    /// Attempts consumed in total
    pub attempts: u32,
    /// Output of the successful attempt
    pub output: Option<String>,
    /// Failure detail of the last failed attempt
    pub last_error: Option<String>,
    /// The attempt cap was reached without success
    pub retry_exhausted: bool,
}

/// Drives one atom through its bounded attempt loop
pub struct RetryOrchestrator {
    generator: Arc<dyn CodeGenerator>,
    store: Arc<dyn PersistenceStore>,
    events: EventBus,
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    /// Create an orchestrator
    #[must_use]
    pub fn new(
        generator: Arc<dyn CodeGenerator>,
        store: Arc<dyn PersistenceStore>,
        events: EventBus,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            store,
            events,
            policy,
        }
    }

    /// Run one atom to a terminal outcome within its attempt budget
    ///
    /// # Errors
    /// Only persistence failures raise; generation failures are contained
    /// in the outcome.
    pub async fn run_atom(
        &self,
        state: &RunState,
        atom_id: AtomId,
    ) -> Result<AtomOutcome, EngineError> {
        let mut atom = state.atom(atom_id).ok_or(EngineError::UnknownAtom(atom_id))?;
        let mut prior_failure: Option<String> = None;

        loop {
            let attempt = atom.attempts + 1;
            let outcome = self
                .attempt_once(state, &atom, attempt, prior_failure.as_deref())
                .await?;

            atom.attempts = attempt;
            state.with_atom_mut(atom_id, |a| a.attempts = attempt);

            match outcome {
                Ok(generated) => {
                    return Ok(AtomOutcome {
                        atom_id,
                        succeeded: true,
                        confidence: generated.confidence,
                        attempts: attempt,
                        output: Some(generated.output),
                        last_error: None,
                        retry_exhausted: false,
                    });
                }
                Err(detail) => {
                    prior_failure = Some(detail);
                    if atom.attempts >= atom.max_attempts {
                        tracing::warn!(atom_id = %atom_id, attempts = atom.attempts, "retry budget exhausted");
                        return Ok(AtomOutcome {
                            atom_id,
                            succeeded: false,
                            confidence: 0.0,
                            attempts: atom.attempts,
                            output: None,
                            last_error: prior_failure,
                            retry_exhausted: true,
                        });
                    }

                    let delay = self.policy.backoff(attempt);
                    self.events.emit(EngineEvent::AtomRetryScheduled {
                        run_id: state.run_id,
                        atom_id,
                        attempt: attempt + 1,
                        delay_ms: delay.as_millis() as u64,
                    });
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One additional attempt outside the normal budget (review edit)
    ///
    /// The result record continues the attempt numbering; the atom's
    /// consumed-attempt counter stays within its declared cap.
    pub async fn run_extra_attempt(
        &self,
        state: &RunState,
        atom_id: AtomId,
        feedback: Option<&str>,
    ) -> Result<AtomOutcome, EngineError> {
        let atom = state.atom(atom_id).ok_or(EngineError::UnknownAtom(atom_id))?;
        let attempt = atom.attempts + 1;

        match self.attempt_once(state, &atom, attempt, feedback).await? {
            Ok(generated) => Ok(AtomOutcome {
                atom_id,
                succeeded: true,
                confidence: generated.confidence,
                attempts: atom.attempts,
                output: Some(generated.output),
                last_error: None,
                retry_exhausted: false,
            }),
            Err(detail) => Ok(AtomOutcome {
                atom_id,
                succeeded: false,
                confidence: 0.0,
                attempts: atom.attempts,
                output: None,
                last_error: Some(detail),
                retry_exhausted: false,
            }),
        }
    }

    async fn attempt_once(
        &self,
        state: &RunState,
        atom: &axe_atom::Atom,
        attempt: u32,
        prior_failure: Option<&str>,
    ) -> Result<Result<crate::traits::Generated, String>, EngineError> {
        let started = Instant::now();
        let generation = self.generator.generate(atom, prior_failure).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match generation {
            Ok(generated) => {
                let record = state.results.append(AtomResult::succeeded(
                    atom.id,
                    attempt,
                    generated.output.clone(),
                    duration_ms,
                ));
                self.store.append_result(&record).await?;
                Ok(Ok(generated))
            }
            Err(e) => {
                let record = state.results.append(AtomResult::failed(
                    atom.id,
                    attempt,
                    e.0.clone(),
                    duration_ms,
                ));
                self.store.append_result(&record).await?;
                Ok(Err(e.0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(10), Duration::from_millis(350));
    }

    #[test]
    fn backoff_handles_first_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), policy.base_delay);
    }
}
