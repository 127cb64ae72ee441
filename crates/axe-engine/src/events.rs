//! Progress event stream
//!
//! The engine publishes to a bounded channel that an external subscriber
//! drains. Emission is fire-and-forget: a full or closed channel drops the
//! event and never affects execution.

use axe_atom::{AtomId, AtomStatus, EntryId, PlanId, PlanStatus, RunId};
use serde::Serialize;
use tokio::sync::mpsc;

/// Progress events emitted during a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A run began
    PlanStarted {
        /// Run identifier
        run_id: RunId,
        /// Plan being executed
        plan_id: PlanId,
        /// Atoms produced by decomposition
        total_atoms: usize,
    },
    /// A wave began executing
    WaveStarted {
        /// Run identifier
        run_id: RunId,
        /// Wave number
        number: u32,
        /// Atoms dispatched in this wave
        size: usize,
    },
    /// A wave reached a terminal decision for every atom
    WaveCompleted {
        /// Run identifier
        run_id: RunId,
        /// Wave number
        number: u32,
    },
    /// An atom changed scheduling state
    AtomStatusChanged {
        /// Run identifier
        run_id: RunId,
        /// Atom that changed
        atom_id: AtomId,
        /// New status
        status: AtomStatus,
    },
    /// A failed attempt scheduled a backed-off retry
    AtomRetryScheduled {
        /// Run identifier
        run_id: RunId,
        /// Atom being retried
        atom_id: AtomId,
        /// Attempt number about to run
        attempt: u32,
        /// Backoff delay before it runs
        delay_ms: u64,
    },
    /// An atom was enqueued for human review
    ReviewQueued {
        /// Run identifier
        run_id: RunId,
        /// Queue entry
        entry_id: EntryId,
        /// Atom under review
        atom_id: AtomId,
    },
    /// The run finished with an aggregate status
    PlanFinished {
        /// Run identifier
        run_id: RunId,
        /// Final aggregate status
        status: PlanStatus,
    },
}

/// Publisher half of the progress stream
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bounded bus and its subscriber half
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Publish an event; drops it if the subscriber is full or gone
    pub fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::trace!("progress event dropped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (bus, mut rx) = EventBus::bounded(8);
        let run_id = RunId::new();

        bus.emit(EngineEvent::WaveStarted {
            run_id,
            number: 0,
            size: 2,
        });
        bus.emit(EngineEvent::WaveCompleted { run_id, number: 0 });

        assert!(matches!(
            rx.recv().await,
            Some(EngineEvent::WaveStarted { number: 0, .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(EngineEvent::WaveCompleted { number: 0, .. })
        ));
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let (bus, mut rx) = EventBus::bounded(1);
        let run_id = RunId::new();

        bus.emit(EngineEvent::WaveCompleted { run_id, number: 0 });
        // Dropped: the subscriber has not drained.
        bus.emit(EngineEvent::WaveCompleted { run_id, number: 1 });

        assert!(matches!(
            rx.recv().await,
            Some(EngineEvent::WaveCompleted { number: 0, .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_subscriber_is_harmless() {
        let (bus, rx) = EventBus::bounded(1);
        drop(rx);
        bus.emit(EngineEvent::WaveCompleted {
            run_id: RunId::new(),
            number: 0,
        });
    }
}
