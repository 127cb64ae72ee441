use axe_atom::{AtomStatus, PlanStatus, ReviewDecision, ReviewStatus};
use axe_engine::{EngineConfig, EngineError, EngineEvent, RunCoordinator};
use axe_test_utils::{
    plan_of_payloads, single_task_plan, wait_finished, RecordingStore, ScriptedGenerator,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> EngineConfig {
    EngineConfig::new().with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

fn build(
    config: EngineConfig,
    generator: ScriptedGenerator,
) -> (
    RunCoordinator,
    Arc<ScriptedGenerator>,
    Arc<RecordingStore>,
    tokio::sync::mpsc::Receiver<EngineEvent>,
) {
    let generator = Arc::new(generator);
    let store = Arc::new(RecordingStore::new());
    let (coordinator, rx) = RunCoordinator::new(
        config,
        Arc::clone(&generator) as Arc<dyn axe_engine::CodeGenerator>,
        Arc::clone(&store) as Arc<dyn axe_engine::PersistenceStore>,
    );
    (coordinator, generator, store, rx)
}

// A -> B -> C dependency chain: three waves, all succeed first try,
// aggregate completed.
#[tokio::test]
async fn chain_of_three_completes_in_three_waves() {
    let payload = "fn a() {}\n\nfn b() {\n    a()\n}\n\nfn c() {\n    b()\n}";
    let (coordinator, generator, store, _rx) = build(fast_config(), ScriptedGenerator::new());

    let handle = coordinator.start(single_task_plan(payload)).await.unwrap();
    let status = wait_finished(&coordinator, &handle).await;

    assert_eq!(status.status, PlanStatus::Completed);
    assert_eq!(status.atoms.len(), 3);
    assert!(status.atoms.iter().all(|a| a.status == AtomStatus::Completed));
    assert!(status.atoms.iter().all(|a| a.attempts == 1));

    let waves = store.waves_for(handle.run_id());
    assert_eq!(waves.len(), 3);
    assert!(waves.iter().all(|w| w.len() == 1));
    assert_eq!(generator.total_attempts(), 3);
}

// Two independent atoms, concurrency limit 1: both land in wave 0 and both
// complete.
#[tokio::test]
async fn independent_atoms_share_wave_zero_under_concurrency_one() {
    let (coordinator, _generator, store, _rx) = build(
        fast_config().with_max_concurrency(1),
        ScriptedGenerator::new(),
    );

    let plan = plan_of_payloads(&["fn x() {}", "fn y() {}"]);
    let handle = coordinator.start(plan).await.unwrap();
    let status = wait_finished(&coordinator, &handle).await;

    assert_eq!(status.status, PlanStatus::Completed);
    assert_eq!(status.atoms.len(), 2);
    assert!(status.atoms.iter().all(|a| a.status == AtomStatus::Completed));

    let waves = store.waves_for(handle.run_id());
    assert_eq!(waves.len(), 1);
    assert_eq!(waves[0].len(), 2);
}

// An atom that never succeeds: exactly max_attempts results recorded, the
// atom ends failed, and exactly one review entry exists with reason
// "retry exhausted".
#[tokio::test]
async fn retry_exhaustion_records_capped_history_and_one_entry() {
    let (coordinator, generator, store, _rx) = build(
        fast_config().with_max_attempts(3),
        ScriptedGenerator::new().always_fail("doomed"),
    );

    let handle = coordinator
        .start(single_task_plan("fn doomed() {}"))
        .await
        .unwrap();
    let status = wait_finished(&coordinator, &handle).await;

    assert_eq!(status.status, PlanStatus::Failed);
    let atom = &status.atoms[0];
    assert_eq!(atom.status, AtomStatus::Failed);
    assert_eq!(atom.attempts, 3);
    assert!(atom.needs_review);

    assert_eq!(store.results_for(atom.atom_id).len(), 3);
    assert_eq!(generator.attempts_for(atom.atom_id), 3);

    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, "retry exhausted");
}

// A cyclic dependency is fatal before any wave is computed: zero
// executions are attempted.
#[tokio::test]
async fn cycle_prevents_all_execution() {
    let (coordinator, generator, store, _rx) = build(fast_config(), ScriptedGenerator::new());

    let mut payloads = vec![
        "fn alpha() {\n    beta()\n}",
        "fn beta() {\n    alpha()\n}",
    ];
    let fillers: Vec<String> = (0..8).map(|i| format!("fn filler_{i}() {{}}")).collect();
    payloads.extend(fillers.iter().map(String::as_str));

    let err = coordinator
        .start(plan_of_payloads(&payloads))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Graph(axe_graph::GraphError::CycleDetected { .. })
    ));
    assert_eq!(generator.total_attempts(), 0);
    assert!(store.results().is_empty());
}

// Dependents of a failed atom are skipped: never in progress, zero
// attempts, with the skip visible in the snapshot.
#[tokio::test]
async fn dependents_of_failed_atom_are_skipped() {
    let payload = "fn doomed_base() {}\n\nfn dependent() {\n    doomed_base()\n}";
    let (coordinator, generator, store, _rx) = build(
        fast_config(),
        ScriptedGenerator::new().always_fail("doomed"),
    );

    let handle = coordinator.start(single_task_plan(payload)).await.unwrap();

    // The exhausted atom parks the run on its review entry.
    let entry = loop {
        let entries = store.entries();
        if let Some(entry) = entries.first() {
            break entry.clone();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    coordinator
        .resolve_review(entry.id, ReviewDecision::Reject, None)
        .await
        .unwrap();

    let status = wait_finished(&coordinator, &handle).await;
    assert_eq!(status.status, PlanStatus::Failed);

    let base = status.atoms.iter().find(|a| a.ordinal == 0).unwrap();
    let dependent = status.atoms.iter().find(|a| a.ordinal == 1).unwrap();

    assert_eq!(base.status, AtomStatus::Failed);
    assert_eq!(dependent.status, AtomStatus::Failed);
    assert_eq!(dependent.attempts, 0);
    assert!(dependent.skip_reason.as_deref().unwrap().contains("dependency"));
    assert_eq!(generator.attempts_for(dependent.atom_id), 0);
}

// A low-confidence success routes to review; approval keeps it completed.
#[tokio::test]
async fn low_confidence_success_is_reviewed_and_approved() {
    let (coordinator, _generator, store, _rx) = build(
        fast_config(),
        ScriptedGenerator::new().confidence_for("sketchy", 0.4),
    );

    let handle = coordinator
        .start(single_task_plan("fn sketchy() {}"))
        .await
        .unwrap();
    let status = wait_finished(&coordinator, &handle).await;

    let atom = &status.atoms[0];
    assert_eq!(atom.status, AtomStatus::Completed);
    assert!(atom.needs_review);

    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].reason.contains("low confidence"));

    coordinator
        .resolve_review(
            entries[0].id,
            ReviewDecision::Approve,
            Some("verified by hand".to_string()),
        )
        .await
        .unwrap();

    let status = coordinator.status(&handle).unwrap();
    assert_eq!(status.status, PlanStatus::Completed);
    assert!(!status.atoms[0].needs_review);
    assert_eq!(store.entries()[0].status, ReviewStatus::Approved);
    assert_eq!(
        store.entries()[0].feedback.as_deref(),
        Some("verified by hand")
    );
}

// Rejection converts a low-confidence success into a terminal failure.
#[tokio::test]
async fn rejection_fails_a_completed_atom() {
    let (coordinator, _generator, store, _rx) = build(
        fast_config(),
        ScriptedGenerator::new().confidence_for("sketchy", 0.4),
    );

    let handle = coordinator
        .start(single_task_plan("fn sketchy() {}"))
        .await
        .unwrap();
    wait_finished(&coordinator, &handle).await;

    let entry = store.entries()[0].clone();
    coordinator
        .resolve_review(entry.id, ReviewDecision::Reject, None)
        .await
        .unwrap();

    let status = coordinator.status(&handle).unwrap();
    assert_eq!(status.atoms[0].status, AtomStatus::Failed);
    assert_eq!(status.status, PlanStatus::Failed);

    // A second resolution of the same entry is rejected.
    let err = coordinator
        .resolve_review(entry.id, ReviewDecision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EntryAlreadyResolved(_)));
}

// An edit grants exactly one extra attempt outside the retry budget.
#[tokio::test]
async fn edit_grants_one_extra_attempt() {
    let (coordinator, generator, store, _rx) = build(
        fast_config().with_max_attempts(3),
        ScriptedGenerator::new().always_fail("hopeless"),
    );

    let handle = coordinator
        .start(single_task_plan("fn hopeless() {}"))
        .await
        .unwrap();
    let status = wait_finished(&coordinator, &handle).await;
    let atom_id = status.atoms[0].atom_id;
    assert_eq!(store.results_for(atom_id).len(), 3);

    let entry = store.entries()[0].clone();
    coordinator
        .resolve_review(
            entry.id,
            ReviewDecision::Edit {
                replacement_payload: Some("fn repaired() {}".to_string()),
            },
            Some("renamed and simplified".to_string()),
        )
        .await
        .unwrap();

    let status = coordinator.status(&handle).unwrap();
    assert_eq!(status.atoms[0].status, AtomStatus::Completed);
    assert_eq!(status.status, PlanStatus::Completed);

    // Three budgeted attempts plus the one granted by the edit.
    let history = store.results_for(atom_id);
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].attempt, 4);
    // The consumed budget stays within the declared cap.
    assert_eq!(status.atoms[0].attempts, 3);
    assert_eq!(generator.attempts_for(atom_id), 4);
}

// Cancellation lets in-flight atoms finish but dispatches nothing new.
#[tokio::test]
async fn cancellation_stops_dispatch() {
    let payload = "fn first() {}\n\nfn second() {\n    first()\n}\n\nfn third() {\n    second()\n}";
    let (coordinator, _generator, _store, _rx) = build(
        fast_config(),
        ScriptedGenerator::new().with_latency(Duration::from_millis(200)),
    );

    let handle = coordinator.start(single_task_plan(payload)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.cancel(&handle).unwrap();

    let status = wait_finished(&coordinator, &handle).await;
    assert!(status.cancelled);

    let completed = status
        .atoms
        .iter()
        .filter(|a| a.status == AtomStatus::Completed)
        .count();
    let pending = status
        .atoms
        .iter()
        .filter(|a| a.status == AtomStatus::Pending)
        .count();
    assert_eq!(completed, 1);
    assert_eq!(pending, 2);
}

// Strict mode: an invalid atomic validation result blocks wave
// progression until the routed entry resolves.
#[tokio::test]
async fn strict_validation_blocks_until_resolved() {
    let (coordinator, _generator, store, _rx) = build(
        fast_config().with_strict_validation(true),
        ScriptedGenerator::new().output_for("strictcase", "fn strictcase() {"),
    );

    let handle = coordinator
        .start(single_task_plan("fn strictcase() {}"))
        .await
        .unwrap();

    let entry = loop {
        let entries = store.entries();
        if let Some(entry) = entries.first() {
            break entry.clone();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert!(entry.reason.contains("validation failure at atomic level"));

    // The run is parked on the unresolved entry.
    let status = coordinator.status(&handle).unwrap();
    assert!(!status.finished);

    coordinator
        .resolve_review(entry.id, ReviewDecision::Approve, None)
        .await
        .unwrap();

    let status = wait_finished(&coordinator, &handle).await;
    assert_eq!(status.status, PlanStatus::Completed);

    let validations = store.validations();
    assert!(validations.iter().any(|v| !v.valid));
    assert!(coordinator.validation_score(&handle).unwrap() < 1.0);
}

// The progress stream reports the run lifecycle in order.
#[tokio::test]
async fn progress_events_cover_the_run_lifecycle() {
    let (coordinator, _generator, _store, mut rx) = build(fast_config(), ScriptedGenerator::new());

    let handle = coordinator
        .start(single_task_plan("fn quiet() {}"))
        .await
        .unwrap();
    wait_finished(&coordinator, &handle).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(EngineEvent::PlanStarted { total_atoms: 1, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::WaveStarted { number: 0, .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::AtomStatusChanged {
            status: AtomStatus::Completed,
            ..
        }
    )));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::PlanFinished {
            status: PlanStatus::Completed,
            ..
        })
    ));
}

// Mixed outcomes settle as partially completed.
#[tokio::test]
async fn mixed_outcomes_are_partially_completed() {
    let (coordinator, _generator, _store, _rx) = build(
        fast_config(),
        ScriptedGenerator::new().always_fail("doomed"),
    );

    let plan = plan_of_payloads(&["fn healthy() {}", "fn doomed() {}"]);
    let handle = coordinator.start(plan).await.unwrap();
    let status = wait_finished(&coordinator, &handle).await;

    assert_eq!(status.status, PlanStatus::PartiallyCompleted);
}

// A flaky atom recovers within its budget and the failure history is kept.
#[tokio::test]
async fn flaky_atom_recovers_within_budget() {
    let (coordinator, _generator, store, _rx) = build(
        fast_config().with_max_attempts(3),
        ScriptedGenerator::new().fail_times("flaky", 2),
    );

    let handle = coordinator
        .start(single_task_plan("fn flaky() {}"))
        .await
        .unwrap();
    let status = wait_finished(&coordinator, &handle).await;

    let atom = &status.atoms[0];
    assert_eq!(atom.status, AtomStatus::Completed);
    assert_eq!(atom.attempts, 3);
    assert_eq!(status.status, PlanStatus::Completed);

    let history = store.results_for(atom.atom_id);
    assert_eq!(history.len(), 3);
    assert!(history[0].error.is_some());
    assert!(history[1].error.is_some());
    assert!(history[2].output.is_some());
}
