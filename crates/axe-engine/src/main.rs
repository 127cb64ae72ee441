use axe_engine::harness::{synthetic_plan, MemoryStore, SimGenerator};
use axe_engine::{EngineConfig, EngineEvent, PersistenceStore, RunCoordinator};
use clap::{value_parser, Arg, ArgAction, Command};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Command::new("axe-engine")
        .version("0.1.0")
        .about("Atomic task execution engine")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("simulate")
                .about("Run the engine against scripted collaborators")
                .arg(
                    Arg::new("tasks")
                        .long("tasks")
                        .default_value("10")
                        .value_parser(value_parser!(usize))
                        .help("Number of synthetic tasks in the plan"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("fail-rate")
                        .long("fail-rate")
                        .default_value("0.1")
                        .value_parser(value_parser!(f64))
                        .help("Per-attempt simulated failure probability"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .default_value("100")
                        .value_parser(value_parser!(usize))
                        .help("Global concurrent-execution bound"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Block wave progression on invalid validation results"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the final report as JSON"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("simulate", args)) => {
            let tasks = *args.get_one::<usize>("tasks").expect("defaulted");
            let seed = *args.get_one::<u64>("seed").expect("defaulted");
            let fail_rate = *args.get_one::<f64>("fail-rate").expect("defaulted");
            let concurrency = *args.get_one::<usize>("concurrency").expect("defaulted");
            let strict = args.get_flag("strict");
            let json = args.get_flag("json");

            simulate(tasks, seed, fail_rate, concurrency, strict, json).await?;
        }
        _ => {}
    }

    Ok(())
}

async fn simulate(
    tasks: usize,
    seed: u64,
    fail_rate: f64,
    concurrency: usize,
    strict: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = EngineConfig::new()
        .with_max_concurrency(concurrency)
        .with_backoff(Duration::from_millis(10), Duration::from_millis(100))
        .with_strict_validation(strict);

    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(SimGenerator::new(seed, fail_rate));
    let (coordinator, mut events) =
        RunCoordinator::new(config, generator, store.clone() as Arc<dyn PersistenceStore>);
    let coordinator = Arc::new(coordinator);

    let plan = synthetic_plan(tasks);
    println!("Simulating plan: {} tasks, seed {seed}, fail rate {fail_rate}", tasks);
    println!();

    let handle = coordinator.start(plan).await?;

    // Scripted reviewer: rejects everything routed to the queue so the run
    // always settles.
    let reviewer = Arc::clone(&coordinator);
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::WaveStarted { number, size, .. } => {
                    println!("wave {number}: dispatching {size} atoms");
                }
                EngineEvent::WaveCompleted { number, .. } => {
                    println!("wave {number}: done");
                }
                EngineEvent::ReviewQueued { entry_id, atom_id, .. } => {
                    println!("review queued for atom {atom_id}, rejecting");
                    if let Err(e) = reviewer
                        .resolve_review(
                            entry_id,
                            axe_atom::ReviewDecision::Reject,
                            Some("rejected by scripted reviewer".to_string()),
                        )
                        .await
                    {
                        eprintln!("review resolution failed: {e}");
                    }
                }
                EngineEvent::PlanFinished { status, .. } => {
                    println!("plan finished: {status}");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        let status = coordinator.status(&handle)?;
        if status.finished {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let _ = drain.await;

    let status = coordinator.status(&handle)?;
    let completed = status
        .atoms
        .iter()
        .filter(|a| a.status == axe_atom::AtomStatus::Completed)
        .count();
    let failed = status.atoms.len() - completed;

    if json {
        let report = serde_json::json!({
            "status": status.status.to_string(),
            "atoms": status.atoms.len(),
            "completed": completed,
            "failed": failed,
            "results_recorded": store.result_count(),
            "review_entries": store.entry_count(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("Simulation Report");
        println!("=================");
        println!("Aggregate status: {}", status.status);
        println!("Atoms: {} ({completed} completed, {failed} failed)", status.atoms.len());
        println!("Attempt results recorded: {}", store.result_count());
        println!("Review entries: {}", store.entry_count());
    }

    std::process::exit(if failed == 0 { 0 } else { 1 });
}
