//! Diagnostic utility for inspecting local session state.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use gymiq_model::UserIdentity;
use gymiq_session::memory::{
    MemoryExerciseCatalog, MemoryHistoryStore, MemoryStorage, StaticAuthProvider,
};
use gymiq_session::{
    storage, FileStorage, FinishOutcome, SessionChange, SessionContext, StorageConfig,
};

#[derive(Parser)]
#[command(name = "session-check", about = "Inspect GymIQ local session state")]
struct Cli {
    /// State file to inspect (defaults to ~/.gymiq/session-state.json)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Delete the session pointer and snapshot
    #[arg(long)]
    clear: bool,

    /// Run a scripted lifecycle against in-memory backends
    #[arg(long)]
    demo: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.demo {
        run_demo();
        return;
    }

    let state_file = cli
        .state_file
        .unwrap_or_else(|| StorageConfig::default().state_file());

    println!("═══════════════════════════════════════════════════════════");
    println!("  GymIQ Session Check");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("State file: {}", state_file.display());
    println!();

    let mut file_storage = FileStorage::load(&state_file);

    if cli.clear {
        storage::clear_session_artifacts(&mut file_storage);
        println!("Cleared session pointer and snapshot.");
        return;
    }

    println!("── Session Pointer ───────────────────────────────────────");
    match storage::load_pointer(&file_storage) {
        Some(pointer) => {
            let stale = if pointer.is_stale(chrono::Utc::now()) {
                " (STALE)"
            } else {
                ""
            };
            println!("  session: {}{}", pointer.session_id, stale);
            println!("  owner:   {}", pointer.user_id);
            println!("  lease:   {}", pointer.lease_token);
            println!("  saved:   {}", pointer.saved_at.to_rfc3339());
        }
        None => println!("  (no pointer cached)"),
    }
    println!();

    println!("── Session Snapshot ──────────────────────────────────────");
    match storage::load_snapshot(&file_storage) {
        Some(session) => {
            println!("  session: {} │ {:?}", session.id, session.status);
            println!(
                "  {} exercise(s), {:.1} kg total volume, {}s elapsed",
                session.exercises.len(),
                session.compute_total_volume(),
                session.elapsed_seconds
            );
            for exercise in &session.exercises {
                let completed = exercise.sets.iter().filter(|s| s.completed).count();
                println!(
                    "    {} [{} / {}] {}/{} sets done",
                    exercise.name,
                    exercise.category,
                    exercise.primary_muscle,
                    completed,
                    exercise.sets.len()
                );
            }
        }
        None => println!("  (no snapshot cached)"),
    }
    println!();
    println!("Validation complete.");
}

/// Scripted lifecycle against in-memory backends: start, edit, auto-save,
/// finish. Useful for eyeballing log output and the stats counters.
fn run_demo() {
    use gymiq_model::{ExerciseInfo, SetType, WorkoutSet};

    let mut catalog = MemoryExerciseCatalog::new();
    catalog.insert(ExerciseInfo {
        id: "bench".to_string(),
        name: "Bench Press".to_string(),
        category: "strength".to_string(),
        primary_muscle: "chest".to_string(),
        equipment: Some("barbell".to_string()),
    });

    let mut ctx = SessionContext::with_debounce_window(
        MemoryStorage::new(),
        MemoryHistoryStore::new(),
        catalog,
        StaticAuthProvider::signed_in(UserIdentity::member("demo-user")),
        Duration::from_millis(50),
    );

    let outcome = ctx.init();
    println!("recovery outcome: {:?}", outcome);

    let session_id = ctx
        .start_workout()
        .expect("demo user is signed in")
        .id
        .clone();
    println!("started session {}", session_id);

    ctx.add_exercise("bench", vec![WorkoutSet::planned(SetType::Working, 8, 80.0)])
        .expect("bench exists in demo catalog");
    ctx.apply(SessionChange::CompleteSet { exercise: 0, set: 0 });
    ctx.apply(SessionChange::TimerTick { seconds: 90 });

    std::thread::sleep(Duration::from_millis(80));
    let wrote = ctx.tick();
    println!("debounced auto-save wrote: {}", wrote);

    ctx.finish(FinishOutcome::Completed, Some(250))
        .expect("in-memory backend accepts the final save");

    let stats = ctx.autosave_stats();
    println!(
        "autosave stats: attempted={} succeeded={} failed={}",
        stats.attempted, stats.succeeded, stats.failed
    );
    println!("demo complete");
}
