//! End-to-end lifecycle: countdown, completion, cleanup acknowledgment and
//! snapshot reconciliation working against the same registry.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

use printez::backend::StubBackend;
use printez::events::{JobEvent, NoticeBus, PrinterReport};
use printez::job::JobState;
use printez::notify::{PromptController, DEFAULT_CLEANUP_MESSAGE};
use printez::registry::{JobPatch, JobRegistry};
use printez::scheduler::TimerScheduler;
use printez::sync::SyncReconciler;

struct Harness {
    registry: JobRegistry,
    scheduler: TimerScheduler,
    prompts: PromptController,
    reconciler: SyncReconciler,
    completions: mpsc::Receiver<JobEvent>,
}

fn harness() -> Harness {
    let registry = JobRegistry::new();
    let backend = Arc::new(StubBackend::new("tester", NoticeBus::default()));
    let (tx, completions) = mpsc::channel(8);
    let scheduler = TimerScheduler::new(registry.clone(), tx, Duration::from_secs(1));
    let prompts = PromptController::new(
        registry.clone(),
        scheduler.clone(),
        backend.clone(),
        Duration::from_secs(5),
        DEFAULT_CLEANUP_MESSAGE,
    );
    let reconciler = SyncReconciler::new(registry.clone(), backend, Duration::from_secs(5));
    Harness {
        registry,
        scheduler,
        prompts,
        reconciler,
        completions,
    }
}

async fn start_job(h: &Harness, id: &str, printer: &str, seconds: u64) {
    let mut patch = JobPatch::new(id);
    patch.printer_label = Some(printer.to_string());
    patch.file_name = Some("boat.gcode".to_string());
    patch.total_seconds = Some(seconds);
    patch.remaining_seconds = Some(seconds);
    patch.state = Some(JobState::Printing);
    h.registry.upsert(patch).await;
    h.scheduler.register(id).await;
}

#[tokio::test(start_paused = true)]
async fn three_second_job_finishes_and_is_cleaned_up() {
    let mut h = harness();
    start_job(&h, "J1", "S5. Brienne of Tarth", 3).await;

    // Exactly one completion signal after three ticks.
    let JobEvent::Completed { job_id } = h.completions.recv().await.unwrap();
    assert_eq!(job_id, "J1");
    let job = h.registry.get("J1").await.unwrap();
    assert_eq!(job.state, JobState::AwaitingCleanup);
    assert_eq!(job.remaining_seconds, 0);

    // Engine routing: completion raises the cleanup prompt.
    assert!(h.prompts.show("J1", None).await);

    // The backend reports the plate clean; the job leaves the registry.
    assert!(h.prompts.plate_cleaned("S5. Brienne of Tarth").await);
    assert!(h.registry.get("J1").await.is_none());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.completions.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn snapshot_overwrites_a_ticking_countdown() {
    let h = harness();
    start_job(&h, "J1", "S1. Jerry Seinfeld", 600).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let before = h.registry.get("J1").await.unwrap();
    assert!(before.remaining_seconds < 600);

    // The backend disagrees with the locally ticked value; it wins.
    let mut reports = HashMap::new();
    reports.insert(
        "J1".to_string(),
        PrinterReport {
            time_remaining: Some(900),
            percentage_complete: Some(10.0),
            ..Default::default()
        },
    );
    h.reconciler.apply_printer_report(reports).await;

    let after = h.registry.get("J1").await.unwrap();
    assert_eq!(after.remaining_seconds, 900);

    h.scheduler.cancel("J1").await;
}

#[tokio::test(start_paused = true)]
async fn canceled_job_never_ticks_again() {
    let mut h = harness();
    start_job(&h, "J1", "S1. Jerry Seinfeld", 30).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    h.scheduler.cancel("J1").await;
    h.prompts.dismiss("J1").await;
    h.registry.remove("J1").await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.registry.get("J1").await.is_none());
    assert!(h.completions.try_recv().is_err());
    assert!(!h.scheduler.is_active("J1").await);
}

#[tokio::test(start_paused = true)]
async fn structural_snapshot_change_stops_removed_jobs() {
    let h = harness();

    let mut reports = HashMap::new();
    reports.insert(
        "A".to_string(),
        PrinterReport {
            time_remaining: Some(100),
            ..Default::default()
        },
    );
    reports.insert(
        "B".to_string(),
        PrinterReport {
            time_remaining: Some(200),
            ..Default::default()
        },
    );
    let outcome = h.reconciler.apply_printer_report(reports).await;
    for id in &outcome.started {
        h.scheduler.register(id).await;
    }
    assert!(h.scheduler.is_active("A").await);

    // A printer disappears: the snapshot now has one job.
    let mut reports = HashMap::new();
    reports.insert(
        "B".to_string(),
        PrinterReport {
            time_remaining: Some(150),
            ..Default::default()
        },
    );
    let outcome = h.reconciler.apply_printer_report(reports).await;
    assert!(outcome.rebuilt);
    for id in &outcome.removed {
        h.scheduler.cancel(id).await;
    }

    assert!(h.registry.get("A").await.is_none());
    assert!(h.registry.get("B").await.is_some());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!h.scheduler.is_active("A").await);

    h.scheduler.cancel("B").await;
}
