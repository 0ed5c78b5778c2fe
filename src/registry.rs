//! The job registry: the single authoritative in-memory map of job id to
//! job record. Every other component reads and mutates job state through it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::job::{JobState, PrintJob, SyncScope};

/// Partial update applied through [`JobRegistry::upsert`]. Fields left as
/// `None` preserve the existing record's value.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub id: String,
    pub printer_label: Option<String>,
    pub file_name: Option<String>,
    pub total_seconds: Option<u64>,
    pub remaining_seconds: Option<u64>,
    pub percent_complete: Option<f64>,
    pub current_layer: Option<u32>,
    pub total_layers: Option<u32>,
    pub state: Option<JobState>,
    pub scope: Option<SyncScope>,
}

impl JobPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// One job's worth of an authoritative backend snapshot, already keyed by
/// the canonical identity (the job id).
#[derive(Debug, Clone)]
pub struct SnapshotJob {
    pub id: String,
    pub file_name: Option<String>,
    pub remaining_seconds: Option<u64>,
    pub percent_complete: Option<f64>,
    pub current_layer: Option<u32>,
    pub total_layers: Option<u32>,
    pub state: Option<JobState>,
}

/// What a snapshot application did, so the caller can keep timers and
/// prompts in step with the registry.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// The snapshot's cardinality differed and the scope was rebuilt.
    pub rebuilt: bool,
    /// Ids that are in `Printing` after the pass and need a live timer.
    pub started: Vec<String>,
    /// Ids dropped from the registry by this pass.
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickResult {
    /// Countdown advanced by one second.
    Advanced(PrintJob),
    /// Countdown hit zero on this tick; the job moved to `AwaitingCleanup`.
    /// Returned exactly once per job.
    Completed(PrintJob),
    /// Job exists but is not printing yet.
    Waiting,
    /// Job finished or was canceled earlier; nothing left to tick.
    Finished,
    /// No such job.
    Missing,
}

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, PrintJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or field-merge a job record. Returns the merged record.
    pub async fn upsert(&self, patch: JobPatch) -> PrintJob {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .entry(patch.id.clone())
            .or_insert_with(|| blank_job(&patch.id));
        merge_patch(job, &patch);
        job.clone()
    }

    pub async fn get(&self, id: &str) -> Option<PrintJob> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<PrintJob> {
        let mut jobs: Vec<PrintJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn find_by_printer(&self, printer_label: &str) -> Option<PrintJob> {
        self.jobs
            .read()
            .await
            .values()
            .find(|job| job.printer_label.as_deref() == Some(printer_label))
            .cloned()
    }

    /// Idempotent removal; returns whether the id was present.
    pub async fn remove(&self, id: &str) -> bool {
        self.jobs.write().await.remove(id).is_some()
    }

    /// Advance one job's countdown by a single tick. The state transition at
    /// zero happens under the same write guard as the decrement, so
    /// `Completed` can fire only once per job.
    pub async fn advance_countdown(&self, id: &str) -> TickResult {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            return TickResult::Missing;
        };
        match job.state {
            JobState::Printing => {
                if job.remaining_seconds > 0 {
                    job.remaining_seconds -= 1;
                    if job.total_seconds > 0 {
                        let done = (job.total_seconds - job.remaining_seconds) as f64;
                        job.percent_complete =
                            (done / job.total_seconds as f64 * 100.0).clamp(0.0, 100.0);
                    }
                }
                if job.remaining_seconds == 0 {
                    job.state = JobState::AwaitingCleanup;
                    job.percent_complete = 100.0;
                    TickResult::Completed(job.clone())
                } else {
                    TickResult::Advanced(job.clone())
                }
            }
            JobState::Queued => TickResult::Waiting,
            _ => TickResult::Finished,
        }
    }

    /// Apply one authoritative snapshot atomically.
    ///
    /// If the snapshot's job count differs from the number of entries this
    /// feed currently owns, the feed's entries are dropped and rebuilt from
    /// the snapshot. Otherwise each snapshot field overwrites the local
    /// value; the locally ticked countdown is only cosmetic between two
    /// snapshots. Jobs whose merged state is `Canceled` leave the registry
    /// as part of the same pass.
    pub async fn apply_snapshot(
        &self,
        scope: SyncScope,
        snapshot: Vec<SnapshotJob>,
    ) -> ReconcileOutcome {
        let mut jobs = self.jobs.write().await;
        let mut outcome = ReconcileOutcome::default();

        let current: Vec<String> = jobs
            .iter()
            .filter(|(_, job)| job.scope == scope)
            .map(|(id, _)| id.clone())
            .collect();

        if current.len() != snapshot.len() {
            outcome.rebuilt = true;
            for id in &current {
                if !snapshot.iter().any(|sj| sj.id == *id) {
                    outcome.removed.push(id.clone());
                }
                jobs.remove(id);
            }
            for sj in &snapshot {
                // An id already known through another feed (or tracked
                // locally) is adopted, not replaced, so its fields survive.
                let job = jobs.entry(sj.id.clone()).or_insert_with(|| {
                    let mut job = blank_job(&sj.id);
                    job.state = JobState::Printing;
                    job
                });
                job.scope = scope;
                merge_snapshot_fields(job, sj);
            }
        } else {
            for sj in &snapshot {
                let job = jobs.entry(sj.id.clone()).or_insert_with(|| {
                    let mut job = blank_job(&sj.id);
                    job.state = JobState::Printing;
                    job
                });
                job.scope = scope;
                merge_snapshot_fields(job, sj);
            }
        }

        for sj in &snapshot {
            match jobs.get(&sj.id).map(|job| job.state) {
                Some(JobState::Canceled) => {
                    jobs.remove(&sj.id);
                    outcome.removed.push(sj.id.clone());
                }
                Some(JobState::Printing) => outcome.started.push(sj.id.clone()),
                _ => {}
            }
        }
        outcome
    }
}

fn blank_job(id: &str) -> PrintJob {
    PrintJob {
        id: id.to_string(),
        printer_label: None,
        file_name: "Unknown Print Job".to_string(),
        total_seconds: 0,
        remaining_seconds: 0,
        percent_complete: 0.0,
        current_layer: None,
        total_layers: None,
        state: JobState::Queued,
        scope: SyncScope::Local,
    }
}

fn merge_patch(job: &mut PrintJob, patch: &JobPatch) {
    if let Some(label) = &patch.printer_label {
        job.printer_label = Some(label.clone());
    }
    if let Some(name) = &patch.file_name {
        job.file_name = name.clone();
    }
    if let Some(total) = patch.total_seconds {
        job.total_seconds = total;
    }
    if let Some(remaining) = patch.remaining_seconds {
        job.remaining_seconds = remaining;
        job.total_seconds = job.total_seconds.max(remaining);
    }
    if let Some(percent) = patch.percent_complete {
        job.percent_complete = percent.clamp(0.0, 100.0);
    }
    if let Some(layer) = patch.current_layer {
        job.current_layer = Some(layer);
    }
    if let Some(layers) = patch.total_layers {
        job.total_layers = Some(layers);
    }
    if let Some(state) = patch.state {
        job.state = state;
    }
    if let Some(scope) = patch.scope {
        job.scope = scope;
    }
}

fn merge_snapshot_fields(job: &mut PrintJob, sj: &SnapshotJob) {
    if let Some(name) = &sj.file_name {
        job.file_name = name.clone();
    }
    if let Some(remaining) = sj.remaining_seconds {
        job.remaining_seconds = remaining;
        job.total_seconds = job.total_seconds.max(remaining);
    }
    if let Some(percent) = sj.percent_complete {
        job.percent_complete = percent.clamp(0.0, 100.0);
    }
    if let Some(layer) = sj.current_layer {
        job.current_layer = Some(layer);
    }
    if let Some(layers) = sj.total_layers {
        job.total_layers = Some(layers);
    }
    if let Some(state) = sj.state {
        job.state = state;
    }
}
