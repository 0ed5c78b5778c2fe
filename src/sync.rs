//! The sync reconciler: merges authoritative backend snapshots into the
//! registry, from the periodic pull and from push notices.
//!
//! The canonical identity key is the job id. Push payloads that were keyed
//! by printer in older backend revisions are treated as job-keyed here; the
//! printer label is carried as a record field, never as identity.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Duration;

use crate::backend::{with_timeout, BackendClient, BackendError};
use crate::events::{PrinterReport, QueueReport};
use crate::job::{JobState, SyncScope};
use crate::registry::{JobRegistry, ReconcileOutcome, SnapshotJob};

/// Result of one pull cycle: the registry outcome plus the raw queue
/// reports, which the upload manager also needs for its estimate view.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub outcome: ReconcileOutcome,
    pub reports: Vec<QueueReport>,
}

#[derive(Clone)]
pub struct SyncReconciler {
    registry: JobRegistry,
    backend: Arc<dyn BackendClient>,
    request_timeout: Duration,
}

impl SyncReconciler {
    pub fn new(
        registry: JobRegistry,
        backend: Arc<dyn BackendClient>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            backend,
            request_timeout,
        }
    }

    /// Merge an `update_printer_times` push snapshot.
    pub async fn apply_printer_report(
        &self,
        reports: HashMap<String, PrinterReport>,
    ) -> ReconcileOutcome {
        let snapshot: Vec<SnapshotJob> = reports
            .into_iter()
            .map(|(id, report)| SnapshotJob {
                id,
                file_name: report.subtask_name,
                remaining_seconds: report.time_remaining,
                percent_complete: report.percentage_complete,
                current_layer: report.current_layer,
                total_layers: report.total_layers,
                state: Some(map_gcode_state(report.gcode_state.as_deref())),
            })
            .collect();
        let outcome = self
            .registry
            .apply_snapshot(SyncScope::PrinterFeed, snapshot)
            .await;
        if outcome.rebuilt {
            tracing::info!(
                removed = outcome.removed.len(),
                started = outcome.started.len(),
                "printer set changed, rebuilt the rendered jobs"
            );
        }
        outcome
    }

    /// Merge a committed-queue snapshot (pull response or `prelim_queue`
    /// push) as `Queued` jobs.
    pub async fn apply_queue_report(&self, reports: &[QueueReport]) -> ReconcileOutcome {
        let snapshot: Vec<SnapshotJob> = reports
            .iter()
            .map(|report| SnapshotJob {
                id: report.print_id.clone(),
                file_name: Some(report.file_name.clone()),
                remaining_seconds: Some((report.estimated_time_to_completion * 60.0) as u64),
                percent_complete: None,
                current_layer: None,
                total_layers: None,
                state: Some(JobState::Queued),
            })
            .collect();
        self.registry
            .apply_snapshot(SyncScope::QueueFeed, snapshot)
            .await
    }

    /// One cycle of the periodic pull.
    pub async fn poll_once(&self) -> Result<PollResult, BackendError> {
        let reports = with_timeout(self.request_timeout, self.backend.get_queue()).await?;
        let outcome = self.apply_queue_report(&reports).await;
        Ok(PollResult { outcome, reports })
    }
}

/// Map the wire `gcode_state` onto the job lifecycle. Unknown or missing
/// states count as printing, since the feed only reports active printers.
fn map_gcode_state(state: Option<&str>) -> JobState {
    match state {
        Some("FAILED") => JobState::Canceled,
        Some("FINISH") => JobState::AwaitingCleanup,
        _ => JobState::Printing,
    }
}
