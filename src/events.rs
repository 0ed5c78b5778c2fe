//! Typed notices and the broadcast bus they travel on.
//!
//! The push channel from the backend and the scheduler's completion signals
//! are both expressed as plain enums here, so each component subscribes to
//! well-defined notice types instead of hand-wired callbacks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// One printer's slice of an `update_printer_times` push snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterReport {
    /// Seconds left on the running job.
    pub time_remaining: Option<u64>,
    pub subtask_name: Option<String>,
    pub total_layers: Option<u32>,
    pub current_layer: Option<u32>,
    pub current_stage: Option<i32>,
    pub current_stage_text: Option<String>,
    pub gcode_state: Option<String>,
    pub percentage_complete: Option<f64>,
}

/// One entry of the committed-queue snapshot, carried both by the
/// `get_queue` pull response and the `prelim_queue` push notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueReport {
    pub print_id: String,
    /// Minutes from now until the print is expected to finish; preliminary.
    pub estimated_time_to_completion: f64,
    pub file_name: String,
    pub owner: String,
}

/// Unsolicited backend-to-client notices.
#[derive(Debug, Clone)]
pub enum Notice {
    PrinterTimes(HashMap<String, PrinterReport>),
    FileAddedToQueue { filename: String, owner: String },
    PrelimQueue(Vec<QueueReport>),
    RequestPlateCleanup { print_id: String, message: Option<String> },
    PlateIsClean { printer_name: String, msg: Option<String> },
}

/// Signals raised by the timer scheduler.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// The countdown for this job reached zero. Raised exactly once per job.
    Completed { job_id: String },
}

/// Fan-out bus for [`Notice`] values. Publishing never blocks; a publish
/// with no live subscribers is dropped silently.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<Notice>,
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(64)
    }
}
