//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

use crate::job::PrintJob;
use crate::notify::Prompt;
use crate::scheduler::format_duration;
use crate::upload::{QueueEntry, UploadCandidate};

/// One job as presented to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: String,
    pub printer_label: Option<String>,
    pub file_name: String,
    pub state: String,
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    pub remaining_label: String,
    pub percent_complete: f64,
    pub current_layer: Option<u32>,
    pub total_layers: Option<u32>,
}

impl From<PrintJob> for JobView {
    fn from(job: PrintJob) -> Self {
        Self {
            remaining_label: format_duration(job.remaining_seconds),
            id: job.id,
            printer_label: job.printer_label,
            file_name: job.file_name,
            state: job.state.to_string(),
            total_seconds: job.total_seconds,
            remaining_seconds: job.remaining_seconds,
            percent_complete: job.percent_complete,
            current_layer: job.current_layer,
            total_layers: job.total_layers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptView {
    pub job_id: String,
    pub message: String,
    pub shown_at: chrono::DateTime<chrono::Utc>,
}

impl From<Prompt> for PromptView {
    fn from(prompt: Prompt) -> Self {
        Self {
            job_id: prompt.job_id,
            message: prompt.message,
            shown_at: prompt.shown_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntryView {
    pub uuid: String,
    pub file_name: String,
    pub estimated_minutes: f64,
}

impl From<&QueueEntry> for QueueEntryView {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            uuid: entry.uuid.clone(),
            file_name: entry.file_name.clone(),
            estimated_minutes: entry.estimated_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StagedFileView {
    pub name: String,
    pub size_bytes: usize,
    pub media_type: String,
}

impl From<&UploadCandidate> for StagedFileView {
    fn from(candidate: &UploadCandidate) -> Self {
        Self {
            name: candidate.name.clone(),
            size_bytes: candidate.content.len(),
            media_type: candidate.media_type.clone(),
        }
    }
}

/// Request to start tracking a running print.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackJobRequest {
    pub print_id: String,
    pub printer_name: String,
    #[serde(default)]
    pub print_name: String,
}

/// One file submitted for staging, content base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct StageFileRequest {
    pub name: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub media_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub staged: Vec<String>,
    pub rejected: Vec<RejectedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitView {
    pub accepted: Vec<String>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEstimateView {
    pub minutes: Option<f64>,
    pub label: Option<String>,
}

impl QueueEstimateView {
    pub fn from_minutes(minutes: Option<f64>) -> Self {
        Self {
            label: minutes.map(|m| format_duration((m * 60.0) as u64)),
            minutes,
        }
    }
}
