//! The upload queue manager: stages candidate files, validates them, and
//! commits them to the backend queue with replace-by-name semantics.

use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;

use crate::backend::{with_timeout, BackendClient, BackendError};
use crate::events::QueueReport;
use crate::persist::QueueStore;

/// Extensions accepted into the staging buffer, matched case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 2] = [".gcode", ".3mf"];

pub fn is_allowed_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// A file selected by the user but not yet committed to the backend.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub name: String,
    pub content: Vec<u8>,
    pub media_type: String,
}

/// A backend-acknowledged queue entry. The payload is kept so the committed
/// queue survives restarts.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub uuid: String,
    pub file_name: String,
    pub estimated_minutes: f64,
    pub content: Vec<u8>,
    pub media_type: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{name} is not a valid G-code file")]
    InvalidExtension { name: String },
    #[error("no file at index {0}")]
    BadIndex(usize),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Per-file results of one commit pass. A failed file never aborts its
/// siblings.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub accepted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct UploadQueueManager {
    staged: Vec<UploadCandidate>,
    queue: Vec<QueueEntry>,
    queue_estimate_minutes: Option<f64>,
    backend: Arc<dyn BackendClient>,
    store: Option<QueueStore>,
    request_timeout: Duration,
}

impl UploadQueueManager {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        store: Option<QueueStore>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            staged: Vec::new(),
            queue: Vec::new(),
            queue_estimate_minutes: None,
            backend,
            store,
            request_timeout,
        }
    }

    /// Restore the committed queue from the durable store.
    pub async fn load_persisted(&mut self) {
        if let Some(store) = &self.store {
            self.queue = store.load().await;
            if !self.queue.is_empty() {
                tracing::info!(entries = self.queue.len(), "restored persisted queue");
            }
        }
    }

    /// Stage one candidate, rejecting disallowed extensions.
    pub fn stage(&mut self, candidate: UploadCandidate) -> Result<(), UploadError> {
        if !is_allowed_file(&candidate.name) {
            return Err(UploadError::InvalidExtension {
                name: candidate.name,
            });
        }
        self.staged.push(candidate);
        Ok(())
    }

    /// Stage a batch; each rejection is reported without aborting the rest.
    pub fn stage_all(&mut self, candidates: Vec<UploadCandidate>) -> Vec<UploadError> {
        let mut rejected = Vec::new();
        for candidate in candidates {
            if let Err(err) = self.stage(candidate) {
                tracing::warn!(error = %err, "file rejected");
                rejected.push(err);
            }
        }
        rejected
    }

    pub fn staged(&self) -> &[UploadCandidate] {
        &self.staged
    }

    pub fn queue(&self) -> &[QueueEntry] {
        &self.queue
    }

    pub fn remove_staged(&mut self, index: usize) -> Result<UploadCandidate, UploadError> {
        if index >= self.staged.len() {
            return Err(UploadError::BadIndex(index));
        }
        Ok(self.staged.remove(index))
    }

    /// Commit all staged candidates to the backend queue, in order.
    ///
    /// Submitting a name that already has a committed entry retires the old
    /// entry first (its uuid is canceled upstream) and is not an error. The
    /// staging buffer is drained whether individual uploads succeed or not.
    pub async fn commit(&mut self) -> CommitOutcome {
        let mut outcome = CommitOutcome::default();
        let pending: Vec<UploadCandidate> = self.staged.drain(..).collect();

        // Sequential on purpose: the backend's queue ordering follows
        // submission order.
        for candidate in pending {
            if let Some(pos) = self
                .queue
                .iter()
                .position(|entry| entry.file_name == candidate.name)
            {
                let old_uuid = self.queue[pos].uuid.clone();
                match with_timeout(self.request_timeout, self.backend.cancel_by_id(&old_uuid))
                    .await
                {
                    Ok(()) => {
                        self.queue.remove(pos);
                    }
                    Err(err) => {
                        tracing::warn!(name = %candidate.name, error = %err,
                            "failed to cancel superseded queue entry");
                    }
                }
            }

            match with_timeout(self.request_timeout, self.backend.upload(&candidate)).await {
                Ok(receipt) => {
                    tracing::info!(name = %receipt.filename, uuid = %receipt.uuid, "file uploaded");
                    // Replace-by-name holds even if the cancel above failed.
                    self.queue.retain(|entry| entry.file_name != receipt.filename);
                    self.queue.push(QueueEntry {
                        uuid: receipt.uuid,
                        file_name: receipt.filename.clone(),
                        estimated_minutes: 0.0,
                        content: candidate.content,
                        media_type: candidate.media_type,
                    });
                    outcome.accepted.push(receipt.filename);
                }
                Err(err) => {
                    tracing::error!(name = %candidate.name, error = %err, "upload failed");
                    outcome.failed.push((candidate.name, err.to_string()));
                }
            }
        }

        self.persist().await;
        outcome
    }

    /// Remove a committed entry. The backend cancel must succeed first; the
    /// local entry stays put when it fails, so the visible queue never gets
    /// ahead of the backend.
    pub async fn remove_queue_file(&mut self, index: usize) -> Result<QueueEntry, UploadError> {
        let entry = self
            .queue
            .get(index)
            .ok_or(UploadError::BadIndex(index))?;
        with_timeout(self.request_timeout, self.backend.cancel_by_id(&entry.uuid)).await?;
        let entry = self.queue.remove(index);
        tracing::info!(name = %entry.file_name, "queue entry removed");
        self.persist().await;
        Ok(entry)
    }

    /// Fold in revised estimates from a queue snapshot. The last entry's
    /// estimate doubles as the "time until your print starts" figure.
    pub fn apply_queue_estimates(&mut self, reports: &[QueueReport]) {
        for report in reports {
            if let Some(entry) = self
                .queue
                .iter_mut()
                .find(|entry| entry.uuid == report.print_id)
            {
                entry.estimated_minutes = report.estimated_time_to_completion;
            }
        }
        self.queue_estimate_minutes = reports
            .last()
            .map(|report| report.estimated_time_to_completion);
    }

    pub fn queue_estimate_minutes(&self) -> Option<f64> {
        self.queue_estimate_minutes
    }

    async fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&self.queue).await {
                tracing::error!(error = %err, "failed to persist queue");
            }
        }
    }
}
