//! In-process stand-in for the backend service, mirroring what the real one
//! answers: a uuid on upload acceptance, a coarse randomized time estimate
//! on status, and queue bookkeeping. Used by `main` when no real backend is
//! wired up, and by tests.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex;

use crate::events::{Notice, NoticeBus, QueueReport};
use crate::upload::{is_allowed_file, UploadCandidate};

use super::{
    BackendClient, BackendError, CountdownInfo, CreateCountdownRequest, StatusInfo, UploadReceipt,
};

#[derive(Debug, Clone)]
struct StubEntry {
    uuid: String,
    file_name: String,
    estimated_minutes: f64,
}

pub struct StubBackend {
    owner: String,
    queue: Mutex<Vec<StubEntry>>,
    notices: NoticeBus,
}

impl StubBackend {
    pub fn new(owner: impl Into<String>, notices: NoticeBus) -> Self {
        Self {
            owner: owner.into(),
            queue: Mutex::new(Vec::new()),
            notices,
        }
    }

    fn estimate_minutes() -> f64 {
        rand::rng().random_range(5..=120) as f64
    }
}

#[async_trait]
impl BackendClient for StubBackend {
    async fn create_countdown(
        &self,
        req: CreateCountdownRequest,
    ) -> Result<CountdownInfo, BackendError> {
        if req.print_id.is_empty() {
            return Err(BackendError::Rejected("Print ID is required".to_string()));
        }
        let total_seconds = (Self::estimate_minutes() * 60.0) as u64;
        Ok(CountdownInfo {
            total_seconds,
            end_time: Utc::now() + chrono::Duration::seconds(total_seconds as i64),
        })
    }

    async fn status(&self) -> Result<StatusInfo, BackendError> {
        Ok(StatusInfo {
            total_seconds: (Self::estimate_minutes() * 60.0) as u64,
        })
    }

    async fn cancel(&self, print_id: &str) -> Result<(), BackendError> {
        if print_id.is_empty() {
            return Err(BackendError::Rejected("Print ID is required".to_string()));
        }
        tracing::debug!(%print_id, "stub backend: cancel accepted");
        Ok(())
    }

    async fn cancel_by_id(&self, uuid: &str) -> Result<(), BackendError> {
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|entry| entry.uuid != uuid);
        if queue.len() == before {
            return Err(BackendError::Rejected("print_not_found".to_string()));
        }
        Ok(())
    }

    async fn takeout(&self, print_id: &str) -> Result<(), BackendError> {
        if print_id.is_empty() {
            return Err(BackendError::Rejected("Print ID is required".to_string()));
        }
        tracing::debug!(%print_id, "stub backend: takeout acknowledged");
        // The real service relays this to every other client.
        self.notices.publish(Notice::PlateIsClean {
            printer_name: print_id.to_string(),
            msg: None,
        });
        Ok(())
    }

    async fn upload(&self, candidate: &UploadCandidate) -> Result<UploadReceipt, BackendError> {
        if candidate.name.is_empty() {
            return Err(BackendError::Rejected("No file selected".to_string()));
        }
        if !is_allowed_file(&candidate.name) {
            return Err(BackendError::Rejected("Invalid file type".to_string()));
        }
        let entry = StubEntry {
            uuid: uuid::Uuid::new_v4().to_string(),
            file_name: candidate.name.clone(),
            estimated_minutes: Self::estimate_minutes(),
        };
        self.queue.lock().await.push(entry.clone());
        self.notices.publish(Notice::FileAddedToQueue {
            filename: entry.file_name.clone(),
            owner: self.owner.clone(),
        });
        Ok(UploadReceipt {
            uuid: entry.uuid,
            filename: entry.file_name,
        })
    }

    async fn get_queue(&self) -> Result<Vec<QueueReport>, BackendError> {
        let queue = self.queue.lock().await;
        Ok(queue
            .iter()
            .map(|entry| QueueReport {
                print_id: entry.uuid.clone(),
                estimated_time_to_completion: entry.estimated_minutes,
                file_name: entry.file_name.clone(),
                owner: self.owner.clone(),
            })
            .collect())
    }
}
