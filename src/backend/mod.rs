//! Typed client for the backend's HTTP surface.
//!
//! The engine never talks to printer hardware or schedules anything itself;
//! it only consumes this contract. The trait keeps the transport out of the
//! core so tests and the in-process stub can stand in for the real service.

pub mod stub;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tokio::time::Duration;

use crate::events::QueueReport;
use crate::upload::UploadCandidate;

pub use stub::StubBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with an `{error}` payload.
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("backend request timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCountdownRequest {
    pub print_id: String,
    pub printer_name: String,
    pub print_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownInfo {
    pub total_seconds: u64,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub total_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub uuid: String,
    pub filename: String,
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Register a running job and get its authoritative countdown.
    async fn create_countdown(
        &self,
        req: CreateCountdownRequest,
    ) -> Result<CountdownInfo, BackendError>;

    async fn status(&self) -> Result<StatusInfo, BackendError>;

    /// Cancel a running print.
    async fn cancel(&self, print_id: &str) -> Result<(), BackendError>;

    /// Cancel a committed queue entry by its backend-issued uuid.
    async fn cancel_by_id(&self, uuid: &str) -> Result<(), BackendError>;

    /// Acknowledge that the plate has been cleaned after a finished print.
    async fn takeout(&self, print_id: &str) -> Result<(), BackendError>;

    async fn upload(&self, candidate: &UploadCandidate) -> Result<UploadReceipt, BackendError>;

    async fn get_queue(&self) -> Result<Vec<QueueReport>, BackendError>;
}

/// Wrap a backend call with the configured timeout. The reference behavior
/// had no local timeouts at all; this is the stricter policy the engine
/// applies to every call instead.
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(limit)),
    }
}
