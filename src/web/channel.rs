//! Defines the communication channel messages between the web server and
//! the engine task.

use tokio::sync::oneshot;

use crate::upload::UploadCandidate;
use crate::web::models::{
    CommitView, JobView, PromptView, QueueEntryView, QueueEstimateView, StageOutcome,
    StagedFileView, TrackJobRequest,
};

/// A request sent from a web handler to the engine's event loop.
#[derive(Debug)]
pub enum EngineRequest {
    /// List every job currently in the registry.
    ListJobs {
        respond_to: oneshot::Sender<Vec<JobView>>,
    },
    /// Register a running print with the backend and start its countdown.
    TrackJob {
        request: TrackJobRequest,
        respond_to: oneshot::Sender<Result<JobView, String>>,
    },
    /// Cancel a job and deregister its timer and prompt.
    CancelJob {
        job_id: String,
        respond_to: oneshot::Sender<Result<(), String>>,
    },
    /// The user confirmed the plate is clean.
    AcknowledgeCleanup {
        job_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    ListPrompts {
        respond_to: oneshot::Sender<Vec<PromptView>>,
    },
    /// Validate and stage uploaded files.
    StageFiles {
        files: Vec<UploadCandidate>,
        respond_to: oneshot::Sender<StageOutcome>,
    },
    ListStaged {
        respond_to: oneshot::Sender<Vec<StagedFileView>>,
    },
    RemoveStaged {
        index: usize,
        respond_to: oneshot::Sender<Result<(), String>>,
    },
    ListQueue {
        respond_to: oneshot::Sender<Vec<QueueEntryView>>,
    },
    /// Commit all staged files to the backend queue.
    CommitQueue {
        respond_to: oneshot::Sender<CommitView>,
    },
    RemoveQueueEntry {
        index: usize,
        respond_to: oneshot::Sender<Result<(), String>>,
    },
    QueueEstimate {
        respond_to: oneshot::Sender<QueueEstimateView>,
    },
}
