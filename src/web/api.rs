//! Defines the Axum API routes and handlers.
//!
//! Handlers never touch engine state directly; each one sends an
//! [`EngineRequest`] over the channel and waits for the answer on a oneshot.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use base64::prelude::*;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;

use crate::upload::UploadCandidate;
use crate::web::channel::EngineRequest;
use crate::web::models::{
    CommitView, JobView, PromptView, QueueEntryView, QueueEstimateView, RejectedFile,
    StageFileRequest, StageOutcome, StagedFileView, TrackJobRequest,
};

pub type AppState = Sender<EngineRequest>;

/// Creates the Axum router with all the API endpoints.
pub fn create_router(engine_tx: AppState) -> Router {
    Router::new()
        .route("/api/v1/jobs", get(list_jobs).post(track_job))
        .route("/api/v1/jobs/{id}/cancel", post(cancel_job))
        .route("/api/v1/jobs/{id}/takeout", post(acknowledge_cleanup))
        .route("/api/v1/prompts", get(list_prompts))
        .route("/api/v1/files", get(list_staged).post(stage_files))
        .route("/api/v1/files/{index}", delete(remove_staged))
        .route("/api/v1/queue", get(list_queue))
        .route("/api/v1/queue/commit", post(commit_queue))
        .route("/api/v1/queue/estimate", get(queue_estimate))
        .route("/api/v1/queue/{index}", delete(remove_queue_entry))
        .with_state(engine_tx)
}

/// Send one request to the engine and wait for its reply.
async fn ask<T>(
    engine_tx: &AppState,
    make_request: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
) -> Result<T, StatusCode> {
    let (resp_tx, resp_rx) = oneshot::channel();
    if engine_tx.send(make_request(resp_tx)).await.is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    resp_rx.await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn list_jobs(State(engine_tx): State<AppState>) -> Result<Json<Vec<JobView>>, StatusCode> {
    ask(&engine_tx, |respond_to| EngineRequest::ListJobs { respond_to })
        .await
        .map(Json)
}

async fn track_job(
    State(engine_tx): State<AppState>,
    Json(request): Json<TrackJobRequest>,
) -> Result<Json<JobView>, StatusCode> {
    match ask(&engine_tx, |respond_to| EngineRequest::TrackJob {
        request,
        respond_to,
    })
    .await?
    {
        Ok(job) => Ok(Json(job)),
        Err(_) => Err(StatusCode::BAD_GATEWAY),
    }
}

async fn cancel_job(
    State(engine_tx): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    match ask(&engine_tx, |respond_to| EngineRequest::CancelJob {
        job_id: id,
        respond_to,
    })
    .await?
    {
        Ok(()) => Ok(StatusCode::OK),
        Err(_) => Err(StatusCode::BAD_GATEWAY),
    }
}

async fn acknowledge_cleanup(
    State(engine_tx): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let acknowledged = ask(&engine_tx, |respond_to| EngineRequest::AcknowledgeCleanup {
        job_id: id,
        respond_to,
    })
    .await?;
    if acknowledged {
        Ok(StatusCode::OK)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn list_prompts(
    State(engine_tx): State<AppState>,
) -> Result<Json<Vec<PromptView>>, StatusCode> {
    ask(&engine_tx, |respond_to| EngineRequest::ListPrompts { respond_to })
        .await
        .map(Json)
}

/// Stage a batch of files. Files with a bad extension or undecodable
/// content are reported per-file; valid siblings still go through.
async fn stage_files(
    State(engine_tx): State<AppState>,
    Json(requests): Json<Vec<StageFileRequest>>,
) -> Result<Json<StageOutcome>, StatusCode> {
    let mut files = Vec::new();
    let mut undecodable = Vec::new();
    for request in requests {
        match BASE64_STANDARD.decode(request.content.as_bytes()) {
            Ok(content) => files.push(UploadCandidate {
                name: request.name,
                content,
                media_type: request.media_type,
            }),
            Err(_) => undecodable.push(RejectedFile {
                name: request.name,
                reason: "file content is not valid base64".to_string(),
            }),
        }
    }
    let mut outcome = ask(&engine_tx, |respond_to| EngineRequest::StageFiles {
        files,
        respond_to,
    })
    .await?;
    outcome.rejected.extend(undecodable);
    Ok(Json(outcome))
}

async fn list_staged(
    State(engine_tx): State<AppState>,
) -> Result<Json<Vec<StagedFileView>>, StatusCode> {
    ask(&engine_tx, |respond_to| EngineRequest::ListStaged { respond_to })
        .await
        .map(Json)
}

async fn remove_staged(
    State(engine_tx): State<AppState>,
    Path(index): Path<usize>,
) -> Result<StatusCode, StatusCode> {
    match ask(&engine_tx, |respond_to| EngineRequest::RemoveStaged {
        index,
        respond_to,
    })
    .await?
    {
        Ok(()) => Ok(StatusCode::OK),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

async fn list_queue(
    State(engine_tx): State<AppState>,
) -> Result<Json<Vec<QueueEntryView>>, StatusCode> {
    ask(&engine_tx, |respond_to| EngineRequest::ListQueue { respond_to })
        .await
        .map(Json)
}

async fn commit_queue(
    State(engine_tx): State<AppState>,
) -> Result<Json<CommitView>, StatusCode> {
    ask(&engine_tx, |respond_to| EngineRequest::CommitQueue { respond_to })
        .await
        .map(Json)
}

async fn remove_queue_entry(
    State(engine_tx): State<AppState>,
    Path(index): Path<usize>,
) -> Result<StatusCode, StatusCode> {
    match ask(&engine_tx, |respond_to| EngineRequest::RemoveQueueEntry {
        index,
        respond_to,
    })
    .await?
    {
        Ok(()) => Ok(StatusCode::OK),
        // Confirmed removal: the entry stays until the backend accepts.
        Err(_) => Err(StatusCode::BAD_GATEWAY),
    }
}

async fn queue_estimate(
    State(engine_tx): State<AppState>,
) -> Result<Json<QueueEstimateView>, StatusCode> {
    ask(&engine_tx, |respond_to| EngineRequest::QueueEstimate { respond_to })
        .await
        .map(Json)
}
