//! Wires the registry, scheduler, reconciler, prompt controller and upload
//! manager together, and runs the event loop that multiplexes API requests,
//! push notices, completion signals and the periodic pull.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::broadcast;
use tokio::time::{Duration, MissedTickBehavior};

use crate::backend::{with_timeout, BackendClient, CreateCountdownRequest};
use crate::config::Config;
use crate::events::{JobEvent, Notice, NoticeBus};
use crate::job::{JobState, SyncScope};
use crate::notify::PromptController;
use crate::persist::QueueStore;
use crate::registry::{JobPatch, JobRegistry, ReconcileOutcome};
use crate::scheduler::TimerScheduler;
use crate::sync::SyncReconciler;
use crate::upload::{UploadCandidate, UploadQueueManager};
use crate::web::channel::EngineRequest;
use crate::web::models::{
    CommitView, FailedFile, JobView, PromptView, QueueEntryView, QueueEstimateView, RejectedFile,
    StageOutcome, StagedFileView, TrackJobRequest,
};

pub struct Engine {
    config: Config,
    registry: JobRegistry,
    scheduler: TimerScheduler,
    reconciler: SyncReconciler,
    prompts: PromptController,
    uploads: UploadQueueManager,
    backend: Arc<dyn BackendClient>,
    bus: NoticeBus,
    completions: Option<mpsc::Receiver<JobEvent>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Engine {
    pub fn new(config: Config, backend: Arc<dyn BackendClient>, bus: NoticeBus) -> Self {
        let registry = JobRegistry::new();
        let request_timeout = Duration::from_secs(config.backend.request_timeout_secs);
        let (completions_tx, completions_rx) = mpsc::channel(64);
        let scheduler = TimerScheduler::new(
            registry.clone(),
            completions_tx,
            Duration::from_secs(config.engine.tick_interval_secs),
        );
        let reconciler = SyncReconciler::new(registry.clone(), backend.clone(), request_timeout);
        let prompts = PromptController::new(
            registry.clone(),
            scheduler.clone(),
            backend.clone(),
            request_timeout,
            config.engine.cleanup_message.clone(),
        );
        let store = QueueStore::new(config.storage.queue_file.clone());
        let uploads = UploadQueueManager::new(backend.clone(), Some(store), request_timeout);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            registry,
            scheduler,
            reconciler,
            prompts,
            uploads,
            backend,
            bus,
            completions: Some(completions_rx),
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &TimerScheduler {
        &self.scheduler
    }

    pub fn prompts(&self) -> &PromptController {
        &self.prompts
    }

    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Restore persisted state and take an initial look at the backend.
    pub async fn bootstrap(&mut self) {
        self.uploads.load_persisted().await;
        let timeout = self.request_timeout();
        match with_timeout(timeout, self.backend.status()).await {
            Ok(status) => {
                tracing::info!(total_seconds = status.total_seconds, "backend reachable")
            }
            Err(err) => tracing::warn!(error = %err, "backend status check failed"),
        }
        self.poll().await;
    }

    /// Event loop. One logical task multiplexes API requests, push notices,
    /// completion signals and the periodic pull; component state is only
    /// ever mutated from here and from the per-job tick tasks, which go
    /// through the registry's own locking.
    pub async fn run(mut self, mut requests: mpsc::Receiver<EngineRequest>) {
        let Some(mut completions) = self.completions.take() else {
            return;
        };
        let mut notices = self.bus.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut poll = tokio::time::interval(Duration::from_secs(
            self.config.engine.poll_interval_secs.max(1),
        ));
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick fires immediately; bootstrap already
        // polled, so swallow it.
        poll.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("engine shutting down");
                    break;
                }
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                event = completions.recv() => {
                    if let Some(JobEvent::Completed { job_id }) = event {
                        self.prompts.show(&job_id, None).await;
                    }
                }
                notice = notices.recv() => match notice {
                    Ok(notice) => self.handle_notice(notice).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notice feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = poll.tick() => self.poll().await,
            }
        }
    }

    async fn poll(&mut self) {
        match self.reconciler.poll_once().await {
            Ok(result) => {
                self.uploads.apply_queue_estimates(&result.reports);
                self.after_reconcile(&result.outcome).await;
            }
            Err(err) => tracing::warn!(error = %err, "queue poll failed"),
        }
    }

    async fn handle_notice(&mut self, notice: Notice) {
        match notice {
            Notice::PrinterTimes(reports) => {
                let outcome = self.reconciler.apply_printer_report(reports).await;
                self.after_reconcile(&outcome).await;
            }
            Notice::PrelimQueue(reports) => {
                self.uploads.apply_queue_estimates(&reports);
                let outcome = self.reconciler.apply_queue_report(&reports).await;
                self.after_reconcile(&outcome).await;
            }
            Notice::FileAddedToQueue { filename, owner } => {
                tracing::info!(%filename, %owner, "file confirmed in backend queue");
            }
            Notice::RequestPlateCleanup { print_id, message } => {
                self.prompts.show(&print_id, message).await;
            }
            Notice::PlateIsClean { printer_name, msg } => {
                if let Some(msg) = msg {
                    tracing::debug!(%printer_name, %msg, "plate_is_clean");
                }
                self.prompts.plate_cleaned(&printer_name).await;
            }
        }
    }

    /// Keep timers and prompts in step with what a snapshot pass did.
    async fn after_reconcile(&self, outcome: &ReconcileOutcome) {
        for id in &outcome.removed {
            self.scheduler.cancel(id).await;
            self.prompts.dismiss(id).await;
        }
        for id in &outcome.started {
            self.scheduler.register(id).await;
        }
    }

    async fn handle_request(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::ListJobs { respond_to } => {
                let jobs = self.registry.list().await;
                let _ = respond_to.send(jobs.into_iter().map(JobView::from).collect());
            }
            EngineRequest::TrackJob {
                request,
                respond_to,
            } => {
                let _ = respond_to.send(self.track_job(request).await);
            }
            EngineRequest::CancelJob { job_id, respond_to } => {
                self.cancel_job(&job_id).await;
                let _ = respond_to.send(Ok(()));
            }
            EngineRequest::AcknowledgeCleanup { job_id, respond_to } => {
                let _ = respond_to.send(self.prompts.confirm(&job_id).await);
            }
            EngineRequest::ListPrompts { respond_to } => {
                let prompts = self.prompts.active().await;
                let _ = respond_to.send(prompts.into_iter().map(PromptView::from).collect());
            }
            EngineRequest::StageFiles { files, respond_to } => {
                let _ = respond_to.send(self.stage_files(files));
            }
            EngineRequest::ListStaged { respond_to } => {
                let staged = self
                    .uploads
                    .staged()
                    .iter()
                    .map(StagedFileView::from)
                    .collect();
                let _ = respond_to.send(staged);
            }
            EngineRequest::RemoveStaged { index, respond_to } => {
                let result = self
                    .uploads
                    .remove_staged(index)
                    .map(|_| ())
                    .map_err(|err| err.to_string());
                let _ = respond_to.send(result);
            }
            EngineRequest::ListQueue { respond_to } => {
                let queue = self
                    .uploads
                    .queue()
                    .iter()
                    .map(QueueEntryView::from)
                    .collect();
                let _ = respond_to.send(queue);
            }
            EngineRequest::CommitQueue { respond_to } => {
                let outcome = self.uploads.commit().await;
                let _ = respond_to.send(CommitView {
                    accepted: outcome.accepted,
                    failed: outcome
                        .failed
                        .into_iter()
                        .map(|(name, error)| FailedFile { name, error })
                        .collect(),
                });
            }
            EngineRequest::RemoveQueueEntry { index, respond_to } => {
                let result = self
                    .uploads
                    .remove_queue_file(index)
                    .await
                    .map(|_| ())
                    .map_err(|err| err.to_string());
                let _ = respond_to.send(result);
            }
            EngineRequest::QueueEstimate { respond_to } => {
                let minutes = self.uploads.queue_estimate_minutes();
                let _ = respond_to.send(QueueEstimateView::from_minutes(minutes));
            }
        }
    }

    /// Register a running job with the backend and start its countdown.
    async fn track_job(&mut self, request: TrackJobRequest) -> Result<JobView, String> {
        let countdown = with_timeout(
            self.request_timeout(),
            self.backend.create_countdown(CreateCountdownRequest {
                print_id: request.print_id.clone(),
                printer_name: request.printer_name.clone(),
                print_name: request.print_name.clone(),
            }),
        )
        .await
        .map_err(|err| {
            tracing::error!(print_id = %request.print_id, error = %err,
                "failed to fetch countdown data");
            err.to_string()
        })?;

        let mut patch = JobPatch::new(&request.print_id);
        patch.printer_label = Some(request.printer_name);
        patch.file_name = Some(if request.print_name.is_empty() {
            "Unknown Print Job".to_string()
        } else {
            request.print_name
        });
        patch.total_seconds = Some(countdown.total_seconds);
        patch.remaining_seconds = Some(countdown.total_seconds);
        patch.state = Some(JobState::Printing);
        patch.scope = Some(SyncScope::Local);
        let job = self.registry.upsert(patch).await;
        self.scheduler.register(&job.id).await;
        Ok(JobView::from(job))
    }

    /// Cancel a job: timer and prompt go synchronously, the registry entry
    /// is dropped, and the backend is notified best-effort.
    async fn cancel_job(&mut self, job_id: &str) {
        self.scheduler.cancel(job_id).await;
        self.prompts.dismiss(job_id).await;
        if self.registry.remove(job_id).await {
            tracing::info!(%job_id, "job canceled");
        }
        if let Err(err) =
            with_timeout(self.request_timeout(), self.backend.cancel(job_id)).await
        {
            tracing::error!(%job_id, error = %err, "failed to notify cancellation");
        }
    }

    fn stage_files(&mut self, files: Vec<UploadCandidate>) -> StageOutcome {
        let rejected = self
            .uploads
            .stage_all(files)
            .into_iter()
            .map(|err| RejectedFile {
                name: match &err {
                    crate::upload::UploadError::InvalidExtension { name } => name.clone(),
                    _ => String::new(),
                },
                reason: err.to_string(),
            })
            .collect();
        StageOutcome {
            staged: self
                .uploads
                .staged()
                .iter()
                .map(|candidate| candidate.name.clone())
                .collect(),
            rejected,
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.backend.request_timeout_secs)
    }
}
