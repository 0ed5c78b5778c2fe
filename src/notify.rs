//! The notification prompt controller: per-job "clean the plate"
//! acknowledgment flow after a print finishes.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::backend::{with_timeout, BackendClient};
use crate::registry::JobRegistry;
use crate::scheduler::TimerScheduler;

pub const DEFAULT_CLEANUP_MESSAGE: &str = "Please take out your print!";

/// An active cleanup prompt, shown until the user confirms or dismisses it.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub job_id: String,
    pub message: String,
    pub shown_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PromptController {
    prompts: Arc<RwLock<HashMap<String, Prompt>>>,
    registry: JobRegistry,
    scheduler: TimerScheduler,
    backend: Arc<dyn BackendClient>,
    request_timeout: Duration,
    default_message: String,
}

impl PromptController {
    pub fn new(
        registry: JobRegistry,
        scheduler: TimerScheduler,
        backend: Arc<dyn BackendClient>,
        request_timeout: Duration,
        default_message: impl Into<String>,
    ) -> Self {
        Self {
            prompts: Arc::new(RwLock::new(HashMap::new())),
            registry,
            scheduler,
            backend,
            request_timeout,
            default_message: default_message.into(),
        }
    }

    /// Show a cleanup prompt for the job. Idempotent: if one is already
    /// shown for this id, nothing changes. Returns whether a prompt was
    /// created.
    pub async fn show(&self, job_id: &str, message: Option<String>) -> bool {
        let mut prompts = self.prompts.write().await;
        if prompts.contains_key(job_id) {
            return false;
        }
        let prompt = Prompt {
            job_id: job_id.to_string(),
            message: message.unwrap_or_else(|| self.default_message.clone()),
            shown_at: Utc::now(),
        };
        tracing::info!(%job_id, "cleanup prompt shown");
        prompts.insert(job_id.to_string(), prompt);
        true
    }

    /// The user acknowledged the plate is clean. Always attempts the backend
    /// takeout call; a backend failure is logged but does not keep the local
    /// state around. Returns whether a prompt existed for the id.
    pub async fn confirm(&self, job_id: &str) -> bool {
        let existed = self.prompts.write().await.remove(job_id).is_some();
        if !existed {
            tracing::debug!(%job_id, "cleanup confirm for a job with no prompt, ignoring");
            return false;
        }
        if let Err(err) = with_timeout(self.request_timeout, self.backend.takeout(job_id)).await {
            tracing::error!(%job_id, error = %err, "takeout notification failed");
        }
        self.resolve_locally(job_id).await;
        true
    }

    /// A backend `plate_is_clean` notice. The payload names the printer, so
    /// the job is looked up by id first and by printer label second. With no
    /// prompt currently shown this is a no-op: the notice arrived out of
    /// order or the user already confirmed.
    pub async fn plate_cleaned(&self, printer_name: &str) -> bool {
        let job_id = if self.prompts.read().await.contains_key(printer_name) {
            printer_name.to_string()
        } else {
            match self.registry.find_by_printer(printer_name).await {
                Some(job) => job.id,
                None => printer_name.to_string(),
            }
        };
        if self.prompts.write().await.remove(&job_id).is_none() {
            tracing::debug!(%printer_name, "plate_is_clean with no active prompt, ignoring");
            return false;
        }
        self.resolve_locally(&job_id).await;
        true
    }

    /// Drop the prompt without resolving the job. Used for user dismissal
    /// and when the job is canceled while a prompt is up.
    pub async fn dismiss(&self, job_id: &str) -> bool {
        self.prompts.write().await.remove(job_id).is_some()
    }

    pub async fn active(&self) -> Vec<Prompt> {
        let mut prompts: Vec<Prompt> = self.prompts.read().await.values().cloned().collect();
        prompts.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        prompts
    }

    pub async fn is_shown(&self, job_id: &str) -> bool {
        self.prompts.read().await.contains_key(job_id)
    }

    async fn resolve_locally(&self, job_id: &str) {
        self.scheduler.cancel(job_id).await;
        if self.registry.remove(job_id).await {
            tracing::info!(%job_id, "job resolved and removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StubBackend;
    use crate::events::NoticeBus;
    use crate::job::JobState;
    use crate::registry::JobPatch;
    use tokio::sync::mpsc;

    fn controller() -> (PromptController, JobRegistry) {
        let registry = JobRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let scheduler = TimerScheduler::new(registry.clone(), tx, Duration::from_secs(1));
        let backend = Arc::new(StubBackend::new("tester", NoticeBus::default()));
        let prompts = PromptController::new(
            registry.clone(),
            scheduler,
            backend,
            Duration::from_secs(5),
            DEFAULT_CLEANUP_MESSAGE,
        );
        (prompts, registry)
    }

    async fn awaiting_job(registry: &JobRegistry, id: &str, printer: &str) {
        let mut patch = JobPatch::new(id);
        patch.printer_label = Some(printer.to_string());
        patch.state = Some(JobState::AwaitingCleanup);
        registry.upsert(patch).await;
    }

    #[tokio::test]
    async fn show_is_idempotent() {
        let (prompts, _registry) = controller();
        assert!(prompts.show("j1", None).await);
        assert!(!prompts.show("j1", Some("again".to_string())).await);
        let active = prompts.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, DEFAULT_CLEANUP_MESSAGE);
    }

    #[tokio::test]
    async fn confirm_removes_prompt_and_job() {
        let (prompts, registry) = controller();
        awaiting_job(&registry, "j1", "S5. Brienne of Tarth").await;
        prompts.show("j1", None).await;

        assert!(prompts.confirm("j1").await);
        assert!(!prompts.is_shown("j1").await);
        assert!(registry.get("j1").await.is_none());
    }

    #[tokio::test]
    async fn confirm_without_prompt_is_a_noop() {
        let (prompts, registry) = controller();
        awaiting_job(&registry, "j1", "S5. Brienne of Tarth").await;
        assert!(!prompts.confirm("j1").await);
        assert!(registry.get("j1").await.is_some());
    }

    #[tokio::test]
    async fn plate_cleaned_resolves_by_printer_label() {
        let (prompts, registry) = controller();
        awaiting_job(&registry, "j1", "S5. Brienne of Tarth").await;
        prompts.show("j1", None).await;

        assert!(prompts.plate_cleaned("S5. Brienne of Tarth").await);
        assert!(registry.get("j1").await.is_none());
    }

    #[tokio::test]
    async fn out_of_order_plate_cleaned_is_a_noop() {
        let (prompts, registry) = controller();
        awaiting_job(&registry, "j1", "S5. Brienne of Tarth").await;
        // No prompt shown yet: the notice must not remove anything.
        assert!(!prompts.plate_cleaned("S5. Brienne of Tarth").await);
        assert!(registry.get("j1").await.is_some());
    }
}
