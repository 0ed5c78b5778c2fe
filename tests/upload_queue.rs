//! Upload staging, commit and removal against both a cooperative and a
//! failing backend.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Duration;

use printez::backend::{
    BackendClient, BackendError, CountdownInfo, CreateCountdownRequest, StatusInfo, StubBackend,
    UploadReceipt,
};
use printez::events::{NoticeBus, QueueReport};
use printez::persist::QueueStore;
use printez::upload::{UploadCandidate, UploadError, UploadQueueManager};

fn candidate(name: &str) -> UploadCandidate {
    UploadCandidate {
        name: name.to_string(),
        content: b"G1 X10\nG1 Y20\n".to_vec(),
        media_type: "text/x.gcode".to_string(),
    }
}

/// Accepts uploads but refuses every cancellation, for exercising the
/// confirmed-removal policy.
struct NoCancelBackend {
    counter: AtomicU64,
}

impl NoCancelBackend {
    fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl BackendClient for NoCancelBackend {
    async fn create_countdown(
        &self,
        _req: CreateCountdownRequest,
    ) -> Result<CountdownInfo, BackendError> {
        Err(BackendError::Rejected("not supported".to_string()))
    }

    async fn status(&self) -> Result<StatusInfo, BackendError> {
        Ok(StatusInfo { total_seconds: 0 })
    }

    async fn cancel(&self, _print_id: &str) -> Result<(), BackendError> {
        Err(BackendError::Rejected("cancel refused".to_string()))
    }

    async fn cancel_by_id(&self, _uuid: &str) -> Result<(), BackendError> {
        Err(BackendError::Rejected("cancel refused".to_string()))
    }

    async fn takeout(&self, _print_id: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn upload(&self, candidate: &UploadCandidate) -> Result<UploadReceipt, BackendError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(UploadReceipt {
            uuid: format!("uuid-{n}"),
            filename: candidate.name.clone(),
        })
    }

    async fn get_queue(&self) -> Result<Vec<QueueReport>, BackendError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn mixed_batch_stages_only_valid_files() {
    let backend = Arc::new(StubBackend::new("tester", NoticeBus::default()));
    let mut manager = UploadQueueManager::new(backend, None, Duration::from_secs(5));

    let rejected = manager.stage_all(vec![candidate("a.gcode"), candidate("b.stl")]);

    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].to_string().contains("b.stl"));
    let staged: Vec<&str> = manager.staged().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(staged, vec!["a.gcode"]);
}

#[tokio::test]
async fn commit_then_resubmit_leaves_one_entry_per_name() {
    let backend = Arc::new(StubBackend::new("tester", NoticeBus::default()));
    let mut manager = UploadQueueManager::new(backend, None, Duration::from_secs(5));

    manager.stage(candidate("a.gcode")).unwrap();
    manager.stage(candidate("b.3mf")).unwrap();
    let outcome = manager.commit().await;
    assert_eq!(outcome.accepted.len(), 2);
    let old_uuid = manager.queue()[0].uuid.clone();

    manager.stage(candidate("a.gcode")).unwrap();
    let outcome = manager.commit().await;
    assert_eq!(outcome.accepted, vec!["a.gcode"]);

    let names: Vec<&str> = manager
        .queue()
        .iter()
        .map(|e| e.file_name.as_str())
        .collect();
    assert_eq!(names.iter().filter(|n| **n == "a.gcode").count(), 1);
    assert_eq!(manager.queue().len(), 2);
    let new_uuid = &manager
        .queue()
        .iter()
        .find(|e| e.file_name == "a.gcode")
        .unwrap()
        .uuid;
    assert_ne!(*new_uuid, old_uuid);
}

#[tokio::test]
async fn replace_by_name_holds_even_when_cancel_fails() {
    let backend = Arc::new(NoCancelBackend::new());
    let mut manager = UploadQueueManager::new(backend, None, Duration::from_secs(5));

    manager.stage(candidate("a.gcode")).unwrap();
    manager.commit().await;
    manager.stage(candidate("a.gcode")).unwrap();
    manager.commit().await;

    assert_eq!(manager.queue().len(), 1);
    assert_eq!(manager.queue()[0].uuid, "uuid-1");
}

#[tokio::test]
async fn removal_is_confirmed_not_optimistic() {
    let backend = Arc::new(NoCancelBackend::new());
    let mut manager = UploadQueueManager::new(backend, None, Duration::from_secs(5));
    manager.stage(candidate("a.gcode")).unwrap();
    manager.commit().await;

    // The backend refuses the cancel, so the local entry must stay.
    let result = manager.remove_queue_file(0).await;
    assert!(matches!(result, Err(UploadError::Backend(_))));
    assert_eq!(manager.queue().len(), 1);
}

#[tokio::test]
async fn committed_queue_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = QueueStore::new(dir.path().join("queue.json"));
    let backend = Arc::new(StubBackend::new("tester", NoticeBus::default()));

    let mut manager =
        UploadQueueManager::new(backend.clone(), Some(store.clone()), Duration::from_secs(5));
    manager.stage(candidate("a.gcode")).unwrap();
    manager.commit().await;
    let uuid = manager.queue()[0].uuid.clone();
    drop(manager);

    let mut restarted = UploadQueueManager::new(backend, Some(store), Duration::from_secs(5));
    restarted.load_persisted().await;
    assert_eq!(restarted.queue().len(), 1);
    assert_eq!(restarted.queue()[0].uuid, uuid);
    assert_eq!(restarted.queue()[0].content, b"G1 X10\nG1 Y20\n");
}
