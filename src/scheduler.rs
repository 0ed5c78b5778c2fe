//! The timer scheduler: one independent countdown tick source per printing
//! job, with a cancel handle held in a single map keyed by job id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::{oneshot, RwLock};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::events::JobEvent;
use crate::registry::{JobRegistry, TickResult};

/// Outcome of a single tick, as seen by the tick task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Advanced,
    Completed,
    /// Job is queued; keep the tick source alive but do nothing.
    Waiting,
    /// Job is gone or finished; the tick source should deregister itself.
    Stopped,
}

struct TimerHandle {
    token: u64,
    stop: oneshot::Sender<()>,
}

#[derive(Clone)]
pub struct TimerScheduler {
    registry: JobRegistry,
    completions: Sender<JobEvent>,
    tick_interval: Duration,
    handles: Arc<RwLock<HashMap<String, TimerHandle>>>,
    next_token: Arc<AtomicU64>,
}

impl TimerScheduler {
    pub fn new(registry: JobRegistry, completions: Sender<JobEvent>, tick_interval: Duration) -> Self {
        Self {
            registry,
            completions,
            tick_interval,
            handles: Arc::new(RwLock::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a tick source for the job if one is not already running.
    pub async fn register(&self, id: &str) {
        let mut handles = self.handles.write().await;
        if handles.contains_key(id) {
            return;
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        handles.insert(
            id.to_string(),
            TimerHandle {
                token,
                stop: stop_tx,
            },
        );
        drop(handles);

        let scheduler = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let mut ticks =
                interval_at(Instant::now() + scheduler.tick_interval, scheduler.tick_interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticks.tick() => match scheduler.tick(&id).await {
                        TickOutcome::Advanced | TickOutcome::Waiting => {}
                        TickOutcome::Completed | TickOutcome::Stopped => break,
                    },
                }
            }
            scheduler.deregister(&id, token).await;
        });
    }

    /// Advance the job's countdown by one second and raise the completion
    /// signal when it hits zero. Exposed so tests can drive ticks directly.
    pub async fn tick(&self, id: &str) -> TickOutcome {
        match self.registry.advance_countdown(id).await {
            TickResult::Advanced(_) => TickOutcome::Advanced,
            TickResult::Completed(job) => {
                tracing::info!(job_id = %job.id, "print finished, plate cleanup required");
                let event = JobEvent::Completed {
                    job_id: job.id.clone(),
                };
                if self.completions.send(event).await.is_err() {
                    tracing::warn!(job_id = %job.id, "completion signal dropped, engine gone");
                }
                TickOutcome::Completed
            }
            TickResult::Waiting => TickOutcome::Waiting,
            TickResult::Finished | TickResult::Missing => TickOutcome::Stopped,
        }
    }

    /// Stop the job's tick source. Safe to call repeatedly and for ids with
    /// no active timer.
    pub async fn cancel(&self, id: &str) {
        if let Some(handle) = self.handles.write().await.remove(id) {
            let _ = handle.stop.send(());
        }
    }

    pub async fn is_active(&self, id: &str) -> bool {
        self.handles.read().await.contains_key(id)
    }

    /// Remove this task's own handle, unless the id was re-registered since.
    async fn deregister(&self, id: &str, token: u64) {
        let mut handles = self.handles.write().await;
        if handles.get(id).is_some_and(|h| h.token == token) {
            handles.remove(id);
        }
    }
}

/// Render a second count as `"{h}h {m}m {s}s"`, omitting the hours segment
/// when zero and the minutes segment when hours and minutes are both zero.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 || hours > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{secs}s"));
    out
}
