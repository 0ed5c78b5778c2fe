//! Job records and lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single print job.
///
/// Transitions are monotone in the order below, except `Canceled` which is
/// reachable from any non-terminal state. `Resolved` and `Canceled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Printing,
    AwaitingCleanup,
    Resolved,
    Canceled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Resolved | JobState::Canceled)
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Printing => 1,
            JobState::AwaitingCleanup => 2,
            JobState::Resolved => 3,
            JobState::Canceled => 3,
        }
    }

    /// Whether a locally-driven transition to `next` is allowed.
    ///
    /// Authoritative snapshots bypass this check: the backend may legitimately
    /// report an earlier state than the locally ticked one.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobState::Canceled {
            return true;
        }
        next.rank() >= self.rank()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Printing => "printing",
            JobState::AwaitingCleanup => "awaiting_cleanup",
            JobState::Resolved => "resolved",
            JobState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Where a registry entry came from. Structural rebuilds during
/// reconciliation only replace entries from the same feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// Created locally (job tracked through the API before any snapshot).
    Local,
    /// Created by the `update_printer_times` push feed.
    PrinterFeed,
    /// Created by the committed-queue pull / `prelim_queue` push feed.
    QueueFeed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    pub id: String,
    pub printer_label: Option<String>,
    pub file_name: String,
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    pub percent_complete: f64,
    pub current_layer: Option<u32>,
    pub total_layers: Option<u32>,
    pub state: JobState,
    pub scope: SyncScope,
}

impl PrintJob {
    /// Completion ratio in [0, 1], for progress rendering.
    pub fn progress(&self) -> f64 {
        (self.percent_complete / 100.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reachable_from_non_terminal_states() {
        assert!(JobState::Queued.can_advance_to(JobState::Canceled));
        assert!(JobState::Printing.can_advance_to(JobState::Canceled));
        assert!(JobState::AwaitingCleanup.can_advance_to(JobState::Canceled));
        assert!(!JobState::Canceled.can_advance_to(JobState::Canceled));
        assert!(!JobState::Resolved.can_advance_to(JobState::Canceled));
    }

    #[test]
    fn transitions_are_monotone() {
        assert!(JobState::Queued.can_advance_to(JobState::Printing));
        assert!(JobState::Printing.can_advance_to(JobState::AwaitingCleanup));
        assert!(JobState::AwaitingCleanup.can_advance_to(JobState::Resolved));
        assert!(!JobState::Printing.can_advance_to(JobState::Queued));
        assert!(!JobState::AwaitingCleanup.can_advance_to(JobState::Printing));
    }

    #[test]
    fn progress_is_clamped() {
        let mut job = PrintJob {
            id: "j1".to_string(),
            printer_label: None,
            file_name: "part.gcode".to_string(),
            total_seconds: 100,
            remaining_seconds: 50,
            percent_complete: 50.0,
            current_layer: None,
            total_layers: None,
            state: JobState::Printing,
            scope: SyncScope::Local,
        };
        assert!((job.progress() - 0.5).abs() < f64::EPSILON);
        job.percent_complete = 140.0;
        assert!((job.progress() - 1.0).abs() < f64::EPSILON);
    }
}
