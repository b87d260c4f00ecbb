pub mod client;
pub mod coordinator;
pub mod wire;

pub use client::CloudSyncClient;
pub use coordinator::SyncCoordinator;

use serde::Serialize;

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncDirection {
    Push,
    Pull,
}

/// Report returned after a push or pull completes.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sync_id: String,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    pub items_synced: u64,
    pub items_failed: u64,
    /// Server-reported time of the exchange, when it sent one.
    pub sync_date: Option<String>,
    pub error: Option<String>,
}

impl SyncReport {
    /// Create a SyncReport with the appropriate status derived from counts.
    pub fn from_counts(
        sync_id: String,
        direction: SyncDirection,
        items_synced: u64,
        items_failed: u64,
        sync_date: Option<String>,
    ) -> Self {
        let status = if items_failed == 0 {
            SyncStatus::Success
        } else if items_synced > 0 {
            SyncStatus::PartialFailure
        } else {
            SyncStatus::Failed
        };
        let error = if items_failed > 0 {
            Some(format!("{items_failed} remote tasks could not be read and were skipped"))
        } else {
            None
        };
        Self {
            sync_id,
            direction,
            status,
            items_synced,
            items_failed,
            sync_date,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Success,
    PartialFailure,
    Failed,
}

/// Outcome of replacing local tasks with the remote snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PullResult {
    /// The tasks now stored locally, with their new ids.
    pub tasks: Vec<Task>,
    pub report: SyncReport,
}

/// Server-side view of this device's dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    pub synced: bool,
    pub last_sync_date: Option<String>,
}

/// Outcome of wiping all data. Local deletion always happens; the remote copy
/// may survive when `remote_error` is set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteReport {
    /// The sync id that was forgotten, if one existed.
    pub sync_id: Option<String>,
    pub tasks_deleted: usize,
    pub remote_deleted: bool,
    pub remote_error: Option<String>,
}

/// Callbacks for reporting sync progress to a UI.
pub trait SyncProgress: Send + Sync {
    fn on_push_start(&self, _sync_id: &str, _task_count: usize) {}
    fn on_pull_fetched(&self, _sync_id: &str, _record_count: usize) {}
    fn on_record_dropped(&self, _index: usize, _reason: &str) {}
    fn on_complete(&self, _report: &SyncReport) {}
}

/// Progress reporter that ignores every event.
pub struct NoopProgress;

impl SyncProgress for NoopProgress {}
