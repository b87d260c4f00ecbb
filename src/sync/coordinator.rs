//! Whole-dataset sync between the local task store and the remote endpoint.
//!
//! Every operation rebuilds what it needs from [`SyncPreferences`]; nothing is
//! kept between calls. Pushes and pulls overwrite the other side wholesale.
//! There is no merge and no protection against two operations running at
//! once: a push racing a pull may upload a list the pull is about to wipe.

use crate::error::{Error, Result};
use crate::storage::{SyncPreferences, SyncState, TaskStore};
use crate::sync::client::CloudSyncClient;
use crate::sync::wire::{TaskRecord, TaskSnapshot};
use crate::sync::{
    DeleteReport, PullResult, RemoteStatus, SyncDirection, SyncProgress, SyncReport,
};
use crate::task::{now_millis, Task};

pub struct SyncCoordinator {
    store: TaskStore,
    prefs: SyncPreferences,
    client: CloudSyncClient,
}

impl SyncCoordinator {
    pub fn new(store: TaskStore, prefs: SyncPreferences, client: CloudSyncClient) -> Self {
        Self {
            store,
            prefs,
            client,
        }
    }

    pub async fn sync_id(&self) -> Result<Option<String>> {
        self.prefs.sync_id().await
    }

    pub async fn sync_state(&self) -> Result<SyncState> {
        self.prefs.state().await
    }

    /// The device's sync id, generating and storing one on first use.
    pub async fn get_or_create_sync_id(&self) -> Result<String> {
        if let Some(id) = self.prefs.sync_id().await? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.prefs.save_sync_id(&id).await?;
        log::info!("Created sync id {id}");
        Ok(id)
    }

    /// Ask the server about this device's dataset and cache the answer.
    /// Failures leave the cached state untouched.
    pub async fn check_status(&self) -> Result<RemoteStatus> {
        let sync_id = self.prefs.sync_id().await?.ok_or(Error::NoSyncId)?;
        let status = self.client.status(&sync_id).await?;

        self.prefs
            .record_status(status.synced, status.last_sync_date.as_deref())
            .await?;
        Ok(RemoteStatus {
            synced: status.synced,
            last_sync_date: status.last_sync_date,
        })
    }

    /// Replace the remote dataset with `tasks`.
    pub async fn sync_to_cloud(
        &self,
        tasks: &[Task],
        progress: &dyn SyncProgress,
    ) -> Result<SyncReport> {
        let sync_id = self.get_or_create_sync_id().await?;
        progress.on_push_start(&sync_id, tasks.len());

        let snapshot = TaskSnapshot::from_tasks(tasks, now_millis());
        let response = self.client.push(&sync_id, &snapshot).await?;
        if !response.success {
            let message = response
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "sync failed".to_string());
            log::warn!("Server refused push for {sync_id}: {message}");
            return Err(Error::Rejected { message });
        }

        self.prefs
            .mark_synced(&sync_id, response.sync_date.as_deref())
            .await?;

        let report = SyncReport::from_counts(
            sync_id,
            SyncDirection::Push,
            tasks.len() as u64,
            0,
            response.sync_date,
        );
        log::info!(
            "Pushed {} tasks to {}",
            report.items_synced,
            report.sync_id
        );
        progress.on_complete(&report);
        Ok(report)
    }

    /// Push every locally stored task.
    pub async fn sync_all_to_cloud(&self, progress: &dyn SyncProgress) -> Result<SyncReport> {
        let tasks = self.store.all().await?;
        self.sync_to_cloud(&tasks, progress).await
    }

    /// Replace all local tasks with the dataset stored under `sync_id`, and
    /// adopt that id for this device. Records that cannot be read are skipped.
    pub async fn fetch_from_cloud(
        &self,
        sync_id: &str,
        progress: &dyn SyncProgress,
    ) -> Result<PullResult> {
        let sync_id = sync_id.trim();
        if sync_id.is_empty() {
            return Err(Error::InvalidInput("sync id must not be empty".into()));
        }

        let records = self.client.fetch(sync_id).await?.into_records();
        progress.on_pull_fetched(sync_id, records.len());

        let now = now_millis();
        let mut tasks = Vec::with_capacity(records.len());
        let mut dropped = 0u64;
        for (index, value) in records.into_iter().enumerate() {
            match TaskRecord::from_json(value).and_then(|record| record.into_task(now)) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    log::warn!("Skipping remote task #{index}: {e}");
                    progress.on_record_dropped(index, &e.to_string());
                    dropped += 1;
                }
            }
        }

        let stored = self.store.replace_all(tasks).await?;
        self.prefs.mark_synced(sync_id, None).await?;

        let report = SyncReport::from_counts(
            sync_id.to_string(),
            SyncDirection::Pull,
            stored.len() as u64,
            dropped,
            None,
        );
        log::info!(
            "Pulled {} tasks from {sync_id} ({dropped} skipped)",
            stored.len()
        );
        progress.on_complete(&report);
        Ok(PullResult {
            tasks: stored,
            report,
        })
    }

    /// Delete the remote dataset if possible, then all local tasks and sync
    /// state regardless of how the remote delete went.
    pub async fn delete_all_data(&self) -> Result<DeleteReport> {
        let sync_id = match self.prefs.sync_id().await {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Could not read sync id, skipping remote delete: {e}");
                None
            }
        };

        let mut report = DeleteReport {
            sync_id: sync_id.clone(),
            ..Default::default()
        };
        if let Some(ref id) = sync_id {
            match self.client.delete(id).await {
                Ok(()) => report.remote_deleted = true,
                Err(e) => {
                    log::warn!("Remote delete for {id} failed, local data is removed anyway: {e}");
                    report.remote_error = Some(e.to_string());
                }
            }
        }

        let deleted = self.store.delete_all().await;
        let cleared = self.prefs.clear_all().await;
        report.tasks_deleted = deleted?;
        cleared?;
        log::info!("Deleted {} local tasks and sync state", report.tasks_deleted);
        Ok(report)
    }
}
