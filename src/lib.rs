pub mod calendar;
pub mod config;
pub mod date_util;
pub mod error;
pub mod storage;
pub mod sync;
pub mod task;

pub use calendar::CalendarDay;
pub use date_util::{DateRangeCalculator, MonthCursor};
pub use error::{Error, Result};
pub use storage::{Database, SyncPreferences, SyncState, TaskStore, TaskSubscription};
pub use sync::{
    CloudSyncClient, DeleteReport, NoopProgress, PullResult, RemoteStatus, SyncCoordinator,
    SyncProgress, SyncReport, SyncStatus,
};
pub use task::Task;

/// Main entry point: the task calendar plus, when a client is configured,
/// cloud sync.
pub struct Glasscal {
    db: Database,
    store: TaskStore,
    prefs: SyncPreferences,
    sync: Option<SyncCoordinator>,
    calc: DateRangeCalculator,
}

impl Glasscal {
    pub fn new(db: Database, client: CloudSyncClient) -> Self {
        let mut glasscal = Self::open_local(db);
        glasscal.sync = Some(SyncCoordinator::new(
            glasscal.store.clone(),
            glasscal.prefs.clone(),
            client,
        ));
        glasscal
    }

    /// Without a sync client. Sync operations other than [`wipe`](Self::wipe)
    /// fail with a configuration error.
    pub fn open_local(db: Database) -> Self {
        Self {
            store: TaskStore::new(db.clone()),
            prefs: SyncPreferences::new(db.clone()),
            sync: None,
            calc: DateRangeCalculator::local(),
            db,
        }
    }

    pub fn calculator(&self) -> &DateRangeCalculator {
        &self.calc
    }

    fn coordinator(&self) -> Result<&SyncCoordinator> {
        self.sync.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "no sync endpoint configured. Run: glasscal config set {} <URL>",
                config::KEY_SYNC_ENDPOINT
            ))
        })
    }

    // ── Tasks ──────────────────────────────────────────────────────

    pub async fn add_task(
        &self,
        title: &str,
        content: &str,
        date: i64,
        image_uri: Option<&str>,
    ) -> Result<Task> {
        let mut task = Task::new(require_title(title)?, content, date);
        task.image_uri = image_uri.map(str::to_string);
        task.id = self.store.insert(task.clone()).await?;
        log::info!("Added task {} on {}", task.id, self.calc.format_date(date));
        Ok(task)
    }

    /// Save changes to an existing task and return it as stored.
    pub async fn edit_task(&self, mut task: Task) -> Result<Task> {
        task.title = require_title(&task.title)?.to_string();
        let id = task.id;
        if !self.store.update(task).await? {
            return Err(Error::NotFound(format!("task {id}")));
        }
        self.task(id).await
    }

    pub async fn delete_task(&self, id: i64) -> Result<()> {
        if self.store.delete_by_id(id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("task {id}")))
        }
    }

    /// Delete every local task, leaving sync state alone.
    pub async fn clear_tasks(&self) -> Result<usize> {
        self.store.delete_all().await
    }

    pub async fn task(&self, id: i64) -> Result<Task> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    pub async fn all_tasks(&self) -> Result<Vec<Task>> {
        self.store.all().await
    }

    pub async fn tasks_for_day(&self, timestamp: i64) -> Result<Vec<Task>> {
        self.store.tasks_for_day(&self.calc, timestamp).await
    }

    pub async fn tasks_for_month(&self, year: i32, month0: u32) -> Result<Vec<Task>> {
        self.store.tasks_for_month(&self.calc, year, month0).await
    }

    /// Month grid for `month0` (0-based) of `year`. Padding days from the
    /// neighbouring months carry their tasks too.
    pub async fn calendar(&self, year: i32, month0: u32) -> Result<Vec<CalendarDay>> {
        let (start, end) = calendar::grid_range(&self.calc, year, month0).ok_or_else(|| {
            Error::InvalidInput(format!("cannot show {}", MonthCursor::new(year, month0).label()))
        })?;
        let tasks = self.store.tasks_between(start, end).await?;
        Ok(calendar::build_month_grid(&self.calc, year, month0, &tasks))
    }

    pub fn observe_day(&self, timestamp: i64) -> TaskSubscription {
        self.store.observe_day(&self.calc, timestamp)
    }

    pub fn observe_month(&self, year: i32, month0: u32) -> TaskSubscription {
        self.store.observe_month(&self.calc, year, month0)
    }

    // ── Sync ───────────────────────────────────────────────────────

    pub async fn sync_id(&self) -> Result<Option<String>> {
        self.prefs.sync_id().await
    }

    pub async fn sync_state(&self) -> Result<SyncState> {
        self.prefs.state().await
    }

    pub async fn check_status(&self) -> Result<RemoteStatus> {
        self.coordinator()?.check_status().await
    }

    pub async fn push(&self, progress: &dyn SyncProgress) -> Result<SyncReport> {
        self.coordinator()?.sync_all_to_cloud(progress).await
    }

    pub async fn pull(&self, sync_id: &str, progress: &dyn SyncProgress) -> Result<PullResult> {
        self.coordinator()?.fetch_from_cloud(sync_id, progress).await
    }

    /// Delete all local data and sync state, and the remote copy when a
    /// client is configured.
    pub async fn wipe(&self) -> Result<DeleteReport> {
        if let Some(ref sync) = self.sync {
            return sync.delete_all_data().await;
        }
        let sync_id = self.prefs.sync_id().await?;
        if let Some(ref id) = sync_id {
            log::warn!("No sync endpoint configured, remote data for {id} is left in place");
        }
        let tasks_deleted = self.store.delete_all().await?;
        self.prefs.clear_all().await?;
        Ok(DeleteReport {
            remote_error: sync_id
                .as_ref()
                .map(|_| "no sync endpoint configured".to_string()),
            sync_id,
            tasks_deleted,
            remote_deleted: false,
        })
    }

    // ── Config ─────────────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db.config_get(key).await
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        config::validate(key, value)?;
        self.db.config_set(key, value.trim()).await
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db.config_list().await
    }
}

fn require_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        Err(Error::InvalidInput("task title must not be empty".into()))
    } else {
        Ok(title)
    }
}
