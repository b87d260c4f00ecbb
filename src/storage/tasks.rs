use std::sync::Arc;

use chrono::TimeZone;
use tokio::sync::watch;

use crate::date_util::DateRangeCalculator;
use crate::error::{Error, Result};
use crate::storage::repository;
use crate::storage::Database;
use crate::task::{now_millis, Task};

/// The persistent task collection.
///
/// Every mutation bumps a change counter so that open [`TaskSubscription`]s
/// re-run their query. Clones share the same database and counter.
#[derive(Clone)]
pub struct TaskStore {
    db: Database,
    changes: Arc<watch::Sender<u64>>,
}

#[derive(Debug, Clone, Copy)]
enum RangeQuery {
    /// One day, in creation order.
    Day { start: i64, end: i64 },
    /// Any span, in date order.
    Span { start: i64, end: i64 },
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            db,
            changes: Arc::new(changes),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Insert or replace by id (0 allocates a fresh id). Returns the stored id.
    pub async fn insert(&self, task: Task) -> Result<i64> {
        let id = self
            .db
            .writer()
            .call(move |conn| repository::insert_task(conn, &task))
            .await?;
        log::debug!("Stored task {id}");
        self.notify();
        Ok(id)
    }

    pub async fn insert_batch(&self, tasks: Vec<Task>) -> Result<Vec<i64>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self
            .db
            .writer()
            .call(move |conn| repository::insert_tasks(conn, &tasks))
            .await?;
        log::debug!("Stored {} tasks", ids.len());
        self.notify();
        Ok(ids)
    }

    /// Overwrite the task with `task.id`, refreshing `updated_at`. Returns
    /// false when the id is unknown.
    pub async fn update(&self, mut task: Task) -> Result<bool> {
        task.updated_at = now_millis();
        let updated = self
            .db
            .writer()
            .call(move |conn| repository::update_task(conn, &task))
            .await?;
        if updated {
            self.notify();
        }
        Ok(updated)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let deleted = self
            .db
            .writer()
            .call(move |conn| repository::delete_task(conn, id))
            .await?;
        if deleted {
            log::debug!("Deleted task {id}");
            self.notify();
        }
        Ok(deleted)
    }

    pub async fn delete_all(&self) -> Result<usize> {
        let deleted = self
            .db
            .writer()
            .call(|conn| repository::delete_all_tasks(conn))
            .await?;
        log::debug!("Deleted all {deleted} tasks");
        self.notify();
        Ok(deleted)
    }

    /// Delete everything and store `tasks` instead, atomically. Returns the
    /// stored tasks with their new ids.
    pub async fn replace_all(&self, tasks: Vec<Task>) -> Result<Vec<Task>> {
        let stored = self
            .db
            .writer()
            .call(move |conn| repository::replace_all_tasks(conn, &tasks))
            .await?;
        log::debug!("Replaced task set with {} tasks", stored.len());
        self.notify();
        Ok(stored)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Task>> {
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::get_task(conn, id))
            .await?)
    }

    /// Every task, ascending by date.
    pub async fn all(&self) -> Result<Vec<Task>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_tasks(conn))
            .await?)
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::count_tasks(conn))
            .await?)
    }

    pub async fn tasks_for_day<Tz: TimeZone>(
        &self,
        calc: &DateRangeCalculator<Tz>,
        timestamp: i64,
    ) -> Result<Vec<Task>> {
        let (start, end) = calc.day_range(timestamp);
        self.run(RangeQuery::Day { start, end }).await
    }

    pub async fn tasks_for_month<Tz: TimeZone>(
        &self,
        calc: &DateRangeCalculator<Tz>,
        year: i32,
        month0: u32,
    ) -> Result<Vec<Task>> {
        let (start, end) = calc.month_range(year, month0);
        self.run(RangeQuery::Span { start, end }).await
    }

    pub async fn tasks_between(&self, start: i64, end: i64) -> Result<Vec<Task>> {
        self.run(RangeQuery::Span { start, end }).await
    }

    /// Follow a day's tasks as they change.
    pub fn observe_day<Tz: TimeZone>(
        &self,
        calc: &DateRangeCalculator<Tz>,
        timestamp: i64,
    ) -> TaskSubscription {
        let (start, end) = calc.day_range(timestamp);
        self.subscribe(RangeQuery::Day { start, end })
    }

    /// Follow a month's tasks as they change.
    pub fn observe_month<Tz: TimeZone>(
        &self,
        calc: &DateRangeCalculator<Tz>,
        year: i32,
        month0: u32,
    ) -> TaskSubscription {
        let (start, end) = calc.month_range(year, month0);
        self.subscribe(RangeQuery::Span { start, end })
    }

    fn subscribe(&self, query: RangeQuery) -> TaskSubscription {
        TaskSubscription {
            store: self.clone(),
            query,
            changes: self.changes.subscribe(),
            primed: false,
        }
    }

    async fn run(&self, query: RangeQuery) -> Result<Vec<Task>> {
        let tasks = self
            .db
            .reader()
            .call(move |conn| match query {
                RangeQuery::Day { start, end } => repository::tasks_for_day(conn, start, end),
                RangeQuery::Span { start, end } => repository::tasks_between(conn, start, end),
            })
            .await?;
        Ok(tasks)
    }
}

/// A live range query. Each [`next`](TaskSubscription::next) yields a full
/// snapshot: immediately on the first call, afterwards once the task set has
/// changed. Bursts of changes between two calls collapse into one snapshot.
/// Drop the subscription to stop observing.
pub struct TaskSubscription {
    store: TaskStore,
    query: RangeQuery,
    changes: watch::Receiver<u64>,
    primed: bool,
}

impl TaskSubscription {
    pub async fn next(&mut self) -> Result<Vec<Task>> {
        if self.primed {
            self.changes
                .changed()
                .await
                .map_err(|_| Error::Database("task store closed".into()))?;
        } else {
            self.changes.borrow_and_update();
            self.primed = true;
        }
        self.store.run(self.query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    async fn store() -> TaskStore {
        TaskStore::new(Database::open_memory().await.unwrap())
    }

    fn utc() -> DateRangeCalculator<Utc> {
        DateRangeCalculator::new(Utc)
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = store().await;
        let calc = utc();
        let date = calc.timestamp_for_date(2024, 2, 10).unwrap();

        let id = store.insert(Task::new("Pay rent", "", date)).await.unwrap();
        let mut task = store.get(id).await.unwrap().unwrap();
        assert_eq!(task.title, "Pay rent");

        let before = task.updated_at;
        task.updated_at = 0;
        task.content = "transfer by friday".into();
        assert!(store.update(task).await.unwrap());

        let task = store.get(id).await.unwrap().unwrap();
        assert_eq!(task.content, "transfer by friday");
        assert!(task.updated_at >= before);
    }

    #[tokio::test]
    async fn test_day_and_month_queries() {
        let store = store().await;
        let calc = utc();
        let march_10 = calc.timestamp_for_date(2024, 2, 10).unwrap();
        let march_31 = calc.timestamp_for_date(2024, 2, 31).unwrap();
        let april_1 = calc.timestamp_for_date(2024, 3, 1).unwrap();

        store
            .insert_batch(vec![
                Task::new("morning", "", march_10 + 8 * 3_600_000),
                Task::new("evening", "", march_10 + 20 * 3_600_000),
                Task::new("month end", "", march_31 + 86_400_000 - 1),
                Task::new("april", "", april_1),
            ])
            .await
            .unwrap();

        let day = store.tasks_for_day(&calc, march_10 + 12 * 3_600_000).await.unwrap();
        assert_eq!(day.len(), 2);

        let month = store.tasks_for_month(&calc, 2024, 2).await.unwrap();
        let titles: Vec<&str> = month.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["morning", "evening", "month end"]);
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_delete_operations() {
        let store = store().await;
        let ids = store
            .insert_batch(vec![Task::new("a", "", 1), Task::new("b", "", 2)])
            .await
            .unwrap();

        assert!(store.delete_by_id(ids[0]).await.unwrap());
        assert!(!store.delete_by_id(ids[0]).await.unwrap());
        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_receives_snapshots() {
        let store = store().await;
        let calc = utc();
        let day = calc.timestamp_for_date(2024, 2, 10).unwrap();

        let mut sub = store.observe_month(&calc, 2024, 2);
        assert!(sub.next().await.unwrap().is_empty());

        store.insert(Task::new("first", "", day)).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("snapshot after insert")
            .unwrap();
        assert_eq!(snapshot.len(), 1);

        // Two writes before the next poll collapse into one full snapshot
        store.insert(Task::new("second", "", day)).await.unwrap();
        store.insert(Task::new("third", "", day)).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("snapshot after burst")
            .unwrap();
        assert_eq!(snapshot.len(), 3);

        // Nothing changed: the subscription waits
        let idle = tokio::time::timeout(Duration::from_millis(100), sub.next()).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn test_day_subscription_sees_deletes() {
        let store = store().await;
        let calc = utc();
        let day = calc.timestamp_for_date(2024, 2, 10).unwrap();
        let id = store.insert(Task::new("gone soon", "", day)).await.unwrap();

        let mut sub = store.observe_day(&calc, day);
        assert_eq!(sub.next().await.unwrap().len(), 1);

        store.delete_by_id(id).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("snapshot after delete")
            .unwrap();
        assert!(snapshot.is_empty());
    }
}
