use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::task::Task;

const TASK_COLUMNS: &str = "id, title, content, date, image_uri, created_at, updated_at";

// ── Tasks ──────────────────────────────────────────────────────────

fn task_from_row(row: &Row<'_>) -> Result<Task, rusqlite::Error> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        date: row.get(3)?,
        image_uri: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Insert a task. An id of 0 allocates a fresh id; any other id replaces the
/// row with that id. Returns the stored id.
pub fn insert_task(conn: &Connection, task: &Task) -> Result<i64, rusqlite::Error> {
    if task.id == 0 {
        conn.execute(
            "INSERT INTO tasks (title, content, date, image_uri, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                task.title,
                task.content,
                task.date,
                task.image_uri,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    } else {
        conn.execute(
            "INSERT OR REPLACE INTO tasks (id, title, content, date, image_uri, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                task.title,
                task.content,
                task.date,
                task.image_uri,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(task.id)
    }
}

/// Insert a batch atomically, returning the stored ids in input order.
pub fn insert_tasks(conn: &mut Connection, tasks: &[Task]) -> Result<Vec<i64>, rusqlite::Error> {
    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(tasks.len());
    for task in tasks {
        ids.push(insert_task(&tx, task)?);
    }
    tx.commit()?;
    Ok(ids)
}

/// Overwrite an existing task by id. Returns false when no row matched.
pub fn update_task(conn: &Connection, task: &Task) -> Result<bool, rusqlite::Error> {
    let changed = conn.execute(
        "UPDATE tasks SET title = ?2, content = ?3, date = ?4, image_uri = ?5,
            created_at = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            task.id,
            task.title,
            task.content,
            task.date,
            task.image_uri,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_task(conn: &Connection, id: i64) -> Result<bool, rusqlite::Error> {
    let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn delete_all_tasks(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute("DELETE FROM tasks", [])
}

pub fn get_task(conn: &Connection, id: i64) -> Result<Option<Task>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        task_from_row,
    )
    .optional()
}

pub fn list_tasks(conn: &Connection) -> Result<Vec<Task>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks ORDER BY date, created_at, id"
    ))?;
    let rows = stmt.query_map([], task_from_row)?;
    rows.collect()
}

/// Tasks of a single day, in the order they were created.
pub fn tasks_for_day(conn: &Connection, start: i64, end: i64) -> Result<Vec<Task>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE date >= ?1 AND date <= ?2
         ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![start, end], task_from_row)?;
    rows.collect()
}

/// Tasks in an inclusive timestamp range, ascending by date.
pub fn tasks_between(conn: &Connection, start: i64, end: i64) -> Result<Vec<Task>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE date >= ?1 AND date <= ?2
         ORDER BY date, created_at, id"
    ))?;
    let rows = stmt.query_map(params![start, end], task_from_row)?;
    rows.collect()
}

pub fn count_tasks(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
}

/// Drop every task and store `tasks` in their place, in one transaction.
/// Returns the stored tasks with their new ids.
pub fn replace_all_tasks(conn: &mut Connection, tasks: &[Task]) -> Result<Vec<Task>, rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM tasks", [])?;
    let mut stored = Vec::with_capacity(tasks.len());
    for task in tasks {
        let mut task = task.clone();
        task.id = insert_task(&tx, &task)?;
        stored.push(task);
    }
    tx.commit()?;
    Ok(stored)
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_config(conn: &Connection, key: &str) -> Result<bool, rusqlite::Error> {
    let changed = conn.execute("DELETE FROM app_config WHERE key = ?1", params![key])?;
    Ok(changed > 0)
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn task(title: &str, date: i64, created_at: i64) -> Task {
        Task {
            id: 0,
            title: title.to_string(),
            content: String::new(),
            date,
            image_uri: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "sync_endpoint", "https://sync.example.com/")?;
                let val = get_config(conn, "sync_endpoint")?;
                assert_eq!(val, Some("https://sync.example.com/".to_string()));

                let missing = get_config(conn, "nonexistent")?;
                assert_eq!(missing, None);

                assert!(delete_config(conn, "sync_endpoint")?);
                assert!(!delete_config(conn, "sync_endpoint")?);
                assert!(list_config(conn)?.is_empty());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_assigns_and_replaces_ids() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let id = insert_task(conn, &task("Groceries", 100, 1))?;
                assert!(id > 0);

                let mut replacement = task("Groceries and wine", 200, 1);
                replacement.id = id;
                assert_eq!(insert_task(conn, &replacement)?, id);

                let stored = get_task(conn, id)?.unwrap();
                assert_eq!(stored.title, "Groceries and wine");
                assert_eq!(stored.date, 200);
                assert_eq!(count_tasks(conn)?, 1);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let id = insert_task(conn, &task("Call mom", 100, 1))?;
                let mut stored = get_task(conn, id)?.unwrap();
                stored.content = "before dinner".into();
                assert!(update_task(conn, &stored)?);

                let mut ghost = stored.clone();
                ghost.id = 9999;
                assert!(!update_task(conn, &ghost)?);

                assert_eq!(get_task(conn, id)?.unwrap().content, "before dinner");
                assert!(delete_task(conn, id)?);
                assert!(!delete_task(conn, id)?);
                assert!(get_task(conn, id)?.is_none());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_range_queries_ordering() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                insert_tasks(
                    conn,
                    &[
                        task("late created", 150, 30),
                        task("early created", 170, 10),
                        task("outside", 500, 5),
                        task("same date later", 150, 40),
                    ],
                )?;

                let day: Vec<String> = tasks_for_day(conn, 100, 199)?
                    .into_iter()
                    .map(|t| t.title)
                    .collect();
                assert_eq!(day, vec!["early created", "late created", "same date later"]);

                let month: Vec<String> = tasks_between(conn, 100, 199)?
                    .into_iter()
                    .map(|t| t.title)
                    .collect();
                assert_eq!(month, vec!["late created", "same date later", "early created"]);

                // Bounds are inclusive
                assert_eq!(tasks_between(conn, 150, 150)?.len(), 2);
                assert_eq!(tasks_between(conn, 500, 500)?.len(), 1);
                assert_eq!(list_tasks(conn)?.len(), 4);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_replace_all_tasks() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                insert_tasks(conn, &[task("old a", 1, 1), task("old b", 2, 2)])?;

                let stored = replace_all_tasks(conn, &[task("new", 3, 3)])?;
                assert_eq!(stored.len(), 1);
                assert!(stored[0].id > 0);

                let all = list_tasks(conn)?;
                assert_eq!(all.len(), 1);
                assert_eq!(all[0], stored[0]);

                assert!(replace_all_tasks(conn, &[])?.is_empty());
                assert_eq!(count_tasks(conn)?, 0);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
