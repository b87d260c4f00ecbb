//! JSON bodies exchanged with the sync endpoint.
//!
//! Every task field is nullable on the wire. Outgoing records always carry a
//! value; incoming ones are validated one at a time so a single bad record
//! cannot spoil a whole pull.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::Task;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub date: Option<i64>,
    pub image_uri: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl TaskRecord {
    /// Wire form of a local task. Unset timestamps are sent as `now`.
    pub fn from_task(task: &Task, now: i64) -> Self {
        Self {
            id: task.is_persisted().then_some(task.id),
            title: Some(task.title.clone()),
            content: Some(task.content.clone()),
            date: Some(task.date),
            image_uri: task.image_uri.clone(),
            created_at: Some(if task.created_at > 0 { task.created_at } else { now }),
            updated_at: Some(if task.updated_at > 0 { task.updated_at } else { now }),
        }
    }

    /// Decode one element of a fetched `tasks` array.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::RecordConversion(e.to_string()))
    }

    /// Local, unpersisted task for this record. Needs a non-blank title and a
    /// date; missing content becomes empty and missing timestamps become `now`.
    pub fn into_task(self, now: i64) -> Result<Task> {
        let title = match self.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(Error::RecordConversion("missing title".into())),
        };
        let date = self
            .date
            .ok_or_else(|| Error::RecordConversion(format!("task \"{title}\" has no date")))?;
        Ok(Task {
            id: 0,
            title,
            content: self.content.unwrap_or_default(),
            date,
            image_uri: self.image_uri,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

/// Body of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub tasks: Vec<TaskRecord>,
}

impl TaskSnapshot {
    pub fn from_tasks(tasks: &[Task], now: i64) -> Self {
        Self {
            tasks: tasks.iter().map(|t| TaskRecord::from_task(t, now)).collect(),
        }
    }
}

/// Body of a fetch, with records left undecoded. The `tasks` array is
/// required: a body without one is not a snapshot, even an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSnapshot {
    pub tasks: Vec<serde_json::Value>,
}

impl RemoteSnapshot {
    pub fn into_records(self) -> Vec<serde_json::Value> {
        self.tasks
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sync_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub last_sync_date: Option<String>,
}
