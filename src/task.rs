use serde::Serialize;

/// A to-do item pinned to a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store-assigned id; 0 until the task has been persisted.
    pub id: i64,
    pub title: String,
    pub content: String,
    /// Milliseconds since the epoch. Only the local day it falls on matters.
    pub date: i64,
    pub image_uri: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// A not-yet-persisted task stamped with the current time.
    pub fn new(title: impl Into<String>, content: impl Into<String>, date: i64) -> Self {
        let now = now_millis();
        Self {
            id: 0,
            title: title.into(),
            content: content.into(),
            date,
            image_uri: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_image(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// True when both tasks carry the same user-visible data, ignoring id and
    /// bookkeeping timestamps.
    pub fn same_content(&self, other: &Task) -> bool {
        self.title == other.title
            && self.content == other.content
            && self.date == other.date
            && self.image_uri == other.image_uri
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
