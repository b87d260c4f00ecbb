use serde::Serialize;

use crate::error::Result;
use crate::storage::repository;
use crate::storage::Database;

const KEY_SYNC_ID: &str = "sync_id";
const KEY_LAST_SYNC_DATE: &str = "last_sync_date";
const KEY_IS_SYNCED: &str = "is_synced";

/// Locally cached sync bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub sync_id: Option<String>,
    pub last_sync_date: Option<String>,
    pub is_synced: bool,
}

/// Sync bookkeeping persisted in the `app_config` table.
#[derive(Clone)]
pub struct SyncPreferences {
    db: Database,
}

impl SyncPreferences {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn sync_id(&self) -> Result<Option<String>> {
        self.db.config_get(KEY_SYNC_ID).await
    }

    pub async fn save_sync_id(&self, id: &str) -> Result<()> {
        self.db.config_set(KEY_SYNC_ID, id).await
    }

    pub async fn last_sync_date(&self) -> Result<Option<String>> {
        self.db.config_get(KEY_LAST_SYNC_DATE).await
    }

    pub async fn is_synced(&self) -> Result<bool> {
        Ok(self.db.config_get(KEY_IS_SYNCED).await?.as_deref() == Some("true"))
    }

    /// Record a confirmed exchange with the server in one write.
    pub async fn mark_synced(&self, sync_id: &str, sync_date: Option<&str>) -> Result<()> {
        let sync_id = sync_id.to_string();
        let sync_date = sync_date.map(|s| s.to_string());
        self.db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                repository::set_config(&tx, KEY_SYNC_ID, &sync_id)?;
                repository::set_config(&tx, KEY_IS_SYNCED, "true")?;
                if let Some(ref date) = sync_date {
                    repository::set_config(&tx, KEY_LAST_SYNC_DATE, date)?;
                }
                tx.commit()
            })
            .await?;
        Ok(())
    }

    /// Cache the server's view of the dataset in one write. A missing date
    /// keeps the stored one.
    pub async fn record_status(&self, synced: bool, last_sync_date: Option<&str>) -> Result<()> {
        let last_sync_date = last_sync_date.map(|s| s.to_string());
        self.db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                repository::set_config(&tx, KEY_IS_SYNCED, if synced { "true" } else { "false" })?;
                if let Some(ref date) = last_sync_date {
                    repository::set_config(&tx, KEY_LAST_SYNC_DATE, date)?;
                }
                tx.commit()
            })
            .await?;
        Ok(())
    }

    pub async fn state(&self) -> Result<SyncState> {
        Ok(self
            .db
            .reader()
            .call(|conn| {
                Ok::<SyncState, rusqlite::Error>(SyncState {
                    sync_id: repository::get_config(conn, KEY_SYNC_ID)?,
                    last_sync_date: repository::get_config(conn, KEY_LAST_SYNC_DATE)?,
                    is_synced: repository::get_config(conn, KEY_IS_SYNCED)?.as_deref()
                        == Some("true"),
                })
            })
            .await?)
    }

    /// Forget the sync id and everything cached about it.
    pub async fn clear_all(&self) -> Result<()> {
        self.db
            .writer()
            .call(|conn| {
                for key in [KEY_SYNC_ID, KEY_LAST_SYNC_DATE, KEY_IS_SYNCED] {
                    repository::delete_config(conn, key)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await?;
        Ok(())
    }
}
