use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::storage::Database;
use crate::sync::CloudSyncClient;

/// Environment variable overriding the stored sync endpoint.
pub const ENDPOINT_ENV: &str = "GLASSCAL_SYNC_URL";
pub const KEY_SYNC_ENDPOINT: &str = "sync_endpoint";
pub const KEY_HTTP_TIMEOUT: &str = "http_timeout_secs";

/// Where the sync endpoint setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Flag,
    Environment,
    Stored,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub endpoint: Url,
    pub endpoint_source: Source,
    pub timeout: Option<Duration>,
}

impl SyncSettings {
    /// Resolve settings from, in order: the command-line flag, the
    /// environment, then `app_config`.
    pub async fn resolve(db: &Database, flag: Option<&str>) -> Result<Self> {
        let env = std::env::var(ENDPOINT_ENV).ok();
        let stored = db.config_get(KEY_SYNC_ENDPOINT).await?;
        let (raw, endpoint_source) = pick_endpoint(flag, env.as_deref(), stored.as_deref())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no sync endpoint configured. Run: glasscal config set {KEY_SYNC_ENDPOINT} <URL> \
                     (or set {ENDPOINT_ENV})"
                ))
            })?;
        let endpoint = parse_endpoint(raw)?;

        let timeout = match db.config_get(KEY_HTTP_TIMEOUT).await? {
            Some(raw) => Some(parse_timeout(&raw)?),
            None => None,
        };

        log::debug!("Sync endpoint {endpoint} ({endpoint_source:?})");
        Ok(Self {
            endpoint,
            endpoint_source,
            timeout,
        })
    }

    pub fn client(&self) -> Result<CloudSyncClient> {
        CloudSyncClient::with_timeout(self.endpoint.clone(), self.timeout)
    }
}

fn pick_endpoint<'a>(
    flag: Option<&'a str>,
    env: Option<&'a str>,
    stored: Option<&'a str>,
) -> Option<(&'a str, Source)> {
    let non_blank = |s: &&str| !s.trim().is_empty();
    flag.filter(non_blank)
        .map(|s| (s, Source::Flag))
        .or_else(|| env.filter(non_blank).map(|s| (s, Source::Environment)))
        .or_else(|| stored.filter(non_blank).map(|s| (s, Source::Stored)))
}

pub fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("invalid sync endpoint {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "sync endpoint must use http or https, got {}",
            url.scheme()
        )));
    }
    Ok(url)
}

pub fn parse_timeout(raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{KEY_HTTP_TIMEOUT} must be a positive number of seconds, got {raw:?}"
        ))),
    }
}

/// Reject values for known keys that would fail later at sync time.
pub fn validate(key: &str, value: &str) -> Result<()> {
    match key {
        KEY_SYNC_ENDPOINT => parse_endpoint(value).map(|_| ()),
        KEY_HTTP_TIMEOUT => parse_timeout(value).map(|_| ()),
        "sync_id" | "last_sync_date" | "is_synced" => Err(Error::Config(format!(
            "{key} is managed by the sync commands"
        ))),
        _ => Ok(()),
    }
}
