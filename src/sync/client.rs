use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::sync::wire::{PushResponse, RemoteSnapshot, StatusResponse, TaskSnapshot};

/// Longest server error body kept in an error message.
const MAX_DETAIL_CHARS: usize = 300;

/// HTTP client for the remote task store. Each sync id addresses one dataset:
///
/// - `GET {base}/{id}` fetches the snapshot
/// - `POST {base}/{id}` replaces it
/// - `GET {base}/status/{id}` reports whether it exists and when it was written
/// - `DELETE {base}/{id}` removes it
#[derive(Debug, Clone)]
pub struct CloudSyncClient {
    http: Client,
    base: Url,
}

impl CloudSyncClient {
    pub fn new(base: Url) -> Result<Self> {
        Self::with_timeout(base, None)
    }

    pub fn with_timeout(base: Url, timeout: Option<Duration>) -> Result<Self> {
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "sync endpoint must be an http(s) URL, got {base}"
            )));
        }
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http, base })
    }

    pub async fn fetch(&self, sync_id: &str) -> Result<RemoteSnapshot> {
        let url = self.endpoint(&[sync_id])?;
        log::debug!("GET {url}");
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    pub async fn push(&self, sync_id: &str, snapshot: &TaskSnapshot) -> Result<PushResponse> {
        let url = self.endpoint(&[sync_id])?;
        log::debug!("POST {url} ({} tasks)", snapshot.tasks.len());
        let response = self.http.post(url).json(snapshot).send().await?;
        read_json(response).await
    }

    pub async fn status(&self, sync_id: &str) -> Result<StatusResponse> {
        let url = self.endpoint(&["status", sync_id])?;
        log::debug!("GET {url}");
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    pub async fn delete(&self, sync_id: &str) -> Result<()> {
        let url = self.endpoint(&[sync_id])?;
        log::debug!("DELETE {url}");
        let response = self.http.delete(url).send().await?;
        check_status(response).await.map(|_| ())
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("sync endpoint {} cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .text()
        .await
        .ok()
        .map(|body| body.trim().chars().take(MAX_DETAIL_CHARS).collect::<String>())
        .filter(|body| !body.is_empty());
    log::debug!("Sync endpoint answered {status}");
    Err(Error::Server {
        status: status.as_u16(),
        detail,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = check_status(response).await?.text().await?;
    if body.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }
    serde_json::from_str(&body).map_err(|e| {
        log::debug!("Unparseable sync response: {e}");
        Error::EmptyResponse
    })
}
