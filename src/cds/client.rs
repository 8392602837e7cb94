//! Async client for the CDS API v2.
//!
//! Retrievals are asynchronous on the server: submitting a request creates a
//! task that moves through `queued` and `running` before it is `completed`
//! (or `failed`). [`CdsClient::retrieve`] submits, polls the task endpoint at
//! a fixed interval, then streams the finished product to the target path.

use crate::cds::credentials::CdsCredentials;
use crate::cds::error::CdsError;
use crate::cds::request::RetrievalRequest;
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Reply of the `status.json` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub info: Vec<String>,
    #[serde(default)]
    pub warning: Vec<String>,
}

/// State of a server-side retrieval task, as returned by the resource and
/// task endpoints.
#[derive(Debug, Clone, Deserialize)]
struct TaskReply {
    state: String,
    request_id: Option<String>,
    location: Option<String>,
    error: Option<TaskError>,
}

#[derive(Debug, Clone, Deserialize)]
struct TaskError {
    message: Option<String>,
    reason: Option<String>,
}

impl TaskReply {
    fn failure_message(&self) -> String {
        match &self.error {
            Some(TaskError {
                message: Some(message),
                reason: Some(reason),
            }) => format!("{message}: {reason}"),
            Some(TaskError {
                message: Some(message),
                ..
            }) => message.clone(),
            Some(TaskError {
                reason: Some(reason),
                ..
            }) => reason.clone(),
            _ => "no error details in reply".to_string(),
        }
    }
}

/// A connected CDS API client.
pub struct CdsClient {
    http: Client,
    credentials: CdsCredentials,
    poll_interval: Duration,
}

impl CdsClient {
    pub fn new(credentials: CdsCredentials) -> Self {
        Self::with_poll_interval(credentials, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(credentials: CdsCredentials, poll_interval: Duration) -> Self {
        Self {
            http: Client::new(),
            credentials,
            poll_interval,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&self.credentials.uid, Some(&self.credentials.key))
    }

    /// Checks the API status, logging the server's info and warning lines.
    ///
    /// A successful reply means the credentials are accepted; the expected
    /// info line is "Welcome to the CDS".
    pub async fn status(&self) -> Result<ApiStatus, CdsError> {
        let url = format!("{}/status.json", self.credentials.url);
        let response = self.get_checked(&url).await?;
        let status: ApiStatus = response
            .json()
            .await
            .map_err(|e| CdsError::MalformedReply(url, e))?;
        for line in &status.info {
            info!("{line}");
        }
        for line in &status.warning {
            warn!("{line}");
        }
        Ok(status)
    }

    /// Submits a retrieval request for `dataset`, waits for the server-side
    /// task to complete, and downloads the product to `target`.
    pub async fn retrieve(
        &self,
        dataset: &str,
        request: &RetrievalRequest,
        target: &Path,
    ) -> Result<(), CdsError> {
        let url = format!("{}/resources/{}", self.credentials.url, dataset);
        info!("Submitting retrieval request to {url}");

        let response = self
            .authorized(self.http.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| CdsError::NetworkRequest(url.clone(), e))?;
        let response = Self::check_status(response, &url)?;
        let reply: TaskReply = response
            .json()
            .await
            .map_err(|e| CdsError::MalformedReply(url.clone(), e))?;

        let completed = self.wait_for_completion(reply, &url).await?;
        let location = completed
            .location
            .ok_or_else(|| CdsError::MissingLocation(url.clone()))?;
        let location = absolute_location(&self.credentials.url, &location);

        self.download(&location, target).await
    }

    /// Polls the task endpoint until the task leaves the queued/running states.
    async fn wait_for_completion(
        &self,
        mut reply: TaskReply,
        submit_url: &str,
    ) -> Result<TaskReply, CdsError> {
        loop {
            match reply.state.as_str() {
                "completed" => return Ok(reply),
                "failed" => {
                    let request_id = reply.request_id.clone().unwrap_or_default();
                    return Err(CdsError::TaskFailed {
                        request_id,
                        message: reply.failure_message(),
                    });
                }
                state => {
                    let request_id = reply
                        .request_id
                        .clone()
                        .ok_or_else(|| CdsError::MissingRequestId(submit_url.to_string()))?;
                    info!("Task {request_id} is {state}, polling again shortly");
                    tokio::time::sleep(self.poll_interval).await;

                    let url = format!("{}/tasks/{}", self.credentials.url, request_id);
                    let response = self.get_checked(&url).await?;
                    reply = response
                        .json()
                        .await
                        .map_err(|e| CdsError::MalformedReply(url, e))?;
                    // Task replies don't repeat the id.
                    reply.request_id.get_or_insert(request_id);
                }
            }
        }
    }

    /// Streams the completed product to a temp file next to `target`, then
    /// persists it, so an interrupted download never leaves a partial file
    /// under the final name.
    async fn download(&self, location: &str, target: &Path) -> Result<(), CdsError> {
        info!("Downloading result from {location}");
        let response = self.get_checked(location).await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);

        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let temp = NamedTempFile::new_in(dir)
            .map_err(|e| CdsError::DownloadIo(target.to_path_buf(), e))?;
        let reopened = temp
            .reopen()
            .map_err(|e| CdsError::DownloadIo(target.to_path_buf(), e))?;
        let mut file = tokio::fs::File::from_std(reopened);

        let bytes = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| CdsError::DownloadIo(target.to_path_buf(), e))?;
        file.flush()
            .await
            .map_err(|e| CdsError::DownloadIo(target.to_path_buf(), e))?;
        temp.persist(target)
            .map_err(|e| CdsError::Persist(target.to_path_buf(), e))?;

        info!("Downloaded {bytes} bytes to {}", target.display());
        Ok(())
    }

    async fn get_checked(&self, url: &str) -> Result<Response, CdsError> {
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|e| CdsError::NetworkRequest(url.to_string(), e))?;
        Self::check_status(response, url)
    }

    fn check_status(response: Response, url: &str) -> Result<Response, CdsError> {
        match response.error_for_status() {
            Ok(resp) => Ok(resp),
            Err(e) => {
                if let Some(status) = e.status() {
                    Err(CdsError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    })
                } else {
                    Err(CdsError::NetworkRequest(url.to_string(), e))
                }
            }
        }
    }
}

/// The task reply's download location may be relative to the API root.
fn absolute_location(api_url: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        format!(
            "{}/{}",
            api_url.trim_end_matches('/'),
            location.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_queued_task_reply() {
        let reply: TaskReply = serde_json::from_str(
            r#"{"state": "queued", "request_id": "7f1e-43a2"}"#,
        )
        .unwrap();
        assert_eq!(reply.state, "queued");
        assert_eq!(reply.request_id.as_deref(), Some("7f1e-43a2"));
        assert!(reply.location.is_none());
    }

    #[test]
    fn parses_a_completed_task_reply() {
        let reply: TaskReply = serde_json::from_str(
            r#"{"state": "completed", "location": "https://download.cds.example/result.nc"}"#,
        )
        .unwrap();
        assert_eq!(reply.state, "completed");
        assert_eq!(
            reply.location.as_deref(),
            Some("https://download.cds.example/result.nc")
        );
    }

    #[test]
    fn failure_message_combines_message_and_reason() {
        let reply: TaskReply = serde_json::from_str(
            r#"{"state": "failed",
                "error": {"message": "the request you have submitted is not valid",
                          "reason": "date range too large"}}"#,
        )
        .unwrap();
        assert_eq!(
            reply.failure_message(),
            "the request you have submitted is not valid: date range too large"
        );

        let bare: TaskReply = serde_json::from_str(r#"{"state": "failed"}"#).unwrap();
        assert_eq!(bare.failure_message(), "no error details in reply");
    }

    #[test]
    fn absolute_location_joins_relative_paths() {
        let api = "https://cds.climate.copernicus.eu/api/v2";
        assert_eq!(
            absolute_location(api, "https://download.example/x.nc"),
            "https://download.example/x.nc"
        );
        assert_eq!(
            absolute_location(api, "/download/x.nc"),
            "https://cds.climate.copernicus.eu/api/v2/download/x.nc"
        );
        assert_eq!(
            absolute_location(api, "download/x.nc"),
            "https://cds.climate.copernicus.eu/api/v2/download/x.nc"
        );
    }

    #[test]
    fn api_status_defaults_to_empty_lists() {
        let status: ApiStatus = serde_json::from_str("{}").unwrap();
        assert!(status.info.is_empty());
        assert!(status.warning.is_empty());

        let status: ApiStatus =
            serde_json::from_str(r#"{"info": ["Welcome to the CDS"], "warning": []}"#).unwrap();
        assert_eq!(status.info, ["Welcome to the CDS"]);
    }
}
