//! OpenList/AList HTTP client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{JobStatus, RemoteEntry, RemoteFs};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::utils::normalize_remote_path;

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl Envelope {
    fn into_data(self) -> Result<serde_json::Value> {
        if self.code == 200 {
            Ok(self.data)
        } else {
            Err(Error::Remote {
                code: self.code,
                message: self.message,
            })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListData {
    #[serde(default)]
    content: Option<Vec<ListedEntry>>,
}

#[derive(Debug, Deserialize)]
struct ListedEntry {
    name: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    is_dir: bool,
    #[serde(default)]
    modified: Option<String>,
    #[serde(default)]
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OfflineDownloadData {
    #[serde(default)]
    tasks: Vec<SubmittedTask>,
}

#[derive(Debug, Deserialize)]
struct SubmittedTask {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobInfo {
    #[serde(default)]
    state: i64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RenameObject<'a> {
    src_name: &'a str,
    new_name: &'a str,
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Client for an OpenList/AList file host
///
/// Every call waits [`RemoteConfig::min_call_interval`] first. The wait happens while
/// holding a shared lock, so concurrent callers are spaced out rather than bursting.
pub struct OpenListClient {
    http: reqwest::Client,
    config: RemoteConfig,
    pacer: Mutex<()>,
}

impl OpenListClient {
    /// Create a client for the configured host
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("collection-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config,
            pacer: Mutex::new(()),
        })
    }

    fn request(&self, method: Method, action: &str) -> RequestBuilder {
        let url = format!("{}/api/{}", self.config.host.trim_end_matches('/'), action);
        self.http
            .request(method, url)
            .header(AUTHORIZATION, &self.config.token)
    }

    async fn pace(&self) {
        let _guard = self.pacer.lock().await;
        if !self.config.min_call_interval.is_zero() {
            tokio::time::sleep(self.config.min_call_interval).await;
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Envelope> {
        self.pace().await;
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote {
                code: i64::from(status.as_u16()),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }
        Ok(response.json::<Envelope>().await?)
    }

    async fn call(&self, request: RequestBuilder) -> Result<serde_json::Value> {
        self.send(request).await?.into_data()
    }

    fn batch_request(&self, action: &str) -> RequestBuilder {
        self.request(Method::POST, action)
            .timeout(self.config.batch_timeout)
    }

    fn config_problem(&self) -> Option<&'static str> {
        if self.config.host.trim().is_empty() {
            Some("host is not configured")
        } else if self.config.token.trim().is_empty() {
            Some("token is not configured")
        } else if self.config.provider.trim().is_empty() {
            Some("offline download provider is not configured")
        } else {
            None
        }
    }
}

#[async_trait]
impl RemoteFs for OpenListClient {
    async fn login(&self) -> bool {
        if let Some(problem) = self.config_problem() {
            tracing::warn!(problem, "remote host login skipped");
            return false;
        }
        match self.send(self.request(Method::GET, "me")).await {
            Ok(envelope) if envelope.code == 200 => true,
            Ok(envelope) => {
                tracing::warn!(
                    code = envelope.code,
                    message = %envelope.message,
                    "remote host rejected login"
                );
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote host login failed");
                false
            }
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let path = normalize_remote_path(path);
        let body = json!({
            "path": path,
            "page": 1,
            "per_page": 0,
            "refresh": false,
        });
        let data = self
            .call(self.request(Method::POST, "fs/list").json(&body))
            .await?;

        let listed: ListData = if data.is_null() {
            ListData::default()
        } else {
            serde_json::from_value(data)?
        };

        let mut entries: Vec<RemoteEntry> = listed
            .content
            .unwrap_or_default()
            .into_iter()
            .map(|e| RemoteEntry {
                name: e.name,
                size: u64::try_from(e.size).unwrap_or(0),
                is_dir: e.is_dir,
                path: path.clone(),
                modified: parse_timestamp(e.modified),
                created: parse_timestamp(e.created),
            })
            .collect();
        // sort_by is stable, so equal sizes keep the host's order
        entries.sort_by(|a, b| b.size.cmp(&a.size));

        tracing::debug!(path = %path, count = entries.len(), "listed remote directory");
        Ok(entries)
    }

    async fn make_directory(&self, path: &str) -> Result<()> {
        let path = normalize_remote_path(path);
        let envelope = self
            .send(
                self.request(Method::POST, "fs/mkdir")
                    .json(&json!({ "path": path })),
            )
            .await?;
        match envelope.code {
            200 => {
                tracing::debug!(path = %path, "created remote directory");
                Ok(())
            }
            400 => {
                tracing::debug!(path = %path, "remote directory already exists");
                Ok(())
            }
            code => Err(Error::Remote {
                code,
                message: envelope.message,
            }),
        }
    }

    async fn batch_rename(&self, dir: &str, renames: &[(String, String)]) -> Result<()> {
        let dir = normalize_remote_path(dir);
        if renames.is_empty() {
            tracing::debug!(dir = %dir, "no renames requested");
            return Ok(());
        }

        let mut objects = Vec::with_capacity(renames.len());
        for (old, new) in renames {
            if old == new {
                tracing::debug!(dir = %dir, name = %old, "skipping identity rename");
            } else {
                objects.push(RenameObject {
                    src_name: old,
                    new_name: new,
                });
            }
        }
        if objects.is_empty() {
            tracing::debug!(dir = %dir, "all renames are identity, nothing to do");
            return Ok(());
        }

        let count = objects.len();
        self.call(self.batch_request("fs/batch_rename").json(&json!({
            "src_dir": dir,
            "rename_objects": objects,
        })))
        .await?;
        tracing::debug!(dir = %dir, count, "renamed remote entries");
        Ok(())
    }

    async fn move_items(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
        let src_dir = normalize_remote_path(src_dir);
        let dst_dir = normalize_remote_path(dst_dir);
        self.call(self.batch_request("fs/move").json(&json!({
            "src_dir": src_dir,
            "dst_dir": dst_dir,
            "names": names,
        })))
        .await?;
        tracing::debug!(src = %src_dir, dst = %dst_dir, count = names.len(), "moved remote entries");
        Ok(())
    }

    async fn copy_items(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
        let src_dir = normalize_remote_path(src_dir);
        let dst_dir = normalize_remote_path(dst_dir);
        self.call(self.batch_request("fs/copy").json(&json!({
            "src_dir": src_dir,
            "dst_dir": dst_dir,
            "names": names,
        })))
        .await?;
        tracing::debug!(src = %src_dir, dst = %dst_dir, count = names.len(), "copied remote entries");
        Ok(())
    }

    async fn remove(&self, dir: &str, names: &[String]) -> Result<()> {
        let dir = normalize_remote_path(dir);
        self.call(
            self.request(Method::POST, "fs/remove")
                .json(&json!({ "dir": dir, "names": names })),
        )
        .await?;
        tracing::debug!(dir = %dir, count = names.len(), "removed remote entries");
        Ok(())
    }

    async fn add_offline_download(&self, uri: &str, dest: &str) -> Result<String> {
        let dest = normalize_remote_path(dest);
        if let Err(e) = self.make_directory(&dest).await {
            tracing::warn!(dest = %dest, error = %e, "could not create offline download directory");
        }

        let data = self
            .call(
                self.request(Method::POST, "fs/add_offline_download")
                    .json(&json!({
                        "path": dest,
                        "urls": [uri],
                        "tool": self.config.provider,
                        "delete_policy": "delete_on_upload_succeed",
                    })),
            )
            .await?;
        let submitted: OfflineDownloadData = serde_json::from_value(data)?;
        let job_id = submitted
            .tasks
            .into_iter()
            .next()
            .map(|t| t.id)
            .ok_or_else(|| Error::Remote {
                code: 200,
                message: "offline download response contained no task".to_string(),
            })?;

        tracing::info!(dest = %dest, job_id = %job_id, "submitted offline download");
        Ok(job_id)
    }

    async fn query_job(&self, job_id: &str) -> Result<JobStatus> {
        let data = self
            .call(
                self.request(Method::POST, "task/offline_download/info")
                    .query(&[("tid", job_id)]),
            )
            .await?;
        let info: JobInfo = serde_json::from_value(data)?;
        Ok(JobStatus {
            state: info.state,
            error: info.error,
            progress: info
                .progress
                .map(|p| p.clamp(0.0, 100.0).round() as u8),
        })
    }

    async fn retry_job(&self, job_id: &str) -> Result<()> {
        self.call(
            self.request(Method::POST, "task/offline_download/retry")
                .query(&[("tid", job_id)]),
        )
        .await?;
        tracing::debug!(job_id, "retry requested for offline download");
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.call(
            self.request(Method::POST, "task/offline_download/delete_some")
                .json(&json!([job_id])),
        )
        .await?;
        tracing::debug!(job_id, "deleted offline download job");
        Ok(())
    }

    fn name(&self) -> &str {
        "openlist"
    }
}
