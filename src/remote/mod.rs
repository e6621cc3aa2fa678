//! Remote file host access
//!
//! The [`RemoteFs`] trait is the seam between the collection lifecycle and the file host
//! that performs offline downloads. [`OpenListClient`] speaks the OpenList/AList HTTP API;
//! tests substitute an in-memory implementation.
//!
//! ## Usage
//!
//! ```no_run
//! use collection_dl::config::RemoteConfig;
//! use collection_dl::remote::{OpenListClient, RemoteFs};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenListClient::new(RemoteConfig {
//!     host: "http://nas.local:5244".into(),
//!     token: "secret".into(),
//!     provider: "qBittorrent".into(),
//!     download_path_template: "/media/anime".into(),
//!     ..Default::default()
//! })?;
//!
//! if client.login().await {
//!     for entry in client.list("/media/anime").await? {
//!         println!("{} ({} bytes)", entry.name, entry.size);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::join_path;

mod openlist;

pub use openlist::OpenListClient;

/// One row of a remote directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Entry name
    pub name: String,
    /// Size in bytes (0 for directories on most hosts)
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// The directory that was listed
    pub path: String,
    /// Last modification time, when reported
    pub modified: Option<DateTime<Utc>>,
    /// Creation time, when reported
    pub created: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// Full path of the entry
    pub fn full_path(&self) -> String {
        join_path(&self.path, &self.name)
    }
}

/// Offline download job state, classified from the host's numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Pending, running, or waiting for upload (codes 0, 1, 5)
    Running,
    /// Finished successfully (code 2)
    Succeeded,
    /// Cancelled on the host (code 3)
    Cancelled,
    /// Failed on the host (code 4)
    Failed,
    /// Errored but retryable (codes above 5)
    Errored,
}

impl JobState {
    /// Classify a raw state code
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => JobState::Succeeded,
            3 => JobState::Cancelled,
            4 => JobState::Failed,
            c if c > 5 => JobState::Errored,
            _ => JobState::Running,
        }
    }
}

/// Status of an offline download job as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    /// Raw state code
    pub state: i64,
    /// Error text reported by the host (empty when none)
    pub error: Option<String>,
    /// Reported progress percentage, if the host included one
    pub progress: Option<u8>,
}

impl JobStatus {
    /// Classified state
    pub fn job_state(&self) -> JobState {
        JobState::from_code(self.state)
    }

    /// Progress percentage, derived from the state when the host omits it
    pub fn progress_percent(&self) -> u8 {
        match self.progress {
            Some(progress) => progress.min(100),
            None => match self.state {
                2 => 100,
                0 => 0,
                _ => 50,
            },
        }
    }

    /// Error text, if non-blank
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// Operations the collection lifecycle needs from a remote file host
///
/// Mutating calls return `Err` when the host rejects them so that callers can decide
/// between propagating (critical calls) and logging (best-effort calls).
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Validate configuration and check the host; never errors
    async fn login(&self) -> bool;

    /// List a directory, sorted by descending size (ties keep the host's order)
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Create a directory; an existing directory is success
    async fn make_directory(&self, path: &str) -> Result<()>;

    /// Rename entries inside `dir`; identity pairs are skipped
    async fn batch_rename(&self, dir: &str, renames: &[(String, String)]) -> Result<()>;

    /// Move entries from `src_dir` into `dst_dir`
    async fn move_items(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()>;

    /// Copy entries from `src_dir` into `dst_dir`
    async fn copy_items(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()>;

    /// Remove entries (files or whole directories) inside `dir`
    async fn remove(&self, dir: &str, names: &[String]) -> Result<()>;

    /// Submit an offline download into `dest`, returning the host's job id
    async fn add_offline_download(&self, uri: &str, dest: &str) -> Result<String>;

    /// Query an offline download job
    async fn query_job(&self, job_id: &str) -> Result<JobStatus>;

    /// Ask the host to retry an errored job
    async fn retry_job(&self, job_id: &str) -> Result<()>;

    /// Delete a job from the host's task list
    async fn delete_job(&self, job_id: &str) -> Result<()>;

    /// Name of the implementation, for logging
    fn name(&self) -> &str;
}
