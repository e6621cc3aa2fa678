//! Core types for collection-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::TaskError;
use crate::tree::FileNode;

/// Unique identifier for a collection task
///
/// A v4 UUID rendered as 32 lowercase hex digits without hyphens.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random TaskId
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collection task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Offline download running on the remote host
    Downloading,
    /// Download finished and the file tree is available for review
    Completed,
    /// Rename/move/delete sequence in progress
    Organizing,
    /// Files are in their final location
    Finished,
    /// Terminal failure, see the task's error
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl TaskStatus {
    /// Lowercase name used in logs and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Downloading => "downloading",
            TaskStatus::Completed => "completed",
            TaskStatus::Organizing => "organizing",
            TaskStatus::Finished => "finished",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Downloading, Downloading)
                | (Downloading, Completed)
                | (Downloading, Failed)
                | (Downloading, Cancelled)
                | (Completed, Organizing)
                | (Completed, Cancelled)
                | (Organizing, Finished)
                | (Organizing, Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription context a collection is acquired for
///
/// Supplies the naming inputs for the resolver, the filename filters, and the
/// destination directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Series title used in canonical file names
    pub title: String,

    /// Season number (default: 1)
    #[serde(default = "default_season")]
    pub season: u32,

    /// Release group the subscription is pinned to, if any
    #[serde(default)]
    pub subgroup: Option<String>,

    /// Destination directory on the remote host
    #[serde(default)]
    pub download_path: Option<String>,

    /// Regexes every accepted file name must contain a match for
    #[serde(default)]
    pub match_patterns: Vec<String>,

    /// Regexes that exclude a file name
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Whether the shared global exclude list applies
    #[serde(default)]
    pub global_exclude: bool,

    /// Whether a notification is sent when the collection finishes
    #[serde(default)]
    pub notify: bool,

    /// Canonical name template, e.g. "{title} S{season}E{episode}"
    #[serde(default)]
    pub rename_template: Option<String>,
}

fn default_season() -> u32 {
    1
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            title: String::new(),
            season: default_season(),
            subgroup: None,
            download_path: None,
            match_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            global_exclude: false,
            notify: false,
            rename_template: None,
        }
    }
}

/// One in-flight or recently finished collection acquisition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionTask {
    /// Task identifier
    pub id: TaskId,

    /// Magnet URI submitted to the remote host
    pub magnet_uri: String,

    /// Working directory the offline download writes into
    pub temp_path: String,

    /// Destination directory for organized files
    pub final_path: String,

    /// Offline download job id on the remote host
    pub remote_job_id: Option<String>,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Download progress percentage (0 to 100), never decreases while downloading
    pub progress: u8,

    /// Tree of the downloaded release, built once when the download completes
    pub file_tree: Option<Vec<FileNode>>,

    /// Keep the release's directory layout under the final path
    pub keep_directory_structure: bool,

    /// Original directory path -> replacement directory name
    pub directory_rename_overrides: BTreeMap<String, String>,

    /// Last failure message, only present when failed
    pub error: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// Automatic remote job retries already issued
    pub retry_count: u32,

    /// Subscription the collection belongs to
    pub subscription: Subscription,
}

impl CollectionTask {
    /// Create a task in the downloading state
    pub fn new(
        id: TaskId,
        magnet_uri: impl Into<String>,
        temp_path: impl Into<String>,
        final_path: impl Into<String>,
        subscription: Subscription,
    ) -> Self {
        Self {
            id,
            magnet_uri: magnet_uri.into(),
            temp_path: temp_path.into(),
            final_path: final_path.into(),
            remote_job_id: None,
            status: TaskStatus::Downloading,
            progress: 0,
            file_tree: None,
            keep_directory_structure: false,
            directory_rename_overrides: BTreeMap::new(),
            error: None,
            created_at: Utc::now(),
            retry_count: 0,
            subscription,
        }
    }

    /// Move to `next`, rejecting edges the lifecycle does not allow
    pub fn transition(&mut self, next: TaskStatus, operation: &str) -> Result<(), TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidState {
                id: self.id.clone(),
                operation: operation.to_string(),
                current_state: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record a terminal failure
    ///
    /// Failure is reachable from downloading and organizing only; from any other
    /// state the message is dropped and `false` is returned.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.transition(TaskStatus::Failed, "fail").is_err() {
            return false;
        }
        self.error = Some(message.into());
        true
    }

    /// Whether the task has outlived `window` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => now - self.created_at > window,
            Err(_) => false,
        }
    }

    /// Time since the task was created
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }
}

/// Event emitted during the collection lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task registered and offline download submitted
    Created {
        /// Task ID
        id: TaskId,
        /// Subscription title
        title: String,
    },

    /// Reported download progress increased
    Progress {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0 to 100)
        percent: u8,
    },

    /// Download finished and the file tree was built
    Completed {
        /// Task ID
        id: TaskId,
        /// Number of files in the tree
        files: usize,
    },

    /// Organize started
    Organizing {
        /// Task ID
        id: TaskId,
    },

    /// Files moved into the final location
    Finished {
        /// Task ID
        id: TaskId,
        /// Destination directory
        final_path: String,
        /// Number of files moved
        moved: usize,
    },

    /// Task failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Task cancelled by the caller
    Cancelled {
        /// Task ID
        id: TaskId,
    },

    /// Task dropped from the registry (retention elapsed or expired)
    Removed {
        /// Task ID
        id: TaskId,
    },
}

/// Payload sent to webhooks
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event type (download_finished)
    pub event: String,

    /// Subscription title
    pub title: String,

    /// Release group, if the subscription pins one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<String>,

    /// Human-readable message
    pub message: String,

    /// Timestamp of the event (Unix timestamp in seconds)
    pub timestamp: i64,
}
