//! Configuration types for collection-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote file host connection settings
///
/// Groups settings for the OpenList/AList-style host that performs the offline
/// download and owns the filesystem being reorganized.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the host (e.g. "http://nas.local:5244")
    #[serde(default)]
    pub host: String,

    /// Token sent verbatim in the `Authorization` header
    #[serde(default)]
    pub token: String,

    /// Offline download tool name understood by the host (e.g. "qBittorrent", "aria2")
    #[serde(default)]
    pub provider: String,

    /// Fallback destination directory when a subscription has no download path
    #[serde(default)]
    pub download_path_template: String,

    /// Timeout for ordinary calls (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for batch rename/move/copy calls (default: 120 seconds)
    #[serde(default = "default_batch_timeout", with = "duration_serde")]
    pub batch_timeout: Duration,

    /// Delay enforced before every call, serialized across callers (default: 150ms)
    #[serde(default = "default_min_call_interval", with = "millis_serde")]
    pub min_call_interval: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            provider: String::new(),
            download_path_template: String::new(),
            request_timeout: default_request_timeout(),
            batch_timeout: default_batch_timeout(),
            min_call_interval: default_min_call_interval(),
        }
    }
}

/// Task lifecycle and organize pacing settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Overall limit for an offline download, measured from task creation
    /// (default: 120 minutes, 0 = no limit)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,

    /// Automatic retries of an errored remote job (default: 3, -1 = unlimited)
    #[serde(default = "default_retry_limit")]
    pub retry_limit: i64,

    /// Age after which a task is treated as non-existent (default: 24 hours)
    #[serde(default = "default_task_expiry", with = "duration_serde")]
    pub task_expiry: Duration,

    /// How long a finished task stays queryable (default: 60 seconds)
    #[serde(default = "default_finished_retention", with = "duration_serde")]
    pub finished_retention: Duration,

    /// Maximum items per batch rename/move/remove call (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause after every batch or per-item call (default: 100ms)
    #[serde(default = "default_batch_pause", with = "millis_serde")]
    pub batch_pause: Duration,

    /// Settle delay after a directory's renames, before moving (default: 3000ms)
    #[serde(default = "default_rename_settle", with = "millis_serde")]
    pub rename_settle: Duration,

    /// Settle delay after a directory's moves (default: 2000ms)
    #[serde(default = "default_move_settle", with = "millis_serde")]
    pub move_settle: Duration,

    /// Delay between emptying the temp tree and removing its root (default: 1000ms)
    #[serde(default = "default_cleanup_settle", with = "millis_serde")]
    pub cleanup_settle: Duration,

    /// Interval of the background expiry sweep (default: 1 hour)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            download_timeout: default_download_timeout(),
            retry_limit: default_retry_limit(),
            task_expiry: default_task_expiry(),
            finished_retention: default_finished_retention(),
            batch_size: default_batch_size(),
            batch_pause: default_batch_pause(),
            rename_settle: default_rename_settle(),
            move_settle: default_move_settle(),
            cleanup_settle: default_cleanup_settle(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Filename filter settings shared by every subscription
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Exclude patterns applied to subscriptions that opt into global excludes
    #[serde(default)]
    pub global_exclude: Vec<String>,
}

/// Notification configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhook configurations
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Main configuration for [`CollectionManager`](crate::CollectionManager)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote file host connection
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Task lifecycle and organize pacing
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Shared filename filters
    #[serde(default)]
    pub filter: FilterConfig,

    /// Notifications
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Check the settings every operation depends on
    ///
    /// Configuration errors are never retried, so they are reported before any
    /// task is created.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("remote.host", &self.remote.host),
            ("remote.token", &self.remote.token),
            ("remote.provider", &self.remote.provider),
            (
                "remote.download_path_template",
                &self.remote.download_path_template,
            ),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("{key} must not be empty"),
                    key: Some(key.to_string()),
                });
            }
        }

        if !self.remote.host.starts_with("http://") && !self.remote.host.starts_with("https://") {
            return Err(Error::Config {
                message: format!("remote.host must be an http(s) URL, got {}", self.remote.host),
                key: Some("remote.host".to_string()),
            });
        }

        if self.collection.batch_size == 0 {
            return Err(Error::Config {
                message: "collection.batch_size must be at least 1".to_string(),
                key: Some("collection.batch_size".to_string()),
            });
        }

        if self.collection.retry_limit < -1 {
            return Err(Error::Config {
                message: "collection.retry_limit must be -1 (unlimited) or non-negative"
                    .to_string(),
                key: Some("collection.retry_limit".to_string()),
            });
        }

        if self.collection.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "collection.sweep_interval must be greater than zero".to_string(),
                key: Some("collection.sweep_interval".to_string()),
            });
        }

        if self
            .notifications
            .webhooks
            .iter()
            .any(|w| w.url.trim().is_empty())
        {
            return Err(Error::Config {
                message: "webhook url must not be empty".to_string(),
                key: Some("notifications.webhooks.url".to_string()),
            });
        }

        Ok(())
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_batch_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_min_call_interval() -> Duration {
    Duration::from_millis(150)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(120 * 60)
}

fn default_retry_limit() -> i64 {
    3
}

fn default_task_expiry() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_finished_retention() -> Duration {
    Duration::from_secs(60)
}

fn default_batch_size() -> usize {
    100
}

fn default_batch_pause() -> Duration {
    Duration::from_millis(100)
}

fn default_rename_settle() -> Duration {
    Duration::from_millis(3000)
}

fn default_move_settle() -> Duration {
    Duration::from_millis(2000)
}

fn default_cleanup_settle() -> Duration {
    Duration::from_millis(1000)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds), for the short pacing delays
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
