//! Collection task manager split into focused submodules.
//!
//! The `CollectionManager` struct and its methods are organized by domain:
//! - [`registry`] - Keyed task storage with per-task locks
//! - [`create`] - Task creation and offline download submission
//! - [`refresh`] - Poll-on-read status refresh and tree construction
//! - [`control`] - Cancel and force-complete
//! - [`organize`] - Applying caller edits and running the organize engine
//! - [`inspect`] - Listing, temp trees, validation and summaries
//! - [`services`] - Delayed removal and the expiry sweeper

mod control;
mod create;
mod inspect;
mod organize;
mod refresh;
mod registry;
mod services;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use inspect::FileValidation;
pub use organize::OrganizeRequest;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{Error, Result, TaskError};
use crate::filter::ContentFilter;
use crate::notify::{self, Notifier};
use crate::organize::Organizer;
use crate::remote::{OpenListClient, RemoteFs};
use crate::resolver::{EpisodePatternResolver, NameResolver};
use crate::types::{Event, Subscription, TaskId};

use registry::{TaskHandle, TaskRegistry};

/// Registry and lifecycle driver for collection tasks
///
/// Cloning is cheap; clones share the registry, the remote client and the event
/// channel.
///
/// # Examples
///
/// ```no_run
/// use collection_dl::{CollectionManager, Config, Subscription};
///
/// # #[tokio::main]
/// # async fn main() -> collection_dl::Result<()> {
/// let config: Config = serde_json::from_str(r#"{
///     "remote": {
///         "host": "http://nas.local:5244",
///         "token": "secret",
///         "provider": "qBittorrent",
///         "download_path_template": "/media/anime"
///     }
/// }"#)?;
/// let manager = CollectionManager::new(config)?;
///
/// let subscription = Subscription {
///     title: "Frieren".into(),
///     ..Default::default()
/// };
/// let task = manager
///     .create_task("magnet:?xt=urn:btih:0123456789abcdef", subscription)
///     .await?;
///
/// // Each read refreshes a downloading task from the remote host
/// let task = manager.get_task(&task.id).await?;
/// println!("{} is {} ({}%)", task.id, task.status, task.progress);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CollectionManager {
    pub(crate) config: Arc<Config>,
    pub(crate) remote: Arc<dyn RemoteFs>,
    pub(crate) resolver: Arc<dyn NameResolver>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) registry: TaskRegistry,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl CollectionManager {
    /// Create a manager talking to the configured OpenList host
    ///
    /// Uses [`EpisodePatternResolver`] for naming and webhooks from the notification
    /// config (or nothing when none are configured).
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let remote: Arc<dyn RemoteFs> = Arc::new(OpenListClient::new(config.remote.clone())?);
        let resolver: Arc<dyn NameResolver> = Arc::new(EpisodePatternResolver::new()?);
        let notifier = notify::from_config(&config.notifications.webhooks);
        Self::with_components(config, remote, resolver, notifier)
    }

    /// Create a manager from explicit components
    pub fn with_components(
        config: Config,
        remote: Arc<dyn RemoteFs>,
        resolver: Arc<dyn NameResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(1000);
        tracing::debug!(remote = remote.name(), "collection manager ready");
        Ok(Self {
            config: Arc::new(config),
            remote,
            resolver,
            notifier,
            registry: TaskRegistry::default(),
            event_tx,
        })
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Build the filename filter for `subscription` with the shared global excludes
    pub fn content_filter(&self, subscription: &Subscription) -> Result<ContentFilter> {
        ContentFilter::new(subscription, &self.config.filter.global_exclude)
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() only fails when nobody is subscribed
        self.event_tx.send(event).ok();
    }

    pub(crate) fn organizer(&self) -> Organizer<'_> {
        Organizer::new(self.remote.as_ref(), &self.config.collection)
    }

    /// Look up a live task, retiring it first when it has expired
    pub(crate) async fn lookup(&self, id: &TaskId) -> Result<TaskHandle> {
        let not_found = || Error::Task(TaskError::NotFound { id: id.clone() });
        let handle = self.registry.get(id).await.ok_or_else(not_found)?;

        let expired = {
            let task = handle.lock().await;
            self.is_expired(&task)
        };
        if expired {
            tracing::info!(task_id = %id, "task expired");
            if self.registry.remove(id).await.is_some() {
                self.emit_event(Event::Removed { id: id.clone() });
            }
            return Err(not_found());
        }
        Ok(handle)
    }
}
