//! Task creation and offline download submission.

use crate::error::{Error, Result};
use crate::types::{CollectionTask, Event, Subscription, TaskId};
use crate::utils::{TEMP_DIR_NAME, join_path, normalize_remote_path, trim_trailing_slash};

use super::CollectionManager;

impl CollectionManager {
    /// Start acquiring a season pack
    ///
    /// Registers a task, submits the magnet URI as an offline download into the
    /// task's own temp directory and returns a snapshot of the new task.
    ///
    /// # Arguments
    ///
    /// * `magnet_uri` - Magnet URI of the release, must start with `magnet:`
    /// * `subscription` - Naming, filtering and destination context
    ///
    /// # Returns
    ///
    /// The created task. A submission the remote host rejected still yields a task,
    /// in the `failed` state with the remote error recorded.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUri`] when the URI is not a magnet link
    /// - [`Error::LoginFailed`] when the remote host rejects the configured credentials
    pub async fn create_task(
        &self,
        magnet_uri: &str,
        subscription: Subscription,
    ) -> Result<CollectionTask> {
        let magnet_uri = magnet_uri.trim();
        if !magnet_uri.starts_with("magnet:") {
            return Err(Error::InvalidUri(format!(
                "expected a magnet: link, got {magnet_uri:?}"
            )));
        }

        let final_path = self.download_path_for(&subscription);
        let id = TaskId::new();
        let temp_path = join_path(&join_path(&final_path, TEMP_DIR_NAME), id.as_str());

        if !self.remote.login().await {
            return Err(Error::LoginFailed(format!(
                "remote host {} rejected the configured credentials",
                self.remote.name()
            )));
        }

        let mut task = CollectionTask::new(
            id.clone(),
            magnet_uri,
            temp_path.clone(),
            final_path,
            subscription,
        );

        match self.remote.add_offline_download(magnet_uri, &temp_path).await {
            Ok(job_id) => {
                tracing::info!(
                    task_id = %id,
                    job_id = %job_id,
                    temp = %temp_path,
                    title = %task.subscription.title,
                    "offline download submitted"
                );
                task.remote_job_id = Some(job_id);
            }
            Err(e) => {
                tracing::error!(task_id = %id, error = %e, "offline download submission failed");
                task.fail(format!("offline download submission failed: {e}"));
            }
        }

        self.registry.insert(task.clone()).await;
        self.emit_event(Event::Created {
            id: id.clone(),
            title: task.subscription.title.clone(),
        });
        if let Some(error) = &task.error {
            self.emit_event(Event::Failed {
                id,
                error: error.clone(),
            });
        }

        Ok(task)
    }

    /// Destination directory: the subscription's own path, else the configured template
    fn download_path_for(&self, subscription: &Subscription) -> String {
        let path = subscription
            .download_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.config.remote.download_path_template);
        let path = normalize_remote_path(path.trim());
        match trim_trailing_slash(&path) {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        }
    }
}
