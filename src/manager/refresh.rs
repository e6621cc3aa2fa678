//! Poll-on-read status refresh.
//!
//! There is no background poller: reading a downloading task performs exactly one
//! remote job query and applies the outcome before the snapshot is returned.

use chrono::Utc;

use crate::error::Result;
use crate::remote::JobState;
use crate::tree::{self, TreeBuilder};
use crate::types::{CollectionTask, Event, TaskId, TaskStatus};

use super::CollectionManager;

impl CollectionManager {
    /// Get a task snapshot, refreshing it from the remote host first
    ///
    /// A task that is `downloading` and has a remote job id is polled once. The poll can
    /// advance progress, complete the download (building the file tree), issue a
    /// retry of an errored job, or fail the task.
    ///
    /// # Errors
    ///
    /// [`TaskError::NotFound`](crate::error::TaskError::NotFound) for unknown and
    /// expired tasks. Remote failures never surface here; they end up in the task's
    /// status and error.
    pub async fn get_task(&self, id: &TaskId) -> Result<CollectionTask> {
        let handle = self.lookup(id).await?;
        let mut task = handle.lock().await;
        if task.status == TaskStatus::Downloading && task.remote_job_id.is_some() {
            self.refresh_status(&mut task).await;
        }
        Ok(task.clone())
    }

    async fn refresh_status(&self, task: &mut CollectionTask) {
        let Some(job_id) = task.remote_job_id.clone() else {
            return;
        };

        let timeout = self.config.collection.download_timeout;
        if !timeout.is_zero() && task.age(Utc::now()) > timeout {
            self.fail_task(
                task,
                format!(
                    "offline download did not finish within {} minutes",
                    timeout.as_secs() / 60
                ),
            );
            return;
        }

        let status = match self.remote.query_job(&job_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(task_id = %task.id, job_id = %job_id, error = %e, "job status query failed");
                return;
            }
        };
        let state = status.job_state();

        let percent = if state == JobState::Succeeded {
            100
        } else {
            status.progress_percent()
        };
        if percent > task.progress {
            task.progress = percent;
            self.emit_event(Event::Progress {
                id: task.id.clone(),
                percent,
            });
        }

        match state {
            JobState::Running => {
                tracing::debug!(task_id = %task.id, progress = task.progress, "offline download running");
            }
            JobState::Succeeded => self.complete_download(task).await,
            JobState::Cancelled => {
                let message = status
                    .error_message()
                    .unwrap_or("offline download was cancelled on the remote host")
                    .to_string();
                self.fail_task(task, message);
            }
            JobState::Failed => {
                let message = status
                    .error_message()
                    .unwrap_or("offline download failed")
                    .to_string();
                self.fail_task(task, message);
            }
            JobState::Errored => {
                let limit = self.config.collection.retry_limit;
                let reason = status.error_message().unwrap_or("offline download errored");
                if limit >= 0 && i64::from(task.retry_count) >= limit {
                    let message = format!("{reason} (gave up after {} retries)", task.retry_count);
                    self.fail_task(task, message);
                    return;
                }

                task.retry_count += 1;
                tracing::warn!(
                    task_id = %task.id,
                    job_id = %job_id,
                    attempt = task.retry_count,
                    error = %reason,
                    "offline download errored, retrying"
                );
                if let Err(e) = self.remote.retry_job(&job_id).await {
                    tracing::warn!(task_id = %task.id, job_id = %job_id, error = %e, "job retry request failed");
                }
            }
        }
    }

    /// Build the file tree once and move the task to `completed`
    ///
    /// A tree construction failure fails the task and leaves the remote download alone.
    pub(crate) async fn complete_download(&self, task: &mut CollectionTask) {
        if task.file_tree.is_none() {
            let builder =
                TreeBuilder::new(self.remote.as_ref(), self.resolver.as_ref(), &task.subscription);
            match builder.build(&task.temp_path).await {
                Ok(nodes) => task.file_tree = Some(nodes),
                Err(e) => {
                    self.fail_task(task, format!("failed to build file tree: {e}"));
                    return;
                }
            }
        }

        if let Err(e) = task.transition(TaskStatus::Completed, "complete") {
            tracing::warn!(task_id = %task.id, error = %e, "download completion ignored");
            return;
        }
        task.progress = 100;

        let files = task.file_tree.as_deref().map_or(0, |nodes| tree::files(nodes).len());
        tracing::info!(task_id = %task.id, files, "offline download completed");
        self.emit_event(Event::Completed {
            id: task.id.clone(),
            files,
        });
    }

    /// Fail the task and announce it, if it is still in a state that can fail
    pub(crate) fn fail_task(&self, task: &mut CollectionTask, message: String) {
        if task.fail(message.clone()) {
            tracing::error!(task_id = %task.id, error = %message, "collection task failed");
            self.emit_event(Event::Failed {
                id: task.id.clone(),
                error: message,
            });
        }
    }
}
