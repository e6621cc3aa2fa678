//! Applying caller edits and running the organize engine for a task.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result, TaskError};
use crate::notify::NotificationKind;
use crate::organize::OrganizePlan;
use crate::tree::{self, FileNode};
use crate::types::{CollectionTask, Event, TaskId, TaskStatus};
use crate::utils::normalize_remote_path;

use super::CollectionManager;

/// Caller's decisions for organizing a completed task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizeRequest {
    /// Edited nodes, matched to the task's tree by path
    ///
    /// Only `selected` and `new_name` are taken from each edit. Nodes not listed keep
    /// their current values.
    #[serde(default)]
    pub files: Vec<FileNode>,

    /// Keep the release's directory layout under the final path
    #[serde(default)]
    pub keep_directory_structure: bool,

    /// Original directory path -> replacement directory name
    #[serde(default)]
    pub directory_rename_overrides: BTreeMap<String, String>,
}

impl CollectionManager {
    /// Organize a completed task into its final directory
    ///
    /// Applies the edits in `request` to the stored tree, then renames and moves the
    /// selected files, deletes the unselected ones and removes the temp directory.
    /// The task lock is released while the remote calls run, so reads during a long
    /// organize see the task as `organizing`.
    ///
    /// # Returns
    ///
    /// The task after the run: `finished` on success (removed from the registry after
    /// the configured retention), or `failed` with the error recorded.
    ///
    /// # Errors
    ///
    /// Precondition failures leave the task untouched:
    /// - [`TaskError::NotFound`] for unknown tasks
    /// - [`TaskError::InvalidState`] unless the task is `completed`
    /// - [`Error::LoginFailed`] when the remote host rejects the credentials
    pub async fn organize(&self, id: &TaskId, request: OrganizeRequest) -> Result<CollectionTask> {
        let handle = self.lookup(id).await?;

        let plan = {
            let mut task = handle.lock().await;
            if task.status != TaskStatus::Completed {
                return Err(TaskError::InvalidState {
                    id: id.clone(),
                    operation: "organize".to_string(),
                    current_state: task.status,
                }
                .into());
            }
            if task.file_tree.is_none() {
                return Err(Error::Other(format!("task {id} has no file tree")));
            }
            if !self.remote.login().await {
                return Err(Error::LoginFailed(format!(
                    "remote host {} rejected the configured credentials",
                    self.remote.name()
                )));
            }

            self.prepare_plan(&mut task, request);
            task.transition(TaskStatus::Organizing, "organize")?;
            self.emit_event(Event::Organizing { id: id.clone() });
            tracing::info!(
                task_id = %id,
                final_path = %task.final_path,
                keep_structure = task.keep_directory_structure,
                "organizing collection"
            );

            OrganizePlan {
                temp_path: task.temp_path.clone(),
                final_path: task.final_path.clone(),
                tree: task.file_tree.clone().unwrap_or_default(),
                keep_directory_structure: task.keep_directory_structure,
                directory_rename_overrides: task.directory_rename_overrides.clone(),
            }
        };

        let outcome = self.organizer().run(&plan).await;

        let mut task = handle.lock().await;
        match outcome {
            Ok(report) => {
                task.transition(TaskStatus::Finished, "organize")?;
                if !report.temp_cleaned {
                    tracing::warn!(task_id = %id, temp = %task.temp_path, "temp directory was not removed");
                }
                tracing::info!(
                    task_id = %id,
                    moved = report.moved,
                    unmoved = report.unmoved,
                    deleted = report.deleted,
                    "collection organized"
                );
                self.emit_event(Event::Finished {
                    id: id.clone(),
                    final_path: task.final_path.clone(),
                    moved: report.moved,
                });
                self.send_finished_notification(&task, report.moved);
                self.schedule_removal(id.clone());
            }
            Err(e) => self.fail_task(&mut task, format!("organize failed: {e}")),
        }
        Ok(task.clone())
    }

    /// Normalize paths and fold the caller's decisions into the task
    fn prepare_plan(&self, task: &mut CollectionTask, request: OrganizeRequest) {
        task.temp_path = normalize_remote_path(&task.temp_path);
        task.final_path = normalize_remote_path(&task.final_path);

        let mut edits = request.files;
        tree::normalize_paths(&mut edits);
        if let Some(nodes) = task.file_tree.as_mut() {
            tree::normalize_paths(nodes);
            let applied = tree::apply_edits(nodes, &edits);
            tracing::debug!(task_id = %task.id, edits = edits.len(), applied, "applied tree edits");
        }

        task.keep_directory_structure = request.keep_directory_structure;
        task.directory_rename_overrides = request.directory_rename_overrides;
    }

    fn send_finished_notification(&self, task: &CollectionTask, moved: usize) {
        if !task.subscription.notify {
            return;
        }
        let notifier = self.notifier.clone();
        let subscription = task.subscription.clone();
        let message = format!(
            "{} collection download finished: {moved} files in {}",
            subscription.title, task.final_path
        );
        let id = task.id.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .notify(&subscription, &message, NotificationKind::DownloadFinished)
                .await
            {
                tracing::warn!(task_id = %id, error = %e, "finished notification failed");
            }
        });
    }
}
