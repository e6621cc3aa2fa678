//! Read-only views of tasks: listing, temp trees, file validation and summaries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use crate::error::{Result, TaskError};
use crate::tree::{self, FileNode, TreeBuilder};
use crate::types::{CollectionTask, TaskId};

use super::CollectionManager;

/// Outcome of checking a task's files against the remote host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValidation {
    /// Files checked
    pub checked: usize,
    /// Paths that are no longer present
    pub missing: Vec<String>,
}

impl FileValidation {
    /// Whether every file was found
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl CollectionManager {
    /// Snapshots of all live tasks, oldest first
    ///
    /// Unlike [`get_task`](Self::get_task) this does not poll the remote host.
    pub async fn list_tasks(&self) -> Vec<CollectionTask> {
        let mut tasks = Vec::new();
        for (_, handle) in self.registry.handles().await {
            let task = handle.lock().await;
            if !self.is_expired(&task) {
                tasks.push(task.clone());
            }
        }
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Build a tree of the task's working directory without storing it
    ///
    /// Useful for inspecting what a still-downloading task has fetched so far.
    pub async fn temp_tree(&self, id: &TaskId) -> Result<Vec<FileNode>> {
        let (temp_path, subscription) = {
            let handle = self.lookup(id).await?;
            let task = handle.lock().await;
            (task.temp_path.clone(), task.subscription.clone())
        };
        TreeBuilder::new(self.remote.as_ref(), self.resolver.as_ref(), &subscription)
            .build(&temp_path)
            .await
    }

    /// Check that every file in the task's tree still exists on the remote host
    ///
    /// Each parent directory is listed once. A directory that cannot be listed counts
    /// all of its files as missing.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidState`] when the task has no file tree yet.
    pub async fn validate_files(&self, id: &TaskId) -> Result<FileValidation> {
        let nodes = {
            let handle = self.lookup(id).await?;
            let task = handle.lock().await;
            task.file_tree.clone().ok_or_else(|| TaskError::InvalidState {
                id: id.clone(),
                operation: "validate_files".to_string(),
                current_state: task.status,
            })?
        };

        let mut by_parent: BTreeMap<&str, Vec<&FileNode>> = BTreeMap::new();
        for file in tree::files(&nodes) {
            by_parent.entry(file.parent_path.as_str()).or_default().push(file);
        }

        let mut validation = FileValidation::default();
        for (dir, files) in by_parent {
            validation.checked += files.len();
            let present: HashSet<String> = match self.remote.list(dir).await {
                Ok(entries) => entries.into_iter().map(|e| e.name).collect(),
                Err(e) => {
                    tracing::warn!(task_id = %id, dir = %dir, error = %e, "could not list directory for validation");
                    HashSet::new()
                }
            };
            validation.missing.extend(
                files
                    .into_iter()
                    .filter(|f| !present.contains(&f.name))
                    .map(|f| f.path.clone()),
            );
        }

        if !validation.is_complete() {
            tracing::warn!(task_id = %id, missing = validation.missing.len(), "files missing from remote host");
        }
        Ok(validation)
    }

    /// Human-readable multi-line report of a task
    pub async fn task_summary(&self, id: &TaskId) -> Result<String> {
        let task = {
            let handle = self.lookup(id).await?;
            let task = handle.lock().await;
            task.clone()
        };
        Ok(render_summary(&task))
    }
}

fn render_summary(task: &CollectionTask) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Task:     {}", task.id);
    let _ = writeln!(out, "Title:    {}", task.subscription.title);
    let _ = writeln!(out, "Status:   {}", task.status);
    let _ = writeln!(out, "Magnet:   {}", task.magnet_uri);
    let _ = writeln!(out, "Temp:     {}", task.temp_path);
    let _ = writeln!(out, "Final:    {}", task.final_path);
    let _ = writeln!(out, "Progress: {}%", task.progress);
    let _ = writeln!(
        out,
        "Created:  {}",
        task.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    match &task.file_tree {
        Some(nodes) => {
            let _ = writeln!(
                out,
                "Files:    {} ({} selected)",
                tree::files(nodes).len(),
                tree::selected_files(nodes).len()
            );
        }
        None => {
            let _ = writeln!(out, "Files:    not yet available");
        }
    }
    if task.retry_count > 0 {
        let _ = writeln!(out, "Retries:  {}", task.retry_count);
    }
    if let Some(error) = &task.error {
        let _ = writeln!(out, "Error:    {error}");
    }
    out
}
