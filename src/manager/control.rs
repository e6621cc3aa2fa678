//! Task control: cancel and force-complete.

use crate::error::{Result, TaskError};
use crate::types::{CollectionTask, Event, TaskId, TaskStatus};

use super::CollectionManager;

impl CollectionManager {
    /// Cancel a task and drop it from the registry
    ///
    /// Allowed while `downloading` or `completed`. The remote job is deleted on a
    /// best-effort basis and the task's temp directory is always removed; neither
    /// failure stops the cancellation.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for unknown tasks
    /// - [`TaskError::InvalidState`] once organizing has started, or for terminal tasks
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use collection_dl::*;
    /// # async fn example(manager: CollectionManager, id: TaskId) -> Result<()> {
    /// manager.cancel_task(&id).await?;
    /// assert!(manager.get_task(&id).await.is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn cancel_task(&self, id: &TaskId) -> Result<()> {
        let handle = self.lookup(id).await?;
        let mut task = handle.lock().await;
        task.transition(TaskStatus::Cancelled, "cancel")?;

        if let Some(job_id) = &task.remote_job_id
            && let Err(e) = self.remote.delete_job(job_id).await
        {
            tracing::warn!(task_id = %id, job_id = %job_id, error = %e, "could not delete remote job");
        }
        self.organizer().remove_temp_tree(&task.temp_path).await;
        drop(task);

        self.registry.remove(id).await;
        tracing::info!(task_id = %id, "collection task cancelled");
        self.emit_event(Event::Cancelled { id: id.clone() });
        Ok(())
    }

    /// Treat a downloading task as complete without waiting for the remote job
    ///
    /// Builds the file tree from whatever is in the temp directory. A tree build
    /// failure fails the task; the returned snapshot shows it.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for unknown tasks
    /// - [`TaskError::InvalidState`] unless the task is `downloading`
    pub async fn force_complete(&self, id: &TaskId) -> Result<CollectionTask> {
        let handle = self.lookup(id).await?;
        let mut task = handle.lock().await;
        if task.status != TaskStatus::Downloading {
            return Err(TaskError::InvalidState {
                id: id.clone(),
                operation: "force_complete".to_string(),
                current_state: task.status,
            }
            .into());
        }

        tracing::info!(task_id = %id, progress = task.progress, "forcing download completion");
        self.complete_download(&mut task).await;
        Ok(task.clone())
    }
}
