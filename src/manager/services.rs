//! Registry housekeeping: delayed removal of finished tasks and the expiry sweeper.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::types::{CollectionTask, Event, TaskId, TaskStatus};

use super::CollectionManager;

impl CollectionManager {
    /// Whether `task` has outlived the expiry window
    ///
    /// A task that is organizing never expires; its remote calls are still running.
    pub(crate) fn is_expired(&self, task: &CollectionTask) -> bool {
        task.status != TaskStatus::Organizing
            && task.is_expired(Utc::now(), self.config.collection.task_expiry)
    }

    /// Drop a finished task from the registry once the retention period has passed
    pub(crate) fn schedule_removal(&self, id: TaskId) {
        let registry = self.registry.clone();
        let event_tx = self.event_tx.clone();
        let retention = self.config.collection.finished_retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            if registry.remove(&id).await.is_some() {
                tracing::debug!(task_id = %id, "finished task removed after retention");
                event_tx.send(Event::Removed { id }).ok();
            }
        });
    }

    /// Remove every expired task from the registry
    ///
    /// Returns the number of tasks removed. Remote state is left alone; an expired
    /// task's temp directory stays on the host.
    pub async fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        for (id, handle) in self.registry.handles().await {
            let expired = {
                let task = handle.lock().await;
                self.is_expired(&task)
            };
            if expired && self.registry.remove(&id).await.is_some() {
                tracing::info!(task_id = %id, "expired task removed");
                self.emit_event(Event::Removed { id });
                removed += 1;
            }
        }
        removed
    }

    /// Start the periodic expiry sweep
    ///
    /// Runs [`cleanup_expired`](Self::cleanup_expired) every `sweep_interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_expiry_sweeper(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let period = self.config.collection.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately
            interval.tick().await;

            tracing::info!(interval = ?period, "expiry sweeper started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = manager.cleanup_expired().await;
                        if removed > 0 {
                            tracing::debug!(removed, "expiry sweep finished");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("expiry sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}
