//! Keyed task storage

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::types::{CollectionTask, TaskId};

/// One task behind its own lock
///
/// Status-mutating steps hold the lock; the map lock is only held for lookups.
pub(crate) type TaskHandle = Arc<Mutex<CollectionTask>>;

#[derive(Clone, Default)]
pub(crate) struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, TaskHandle>>>,
}

impl TaskRegistry {
    pub(crate) async fn insert(&self, task: CollectionTask) -> TaskHandle {
        let id = task.id.clone();
        let handle = Arc::new(Mutex::new(task));
        self.tasks.write().await.insert(id, handle.clone());
        handle
    }

    pub(crate) async fn get(&self, id: &TaskId) -> Option<TaskHandle> {
        self.tasks.read().await.get(id).cloned()
    }

    pub(crate) async fn remove(&self, id: &TaskId) -> Option<TaskHandle> {
        self.tasks.write().await.remove(id)
    }

    /// Snapshot of every handle, for iteration without holding the map lock
    pub(crate) async fn handles(&self) -> Vec<(TaskId, TaskHandle)> {
        self.tasks
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Subscription;

    fn task() -> CollectionTask {
        CollectionTask::new(TaskId::new(), "magnet:?", "/t", "/f", Subscription::default())
    }

    #[tokio::test]
    async fn insert_get_remove() {
        let registry = TaskRegistry::default();
        let task = task();
        let id = task.id.clone();

        registry.insert(task).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&id).await.is_some());

        let removed = registry.remove(&id).await.unwrap();
        assert_eq!(removed.lock().await.id, id);
        assert!(registry.get(&id).await.is_none());
        assert!(registry.remove(&id).await.is_none());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let registry = TaskRegistry::default();
        let clone = registry.clone();
        registry.insert(task()).await;
        assert_eq!(clone.handles().await.len(), 1);
    }
}
