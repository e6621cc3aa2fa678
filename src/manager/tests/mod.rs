use super::*;
use crate::error::Error;
use crate::test_helpers::{
    MemoryFs, create_test_manager, create_test_manager_with, job, test_config, test_subscription,
};
use crate::types::{CollectionTask, TaskStatus};


const MAGNET: &str = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056";

/// A typical season pack: two episodes and a subtitle
const PACK: &[(&str, u64)] = &[
    ("Frieren - 01 [1080p].mkv", 1_400),
    ("Frieren - 02 [1080p].mkv", 1_300),
    ("Frieren - 01 [1080p].ass", 20),
];

/// Drain every event currently buffered on `rx`
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Create a task over `payload` and poll it once with the remote job succeeded
async fn completed_task(
    manager: &CollectionManager,
    fs: &MemoryFs,
    payload: &[(&str, u64)],
) -> CollectionTask {
    fs.set_payload(payload);
    fs.script_jobs(vec![job(2, None, None)]);
    let task = manager
        .create_task(MAGNET, test_subscription())
        .await
        .unwrap();
    let task = manager.get_task(&task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed, "{:?}", task.error);
    task
}

/// Shift a task's creation time into the past
async fn age_task(manager: &CollectionManager, id: &TaskId, by: chrono::Duration) {
    let handle = manager.registry.get(id).await.unwrap();
    handle.lock().await.created_at -= by;
}
