//! Temp directory removal

use futures::future::{BoxFuture, FutureExt};

use super::Organizer;
use super::batch::settle;
use crate::remote::RemoteEntry;
use crate::utils::{join_path, normalize_remote_path, split_parent, trim_trailing_slash};

const CLEANUP_ATTEMPTS: u32 = 2;

impl Organizer<'_> {
    /// Delete the temp tree bottom-up, then the temp directory itself
    ///
    /// The whole sequence is retried once. Failure is logged and reported as `false`;
    /// it never fails the caller.
    pub(crate) async fn remove_temp_tree(&self, temp_path: &str) -> bool {
        let temp_path = normalize_remote_path(temp_path);
        let temp_path = trim_trailing_slash(&temp_path);
        let Some((parent, name)) = split_parent(temp_path) else {
            tracing::error!(temp = %temp_path, "refusing to remove temp path without a parent");
            return false;
        };
        let names = [name.to_string()];

        for attempt in 1..=CLEANUP_ATTEMPTS {
            self.empty_directory(temp_path.to_string()).await;
            settle(self.config.cleanup_settle).await;

            match self.remote.remove(parent, &names).await {
                Ok(()) => {
                    tracing::debug!(temp = %temp_path, "removed temp directory");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(temp = %temp_path, attempt, error = %e, "temp directory removal failed");
                }
            }
        }

        tracing::warn!(temp = %temp_path, "temp directory left behind, manual cleanup required");
        false
    }

    fn empty_directory(&self, dir: String) -> BoxFuture<'_, ()> {
        async move {
            let entries = match self.remote.list(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %dir, error = %e, "could not list directory for cleanup");
                    return;
                }
            };
            let (dirs, files): (Vec<RemoteEntry>, Vec<RemoteEntry>) =
                entries.into_iter().partition(|e| e.is_dir);

            for sub in &dirs {
                self.empty_directory(join_path(&dir, &sub.name)).await;
            }

            let file_names: Vec<String> = files.into_iter().map(|e| e.name).collect();
            if !file_names.is_empty() {
                self.remove_names(&dir, &file_names).await;
            }
            let dir_names: Vec<String> = dirs.into_iter().map(|e| e.name).collect();
            if !dir_names.is_empty() {
                self.remove_names(&dir, &dir_names).await;
            }
        }
        .boxed()
    }
}
