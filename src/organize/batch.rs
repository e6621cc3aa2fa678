//! Chunked remote mutations with per-item fallback

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use super::Organizer;
use crate::error::Result;

/// Outcome of a chunked run
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChunkReport<T> {
    /// Items handled by a successful batch or single call
    pub(crate) done: usize,
    /// Items whose single call also failed
    pub(crate) failed: Vec<T>,
}

/// Run `batch_op` over `items` in chunks of `chunk_size`
///
/// A failing chunk is retried one item at a time with `single_op`. Item failures are
/// logged and collected; remaining chunks always run. `pause` follows every call.
pub(crate) async fn for_each_chunk<T, B, BFut, S, SFut>(
    items: &[T],
    chunk_size: usize,
    pause: Duration,
    batch_op: B,
    single_op: S,
) -> ChunkReport<T>
where
    T: Clone + Debug,
    B: Fn(Vec<T>) -> BFut,
    BFut: Future<Output = Result<()>>,
    S: Fn(T) -> SFut,
    SFut: Future<Output = Result<()>>,
{
    let mut report = ChunkReport {
        done: 0,
        failed: Vec::new(),
    };

    for chunk in items.chunks(chunk_size.max(1)) {
        let outcome = batch_op(chunk.to_vec()).await;
        settle(pause).await;

        match outcome {
            Ok(()) => report.done += chunk.len(),
            Err(e) => {
                tracing::warn!(
                    count = chunk.len(),
                    error = %e,
                    "batch call failed, falling back to single items"
                );
                for item in chunk {
                    let outcome = single_op(item.clone()).await;
                    settle(pause).await;
                    match outcome {
                        Ok(()) => report.done += 1,
                        Err(e) => {
                            tracing::warn!(item = ?item, error = %e, "item call failed, skipping");
                            report.failed.push(item.clone());
                        }
                    }
                }
            }
        }
    }

    report
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl Organizer<'_> {
    /// Rename entries of `dir`, returning the pairs that could not be renamed
    pub(crate) async fn rename_in(
        &self,
        dir: &str,
        renames: &[(String, String)],
    ) -> ChunkReport<(String, String)> {
        let remote = self.remote;
        for_each_chunk(
            renames,
            self.config.batch_size,
            self.config.batch_pause,
            move |batch| async move { remote.batch_rename(dir, &batch).await },
            move |pair| async move { remote.batch_rename(dir, std::slice::from_ref(&pair)).await },
        )
        .await
    }

    /// Move `names` from `src_dir` into `dst_dir`
    pub(crate) async fn move_names(
        &self,
        src_dir: &str,
        dst_dir: &str,
        names: &[String],
    ) -> ChunkReport<String> {
        let remote = self.remote;
        for_each_chunk(
            names,
            self.config.batch_size,
            self.config.batch_pause,
            move |batch| async move { remote.move_items(src_dir, dst_dir, &batch).await },
            move |name| async move {
                remote
                    .move_items(src_dir, dst_dir, std::slice::from_ref(&name))
                    .await
            },
        )
        .await
    }

    /// Remove `names` inside `dir`
    pub(crate) async fn remove_names(&self, dir: &str, names: &[String]) -> ChunkReport<String> {
        let remote = self.remote;
        for_each_chunk(
            names,
            self.config.batch_size,
            self.config.batch_pause,
            move |batch| async move { remote.remove(dir, &batch).await },
            move |name| async move { remote.remove(dir, std::slice::from_ref(&name)).await },
        )
        .await
    }
}
