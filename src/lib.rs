//! # collection-dl
//!
//! Season-pack acquisition over an OpenList/AList remote file host.
//!
//! ## Design Philosophy
//!
//! collection-dl is designed to be:
//! - **Remote-first** - Downloads run as offline jobs on the file host; this crate only
//!   steers them and reshapes the result
//! - **Reviewable** - A finished download becomes a file tree the caller can adjust
//!   before anything is renamed, moved or deleted
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to lifecycle events
//!
//! ## Quick Start
//!
//! ```no_run
//! use collection_dl::{CollectionManager, Config, OrganizeRequest, Subscription, TaskStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.remote.host = "http://nas.local:5244".to_string();
//!     config.remote.token = "alist-token".to_string();
//!     config.remote.provider = "qBittorrent".to_string();
//!     config.remote.download_path_template = "/media/anime".to_string();
//!
//!     let manager = CollectionManager::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let subscription = Subscription {
//!         title: "Frieren".to_string(),
//!         ..Default::default()
//!     };
//!     let task = manager
//!         .create_task("magnet:?xt=urn:btih:0123456789abcdef", subscription)
//!         .await?;
//!
//!     // Poll until the remote job finishes and the tree is ready for review
//!     loop {
//!         let current = manager.get_task(&task.id).await?;
//!         match current.status {
//!             TaskStatus::Downloading => {
//!                 tokio::time::sleep(std::time::Duration::from_secs(30)).await
//!             }
//!             TaskStatus::Completed => break,
//!             other => return Err(format!("task ended as {other}").into()),
//!         }
//!     }
//!
//!     let done = manager.organize(&task.id, OrganizeRequest::default()).await?;
//!     println!("{} -> {}", done.status, done.final_path);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Release filename filtering
pub mod filter;
/// Task lifecycle manager (decomposed into focused submodules)
pub mod manager;
/// User-facing notifications
pub mod notify;
/// Organize engine: rename, move, delete and cleanup
pub mod organize;
/// Remote file host client
pub mod remote;
/// Episode number and canonical name resolution
pub mod resolver;
/// File tree model and builder
pub mod tree;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{
    CollectionConfig, Config, FilterConfig, NotificationConfig, RemoteConfig, WebhookConfig,
};
pub use error::{ApiError, Error, ErrorDetail, Result, TaskError, ToHttpStatus};
pub use filter::ContentFilter;
pub use manager::{CollectionManager, FileValidation, OrganizeRequest};
pub use notify::{NoopNotifier, NotificationKind, Notifier, WebhookNotifier};
pub use organize::{OrganizePlan, OrganizeReport, Organizer};
pub use remote::{JobState, JobStatus, OpenListClient, RemoteEntry, RemoteFs};
pub use resolver::{EpisodePatternResolver, NameResolver, Resolution};
pub use tree::{FileNode, TreeBuilder};
pub use types::{CollectionTask, Event, Subscription, TaskId, TaskStatus};

/// Helper function to run the expiry sweeper until a termination signal arrives.
///
/// Starts [`CollectionManager::spawn_expiry_sweeper`], waits for a signal, then stops
/// the sweeper and waits for it to exit.
///
/// Ctrl+C is honored everywhere; SIGTERM as well on unix.
///
/// # Example
///
/// ```no_run
/// use collection_dl::{CollectionManager, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config: Config = serde_json::from_str(&std::fs::read_to_string("config.json")?)?;
///     let manager = CollectionManager::new(config)?;
///
///     // Serve requests elsewhere with clones of `manager`
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: CollectionManager) -> Result<()> {
    let shutdown = tokio_util::sync::CancellationToken::new();
    let sweeper = manager.spawn_expiry_sweeper(shutdown.clone());

    wait_for_signal().await;

    shutdown.cancel();
    sweeper
        .await
        .map_err(|e| Error::Other(format!("expiry sweeper panicked: {e}")))
}

async fn wait_for_signal() {
    tokio::select! {
        _ = terminate() => tracing::info!(signal = "SIGTERM", "stopping expiry sweeper"),
        interrupted = tokio::signal::ctrl_c() => match interrupted {
            Ok(()) => tracing::info!(signal = "SIGINT", "stopping expiry sweeper"),
            Err(e) => tracing::error!(error = %e, "Ctrl+C listener failed, stopping expiry sweeper"),
        },
    }
}

/// Resolves on SIGTERM; never resolves where SIGTERM cannot be observed
#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C only");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
