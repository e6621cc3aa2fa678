//! Shared test helpers: an in-memory remote host and a fast-paced manager.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{CollectionConfig, Config, RemoteConfig};
use crate::error::{Error, Result};
use crate::manager::CollectionManager;
use crate::notify::{NotificationKind, Notifier};
use crate::remote::{JobStatus, RemoteEntry, RemoteFs};
use crate::resolver::EpisodePatternResolver;
use crate::types::Subscription;
use crate::utils::{join_path, split_parent};

#[derive(Default)]
struct MemoryState {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, u64>,
    login_rejected: bool,
    failing_lists: HashSet<String>,
    fail_batch_moves: bool,
    fail_offline: Option<String>,
    payload: Vec<(String, u64)>,
    job_script: VecDeque<JobStatus>,
    next_job: u32,
    calls: Vec<String>,
}

impl MemoryState {
    fn ensure_dir(&mut self, path: &str) {
        let mut current = path.trim_end_matches('/').to_string();
        while !current.is_empty() {
            if !self.dirs.insert(current.clone()) {
                break;
            }
            match split_parent(&current) {
                Some((parent, _)) => current = parent.to_string(),
                None => break,
            }
        }
        self.dirs.insert("/".to_string());
    }

    fn exists(&self, path: &str) -> bool {
        self.dirs.contains(path) || self.files.contains_key(path)
    }

    fn relocate(&mut self, from: &str, to: &str) -> bool {
        if let Some(size) = self.files.remove(from) {
            self.files.insert(to.to_string(), size);
            return true;
        }
        if !self.dirs.contains(from) {
            return false;
        }
        let prefix = format!("{from}/");
        let moved_dirs: Vec<String> = self
            .dirs
            .iter()
            .filter(|d| d.as_str() == from || d.starts_with(&prefix))
            .cloned()
            .collect();
        for dir in moved_dirs {
            self.dirs.remove(&dir);
            self.dirs.insert(format!("{to}{}", &dir[from.len()..]));
        }
        let moved_files: Vec<String> = self
            .files
            .keys()
            .filter(|f| f.starts_with(&prefix))
            .cloned()
            .collect();
        for file in moved_files {
            if let Some(size) = self.files.remove(&file) {
                self.files.insert(format!("{to}{}", &file[from.len()..]), size);
            }
        }
        true
    }

    fn delete(&mut self, path: &str) {
        self.files.remove(path);
        let prefix = format!("{path}/");
        self.dirs.retain(|d| d != path && !d.starts_with(&prefix));
        self.files.retain(|f, _| !f.starts_with(&prefix));
    }
}

fn missing(path: &str) -> Error {
    Error::Remote {
        code: 500,
        message: format!("object not found: {path}"),
    }
}

/// In-memory stand-in for a remote file host with failure injection
#[derive(Default)]
pub(crate) struct MemoryFs {
    state: Mutex<MemoryState>,
}

impl MemoryFs {
    pub(crate) fn new() -> Self {
        let fs = Self::default();
        fs.state.lock().unwrap().dirs.insert("/".to_string());
        fs
    }

    pub(crate) fn seed_file(&self, path: &str, size: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some((parent, _)) = split_parent(path) {
            state.ensure_dir(parent);
        }
        state.files.insert(path.to_string(), size);
    }

    pub(crate) fn seed_dir(&self, path: &str) {
        self.state.lock().unwrap().ensure_dir(path);
    }

    /// Files materialized under the destination when an offline download is submitted
    pub(crate) fn set_payload(&self, files: &[(&str, u64)]) {
        self.state.lock().unwrap().payload = files
            .iter()
            .map(|(path, size)| (path.to_string(), *size))
            .collect();
    }

    /// Statuses returned by successive job queries; the last one repeats
    pub(crate) fn script_jobs(&self, statuses: Vec<JobStatus>) {
        self.state.lock().unwrap().job_script = statuses.into();
    }

    pub(crate) fn fail_list(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_lists
            .insert(path.to_string());
    }

    /// Reject move calls carrying more than one name
    pub(crate) fn fail_batch_moves(&self) {
        self.state.lock().unwrap().fail_batch_moves = true;
    }

    pub(crate) fn fail_offline(&self, message: &str) {
        self.state.lock().unwrap().fail_offline = Some(message.to_string());
    }

    pub(crate) fn reject_login(&self) {
        self.state.lock().unwrap().login_rejected = true;
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().exists(path)
    }

    /// Files at or below `prefix`, sorted
    pub(crate) fn files_under(&self, prefix: &str) -> Vec<String> {
        let dir_prefix = format!("{}/", prefix.trim_end_matches('/'));
        self.state
            .lock()
            .unwrap()
            .files
            .keys()
            .filter(|f| f.starts_with(&dir_prefix))
            .cloned()
            .collect()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn login(&self) -> bool {
        self.record("login".into());
        !self.state.lock().unwrap().login_rejected
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let state = self.state.lock().unwrap();
        if state.failing_lists.contains(path) {
            return Err(Error::Remote {
                code: 500,
                message: format!("listing failed: {path}"),
            });
        }
        if !state.dirs.contains(path) {
            return Err(missing(path));
        }
        let child_of = |candidate: &str| -> Option<String> {
            match split_parent(candidate) {
                Some((parent, name)) if parent == path => Some(name.to_string()),
                _ => None,
            }
        };

        let mut entries: Vec<RemoteEntry> = state
            .dirs
            .iter()
            .filter_map(|d| child_of(d))
            .map(|name| RemoteEntry {
                name,
                size: 0,
                is_dir: true,
                path: path.to_string(),
                modified: None,
                created: None,
            })
            .collect();
        entries.extend(state.files.iter().filter_map(|(f, size)| {
            child_of(f).map(|name| RemoteEntry {
                name,
                size: *size,
                is_dir: false,
                path: path.to_string(),
                modified: None,
                created: None,
            })
        }));
        entries.sort_by(|a, b| b.size.cmp(&a.size));
        Ok(entries)
    }

    async fn make_directory(&self, path: &str) -> Result<()> {
        self.record(format!("mkdir:{path}"));
        self.state.lock().unwrap().ensure_dir(path);
        Ok(())
    }

    async fn batch_rename(&self, dir: &str, renames: &[(String, String)]) -> Result<()> {
        let renames: Vec<_> = renames.iter().filter(|(old, new)| old != new).collect();
        if renames.is_empty() {
            return Ok(());
        }
        self.record(format!("rename:{dir}:{}", renames.len()));
        let mut state = self.state.lock().unwrap();
        for (old, _) in &renames {
            let path = join_path(dir, old);
            if !state.exists(&path) {
                return Err(missing(&path));
            }
        }
        for (old, new) in renames {
            state.relocate(&join_path(dir, old), &join_path(dir, new));
        }
        Ok(())
    }

    async fn move_items(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
        self.record(format!("move:{src_dir}->{dst_dir}:{}", names.len()));
        let mut state = self.state.lock().unwrap();
        if state.fail_batch_moves && names.len() > 1 {
            return Err(Error::Remote {
                code: 500,
                message: "batch move rejected".into(),
            });
        }
        if !state.dirs.contains(dst_dir) {
            return Err(missing(dst_dir));
        }
        for name in names {
            let path = join_path(src_dir, name);
            if !state.exists(&path) {
                return Err(missing(&path));
            }
        }
        for name in names {
            state.relocate(&join_path(src_dir, name), &join_path(dst_dir, name));
        }
        Ok(())
    }

    async fn copy_items(&self, src_dir: &str, dst_dir: &str, names: &[String]) -> Result<()> {
        self.record(format!("copy:{src_dir}->{dst_dir}:{}", names.len()));
        let mut state = self.state.lock().unwrap();
        for name in names {
            let size = state
                .files
                .get(&join_path(src_dir, name))
                .copied()
                .ok_or_else(|| missing(name))?;
            state.files.insert(join_path(dst_dir, name), size);
        }
        Ok(())
    }

    async fn remove(&self, dir: &str, names: &[String]) -> Result<()> {
        self.record(format!("remove:{dir}:{}", names.len()));
        let mut state = self.state.lock().unwrap();
        for name in names {
            state.delete(&join_path(dir, name));
        }
        Ok(())
    }

    async fn add_offline_download(&self, uri: &str, dest: &str) -> Result<String> {
        self.record(format!("offline:{dest}"));
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_offline.clone() {
            return Err(Error::Remote { code: 500, message });
        }
        if !uri.starts_with("magnet:") {
            return Err(Error::InvalidUri(uri.to_string()));
        }
        state.ensure_dir(dest);
        for (relative, size) in state.payload.clone() {
            let path = join_path(dest, &relative);
            if let Some((parent, _)) = split_parent(&path) {
                state.ensure_dir(parent);
            }
            state.files.insert(path, size);
        }
        state.next_job += 1;
        Ok(format!("job-{}", state.next_job))
    }

    async fn query_job(&self, job_id: &str) -> Result<JobStatus> {
        self.record(format!("query:{job_id}"));
        let mut state = self.state.lock().unwrap();
        let status = if state.job_script.len() > 1 {
            state.job_script.pop_front()
        } else {
            state.job_script.front().cloned()
        };
        Ok(status.unwrap_or_else(|| job(1, None, None)))
    }

    async fn retry_job(&self, job_id: &str) -> Result<()> {
        self.record(format!("retry:{job_id}"));
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.record(format!("delete_job:{job_id}"));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

pub(crate) fn job(state: i64, progress: Option<u8>, error: Option<&str>) -> JobStatus {
    JobStatus {
        state,
        error: error.map(str::to_string),
        progress,
    }
}

/// Notifier that records every call
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) sent: Mutex<Vec<(String, String, NotificationKind)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        subscription: &Subscription,
        message: &str,
        kind: NotificationKind,
    ) -> Result<()> {
        self.sent.lock().unwrap().push((
            subscription.title.clone(),
            message.to_string(),
            kind,
        ));
        Ok(())
    }
}

/// Config with every delay zeroed
pub(crate) fn test_config() -> Config {
    Config {
        remote: RemoteConfig {
            host: "http://remote.test".into(),
            token: "token".into(),
            provider: "aria2".into(),
            download_path_template: "/media/anime".into(),
            min_call_interval: Duration::ZERO,
            ..RemoteConfig::default()
        },
        collection: CollectionConfig {
            retry_limit: 2,
            batch_pause: Duration::ZERO,
            rename_settle: Duration::ZERO,
            move_settle: Duration::ZERO,
            cleanup_settle: Duration::ZERO,
            finished_retention: Duration::from_secs(60),
            ..CollectionConfig::default()
        },
        ..Config::default()
    }
}

pub(crate) fn test_subscription() -> Subscription {
    Subscription {
        title: "Frieren".into(),
        season: 1,
        download_path: Some("/media/anime/Frieren".into()),
        notify: true,
        ..Subscription::default()
    }
}

/// Manager over `fs` with the default resolver and a recording notifier
pub(crate) fn create_test_manager_with(
    fs: Arc<MemoryFs>,
    config: Config,
) -> (CollectionManager, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let manager = CollectionManager::with_components(
        config,
        fs,
        Arc::new(EpisodePatternResolver::new().unwrap()),
        notifier.clone(),
    )
    .unwrap();
    (manager, notifier)
}

pub(crate) fn create_test_manager(fs: Arc<MemoryFs>) -> (CollectionManager, Arc<RecordingNotifier>) {
    create_test_manager_with(fs, test_config())
}
