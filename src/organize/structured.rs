//! Structure-preserving layout: the release's directories are recreated under the
//! final directory

use std::collections::{BTreeMap, HashMap, HashSet};

use super::batch::settle;
use super::{OrganizePlan, Organizer};
use crate::tree::{self, FileNode};
use crate::utils::{
    collapse_slashes, file_name_of, join_path, normalize_remote_path, trim_trailing_slash,
};

/// Files moving from one source directory into one target directory
#[derive(Debug)]
struct MoveOperation {
    source: String,
    target: String,
    names: Vec<String>,
}

/// Directory a file from `parent_dir` should land in
///
/// The file's directory relative to `temp_root` is appended to `final_path`. Each
/// override whose key occurs in `parent_dir` replaces the path segment named like the
/// key's last component. When `skipped_root` is set (the release is wrapped in a single
/// directory), the wrapper segment is dropped unless an override renamed it.
///
/// # Examples
///
/// ```
/// use collection_dl::organize::target_directory;
/// use std::collections::BTreeMap;
///
/// let overrides = BTreeMap::from([("/tmp/t/Disc A".to_string(), "Season 02".to_string())]);
/// assert_eq!(
///     target_directory("/lib/Show", "/tmp/t", None, "/tmp/t/Disc A/Extras", &overrides),
///     "/lib/Show/Season 02/Extras"
/// );
/// ```
pub fn target_directory(
    final_path: &str,
    temp_root: &str,
    skipped_root: Option<&str>,
    parent_dir: &str,
    overrides: &BTreeMap<String, String>,
) -> String {
    let temp_root = trim_trailing_slash(temp_root);
    let relative = match parent_dir.strip_prefix(temp_root) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => "",
    };

    // (segment, overridden)
    let mut segments: Vec<(String, bool)> = relative
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| (s.to_string(), false))
        .collect();

    for (key, value) in overrides {
        let key = normalize_remote_path(key);
        let key = trim_trailing_slash(&key);
        let value = value.trim();
        if key.is_empty() || value.is_empty() || !parent_dir.contains(key) {
            continue;
        }
        let old = file_name_of(key);
        for segment in segments.iter_mut().filter(|(name, _)| name == old) {
            *segment = (value.to_string(), true);
        }
    }

    if skipped_root.is_some() && segments.first().is_some_and(|(_, overridden)| !overridden) {
        segments.remove(0);
    }

    let relative: Vec<&str> = segments.iter().map(|(name, _)| name.as_str()).collect();
    let target = collapse_slashes(&format!("{}/{}", final_path, relative.join("/")));
    trim_trailing_slash(&target).to_string()
}

impl Organizer<'_> {
    /// Rename selected files in place, then move them into mirrored directories
    ///
    /// Returns the number of files moved.
    pub(super) async fn organize_structured(&self, plan: &OrganizePlan) -> usize {
        let selected = tree::selected_files(&plan.tree);
        if selected.is_empty() {
            tracing::warn!(temp = %plan.temp_path, "no files selected, nothing to move");
            return 0;
        }

        let skipped_root = self.single_root(&plan.temp_path, &selected).await;

        let mut names_after_rename: HashMap<&str, String> = HashMap::new();
        for (dir, files) in Self::group_by_parent(&selected) {
            let names = self.rename_group(dir, &files).await;
            for (&file, name) in files.iter().zip(names) {
                names_after_rename.insert(file.path.as_str(), name);
            }
        }
        settle(self.config.rename_settle).await;

        let mut operations: Vec<MoveOperation> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        for file in &selected {
            let target = target_directory(
                &plan.final_path,
                &plan.temp_path,
                skipped_root.as_deref(),
                &file.parent_path,
                &plan.directory_rename_overrides,
            );
            let name = names_after_rename
                .get(file.path.as_str())
                .cloned()
                .unwrap_or_else(|| file.name.clone());
            let key = (file.parent_path.clone(), target.clone());
            match index.get(&key) {
                Some(&i) => operations[i].names.push(name),
                None => {
                    index.insert(key, operations.len());
                    operations.push(MoveOperation {
                        source: file.parent_path.clone(),
                        target,
                        names: vec![name],
                    });
                }
            }
        }

        let mut created: HashSet<String> = HashSet::new();
        let mut moved = 0;
        for op in &operations {
            if created.insert(op.target.clone())
                && let Err(e) = self.remote.make_directory(&op.target).await
            {
                tracing::warn!(dir = %op.target, error = %e, "could not create target directory");
            }
            moved += self.move_names(&op.source, &op.target, &op.names).await.done;
            tracing::debug!(src = %op.source, dst = %op.target, count = op.names.len(), "moved files");
        }
        settle(self.config.move_settle).await;

        tracing::info!(
            final_path = %plan.final_path,
            moved,
            selected = selected.len(),
            operations = operations.len(),
            "organized selected files preserving structure"
        );
        moved
    }

    /// Detect a release wrapped in one top-level directory
    ///
    /// Returns that directory when the temp root holds exactly one entry, it is a
    /// directory, and every selected file lives below it.
    async fn single_root(&self, temp_path: &str, selected: &[&FileNode]) -> Option<String> {
        let entries = match self.remote.list(temp_path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(temp = %temp_path, error = %e, "could not list temp root, keeping full layout");
                return None;
            }
        };
        let [only] = entries.as_slice() else {
            return None;
        };
        if !only.is_dir {
            return None;
        }
        let root = join_path(trim_trailing_slash(temp_path), &only.name);
        let prefix = format!("{root}/");
        if selected.iter().all(|f| f.path.starts_with(&prefix)) {
            tracing::debug!(root = %root, "skipping single top-level directory");
            Some(root)
        } else {
            None
        }
    }
}
