//! File tree model and builder
//!
//! A completed download is listed recursively into an owned forest of [`FileNode`]s.
//! Video files are pre-selected and given canonical names; the caller may then adjust
//! selection and names before the tree drives the organize step.

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::remote::{RemoteEntry, RemoteFs};
use crate::resolver::NameResolver;
use crate::types::Subscription;
use crate::utils::{extension_of, is_video_file, join_path, normalize_remote_path};

/// One remote file or directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    /// Full remote path
    pub path: String,
    /// Current name
    pub name: String,
    /// Directory containing this node
    pub parent_path: String,
    /// Whether this node is a directory
    pub is_directory: bool,
    /// Size in bytes (files only)
    #[serde(default)]
    pub size: u64,
    /// Depth below the listed root (root children are level 1)
    #[serde(default)]
    pub level: u32,
    /// Whether the file is kept; informational for directories
    #[serde(default)]
    pub selected: bool,
    /// Resolved episode number (video files only)
    #[serde(default)]
    pub episode: Option<f64>,
    /// Name as downloaded
    pub original_name: String,
    /// Requested name; absent or blank keeps the original
    #[serde(default)]
    pub new_name: Option<String>,
    /// Child nodes (directories only)
    #[serde(default)]
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Create an unselected node for a listing entry found in `dir`
    pub fn from_entry(entry: &RemoteEntry, dir: &str, level: u32) -> Self {
        Self {
            path: join_path(dir, &entry.name),
            name: entry.name.clone(),
            parent_path: dir.to_string(),
            is_directory: entry.is_dir,
            size: if entry.is_dir { 0 } else { entry.size },
            level,
            selected: false,
            episode: None,
            original_name: entry.name.clone(),
            new_name: None,
            children: Vec::new(),
        }
    }

    /// Name the file will carry after organizing
    ///
    /// Blank or absent `new_name` keeps the current name. The original extension is
    /// appended unless the new name already ends with it.
    pub fn target_name(&self) -> String {
        let candidate = match self.new_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return self.name.clone(),
        };
        let ext = extension_of(&self.name);
        if ext.is_empty() || candidate.ends_with(&format!(".{ext}")) {
            candidate.to_string()
        } else {
            format!("{candidate}.{ext}")
        }
    }
}

/// Visit every node depth-first, parents before children
pub fn walk<'a>(nodes: &'a [FileNode], visit: &mut impl FnMut(&'a FileNode)) {
    for node in nodes {
        visit(node);
        walk(&node.children, visit);
    }
}

/// Mutable counterpart of [`walk`]
pub fn walk_mut(nodes: &mut [FileNode], visit: &mut impl FnMut(&mut FileNode)) {
    for node in nodes {
        visit(node);
        walk_mut(&mut node.children, visit);
    }
}

/// Every non-directory node, in tree order
pub fn files(nodes: &[FileNode]) -> Vec<&FileNode> {
    let mut out = Vec::new();
    walk(nodes, &mut |node| {
        if !node.is_directory {
            out.push(node);
        }
    });
    out
}

/// Selected non-directory nodes, in tree order
pub fn selected_files(nodes: &[FileNode]) -> Vec<&FileNode> {
    files(nodes).into_iter().filter(|n| n.selected).collect()
}

/// Unselected non-directory nodes, in tree order
pub fn unselected_files(nodes: &[FileNode]) -> Vec<&FileNode> {
    files(nodes).into_iter().filter(|n| !n.selected).collect()
}

/// Normalize every node's path and parent path in place
pub fn normalize_paths(nodes: &mut [FileNode]) {
    walk_mut(nodes, &mut |node| {
        node.path = normalize_remote_path(&node.path);
        node.parent_path = normalize_remote_path(&node.parent_path);
    });
}

/// Copy caller edits (`selected`, `new_name`) onto the stored tree, matched by path
///
/// Structure, sizes and episodes stay as built. Returns the number of nodes updated.
pub fn apply_edits(tree: &mut [FileNode], edits: &[FileNode]) -> usize {
    let mut by_path: HashMap<String, (bool, Option<String>)> = HashMap::new();
    walk(edits, &mut |node| {
        by_path.insert(
            normalize_remote_path(&node.path),
            (node.selected, node.new_name.clone()),
        );
    });

    let mut updated = 0;
    walk_mut(tree, &mut |node| {
        if let Some((selected, new_name)) = by_path.get(&node.path) {
            node.selected = *selected;
            if !node.is_directory {
                node.new_name = new_name.clone();
            }
            updated += 1;
        }
    });
    updated
}

/// Builds a [`FileNode`] forest from a remote directory
pub struct TreeBuilder<'a> {
    remote: &'a dyn RemoteFs,
    resolver: &'a dyn NameResolver,
    subscription: &'a Subscription,
}

impl<'a> TreeBuilder<'a> {
    /// Create a builder resolving names for `subscription`
    pub fn new(
        remote: &'a dyn RemoteFs,
        resolver: &'a dyn NameResolver,
        subscription: &'a Subscription,
    ) -> Self {
        Self {
            remote,
            resolver,
            subscription,
        }
    }

    /// List `root` recursively and assign selections and names
    ///
    /// Any listing failure, at the root or below it, fails the whole build.
    pub async fn build(&self, root: &str) -> Result<Vec<FileNode>> {
        let root = normalize_remote_path(root);
        let mut nodes = self.list_level(root, 1).await?;
        self.assign_names(&mut nodes);
        tracing::debug!(
            files = files(&nodes).len(),
            selected = selected_files(&nodes).len(),
            "built file tree"
        );
        Ok(nodes)
    }

    fn list_level(&self, dir: String, level: u32) -> BoxFuture<'_, Result<Vec<FileNode>>> {
        async move {
            let entries = self.remote.list(&dir).await?;
            let mut nodes = Vec::with_capacity(entries.len());
            for entry in &entries {
                let mut node = FileNode::from_entry(entry, &dir, level);
                if node.is_directory {
                    node.selected = true;
                    node.children = self.list_level(node.path.clone(), level + 1).await?;
                } else if is_video_file(&node.name) {
                    node.selected = true;
                    match self.resolver.resolve(&node.name, self.subscription) {
                        Ok(resolution) => node.episode = resolution.episode,
                        Err(e) => {
                            tracing::debug!(file = %node.name, error = %e, "episode not resolved");
                        }
                    }
                }
                nodes.push(node);
            }
            Ok(nodes)
        }
        .boxed()
    }

    // Runs after the whole tree exists so one resolver failure cannot abort listing.
    fn assign_names(&self, nodes: &mut [FileNode]) {
        walk_mut(nodes, &mut |node| {
            if node.is_directory || !node.selected || node.episode.is_none() {
                return;
            }
            let canonical = match self.resolver.resolve(&node.name, self.subscription) {
                Ok(resolution) => resolution.canonical_name,
                Err(e) => {
                    tracing::debug!(file = %node.name, error = %e, "canonical name not resolved");
                    None
                }
            };
            let Some(canonical) = canonical.filter(|c| !c.trim().is_empty()) else {
                return;
            };
            let ext = extension_of(&node.name);
            node.new_name = Some(if ext.is_empty() {
                canonical
            } else {
                format!("{canonical}.{ext}")
            });
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::EpisodePatternResolver;
    use crate::test_helpers::MemoryFs;

    fn file(path: &str, name: &str) -> FileNode {
        FileNode {
            path: join_path(path, name),
            name: name.into(),
            parent_path: path.into(),
            is_directory: false,
            size: 1,
            level: 1,
            selected: true,
            episode: None,
            original_name: name.into(),
            new_name: None,
            children: vec![],
        }
    }

    #[test]
    fn target_name_preserves_extension() {
        let mut node = file("/t", "[Group] Show - 01.mkv");
        assert_eq!(node.target_name(), "[Group] Show - 01.mkv");

        node.new_name = Some("Show S01E01".into());
        assert_eq!(node.target_name(), "Show S01E01.mkv");

        node.new_name = Some("Show S01E01.mkv".into());
        assert_eq!(node.target_name(), "Show S01E01.mkv");

        node.new_name = Some("   ".into());
        assert_eq!(node.target_name(), "[Group] Show - 01.mkv");

        let mut bare = file("/t", "README");
        bare.new_name = Some("notes".into());
        assert_eq!(bare.target_name(), "notes");
    }

    #[test]
    fn apply_edits_matches_normalized_paths() {
        let mut tree = vec![file("/t", "a.mkv"), file("/t", "b.mkv")];
        let mut edit = file("D:/t", "b.mkv");
        edit.path = "D:/t/b.mkv".into();
        edit.selected = false;
        edit.new_name = Some("renamed".into());
        edit.size = 999;

        assert_eq!(apply_edits(&mut tree, &[edit]), 1);
        assert!(tree[0].selected);
        assert!(!tree[1].selected);
        assert_eq!(tree[1].new_name.as_deref(), Some("renamed"));
        assert_eq!(tree[1].size, 1);
    }

    #[tokio::test]
    async fn builds_nested_tree_with_selection_and_names() {
        let fs = MemoryFs::new();
        fs.seed_file("/tmp/task/Release/[Grp] Frieren - 01 [1080p].mkv", 900);
        fs.seed_file("/tmp/task/Release/[Grp] Frieren - 02 [1080p].mkv", 800);
        fs.seed_file("/tmp/task/Release/Fonts/font.ttf", 5);
        fs.seed_file("/tmp/task/Release/[Grp] Frieren OP.mkv", 100);
        fs.seed_file("/tmp/task/readme.txt", 1);

        let resolver = EpisodePatternResolver::new().unwrap();
        let sub = Subscription {
            title: "Frieren".into(),
            ..Subscription::default()
        };
        let tree = TreeBuilder::new(&fs, &resolver, &sub)
            .build("/tmp/task")
            .await
            .unwrap();

        assert_eq!(tree.len(), 2);
        let release = tree.iter().find(|n| n.is_directory).unwrap();
        assert_eq!(release.level, 1);
        assert!(release.selected);
        assert_eq!(release.path, "/tmp/task/Release");

        let all = files(&tree);
        assert_eq!(all.len(), 5);

        let ep1 = all.iter().find(|n| n.name.contains("- 01")).unwrap();
        assert_eq!(ep1.level, 2);
        assert_eq!(ep1.parent_path, "/tmp/task/Release");
        assert_eq!(ep1.episode, Some(1.0));
        assert_eq!(ep1.new_name.as_deref(), Some("Frieren S01E01.mkv"));

        let op = all.iter().find(|n| n.name.contains("OP")).unwrap();
        assert!(op.selected, "videos are selected even without an episode");
        assert!(op.episode.is_none());
        assert!(op.new_name.is_none());

        let font = all.iter().find(|n| n.name == "font.ttf").unwrap();
        assert!(!font.selected);
        assert_eq!(font.level, 3);

        let readme = all.iter().find(|n| n.name == "readme.txt").unwrap();
        assert!(!readme.selected);
    }

    #[tokio::test]
    async fn listing_failure_fails_the_build() {
        let fs = MemoryFs::new();
        let resolver = EpisodePatternResolver::new().unwrap();
        let sub = Subscription::default();
        let result = TreeBuilder::new(&fs, &resolver, &sub)
            .build("/does/not/exist")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn nested_listing_failure_fails_the_build() {
        let fs = MemoryFs::new();
        fs.seed_file("/root/A/ep01.mkv", 10);
        fs.fail_list("/root/A");
        let resolver = EpisodePatternResolver::new().unwrap();
        let sub = Subscription::default();
        let result = TreeBuilder::new(&fs, &resolver, &sub).build("/root").await;
        assert!(result.is_err());
    }
}
