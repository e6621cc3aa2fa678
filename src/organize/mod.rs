//! Organize engine
//!
//! Turns a reviewed file tree into remote mutations: rename selected files, move them
//! into the final directory (flat, or keeping the release's layout), delete everything
//! that was not selected, and remove the task's temp directory.
//!
//! Every mutation runs through [`batch::for_each_chunk`], so a rejected batch degrades
//! to single-item calls instead of aborting the run.

use std::collections::BTreeMap;

use crate::config::CollectionConfig;
use crate::error::Result;
use crate::remote::RemoteFs;
use crate::tree::{self, FileNode};

pub(crate) mod batch;
mod cleanup;
mod flatten;
mod structured;

pub use structured::target_directory;

/// Everything needed to organize one task
#[derive(Debug, Clone)]
pub struct OrganizePlan {
    /// Working directory holding the download
    pub temp_path: String,
    /// Destination directory
    pub final_path: String,
    /// Reviewed tree (selection and new names applied)
    pub tree: Vec<FileNode>,
    /// Keep the release's directory layout under `final_path`
    pub keep_directory_structure: bool,
    /// Original directory path -> replacement directory name
    pub directory_rename_overrides: BTreeMap<String, String>,
}

/// Counts from a completed organize run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    /// Selected files in the plan
    pub selected: usize,
    /// Selected files moved into the final location
    pub moved: usize,
    /// Selected files skipped because every move attempt failed
    pub unmoved: usize,
    /// Unselected files deleted
    pub deleted: usize,
    /// Whether the temp directory was removed
    pub temp_cleaned: bool,
}

/// Executes [`OrganizePlan`]s against a remote host
pub struct Organizer<'a> {
    pub(crate) remote: &'a dyn RemoteFs,
    pub(crate) config: &'a CollectionConfig,
}

impl<'a> Organizer<'a> {
    /// Create an organizer pacing its calls per `config`
    pub fn new(remote: &'a dyn RemoteFs, config: &'a CollectionConfig) -> Self {
        Self { remote, config }
    }

    /// Run the plan
    ///
    /// Fails only when the final directory cannot be created. Files whose moves keep
    /// failing are logged, counted in [`OrganizeReport::unmoved`] and skipped; deletion
    /// and temp cleanup still run.
    pub async fn run(&self, plan: &OrganizePlan) -> Result<OrganizeReport> {
        self.remote.make_directory(&plan.final_path).await?;

        let selected = tree::selected_files(&plan.tree).len();
        let moved = if plan.keep_directory_structure {
            self.organize_structured(plan).await
        } else {
            self.organize_flat(plan).await
        };

        let unmoved = selected.saturating_sub(moved);
        if unmoved > 0 {
            tracing::warn!(
                unmoved,
                selected,
                temp = %plan.temp_path,
                "some selected files could not be moved, skipping them"
            );
        }

        let deleted = self.delete_unselected(&plan.tree).await;
        let temp_cleaned = self.remove_temp_tree(&plan.temp_path).await;

        Ok(OrganizeReport {
            selected,
            moved,
            unmoved,
            deleted,
            temp_cleaned,
        })
    }

    async fn delete_unselected(&self, tree: &[FileNode]) -> usize {
        let mut by_parent: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for file in tree::unselected_files(tree) {
            if file.parent_path.trim().is_empty() || file.name.trim().is_empty() {
                continue;
            }
            by_parent
                .entry(file.parent_path.as_str())
                .or_default()
                .push(file.name.clone());
        }

        let mut deleted = 0;
        for (dir, names) in by_parent {
            deleted += self.remove_names(dir, &names).await.done;
        }
        if deleted > 0 {
            tracing::debug!(count = deleted, "deleted unselected files");
        }
        deleted
    }

    /// Group selected files by parent directory, keeping first-seen order
    fn group_by_parent<'t>(files: &[&'t FileNode]) -> Vec<(&'t str, Vec<&'t FileNode>)> {
        let mut groups: Vec<(&str, Vec<&FileNode>)> = Vec::new();
        for &file in files {
            match groups.iter_mut().find(|(dir, _)| *dir == file.parent_path) {
                Some((_, members)) => members.push(file),
                None => groups.push((file.parent_path.as_str(), vec![file])),
            }
        }
        groups
    }

    /// Rename `files` inside `dir` and return each file's resulting name
    ///
    /// Files whose rename failed keep their current name so they can still be moved.
    async fn rename_group(&self, dir: &str, files: &[&FileNode]) -> Vec<String> {
        let renames: Vec<(String, String)> = files
            .iter()
            .map(|f| (f.name.clone(), f.target_name()))
            .collect();
        let report = self.rename_in(dir, &renames).await;
        renames
            .into_iter()
            .map(|(old, new)| {
                if report.failed.iter().any(|(failed_old, _)| *failed_old == old) {
                    old
                } else {
                    new
                }
            })
            .collect()
    }
}
