//! Flat layout: every selected file lands directly in the final directory

use super::batch::settle;
use super::{OrganizePlan, Organizer};
use crate::tree;

impl Organizer<'_> {
    /// Rename and move selected files, one parent directory at a time
    ///
    /// Returns the number of files moved.
    pub(super) async fn organize_flat(&self, plan: &OrganizePlan) -> usize {
        let selected = tree::selected_files(&plan.tree);
        if selected.is_empty() {
            tracing::warn!(temp = %plan.temp_path, "no files selected, nothing to move");
            return 0;
        }

        let mut moved = 0;
        for (dir, files) in Self::group_by_parent(&selected) {
            let names = self.rename_group(dir, &files).await;
            settle(self.config.rename_settle).await;

            if dir == plan.final_path {
                moved += names.len();
                continue;
            }
            moved += self.move_names(dir, &plan.final_path, &names).await.done;
            settle(self.config.move_settle).await;

            tracing::debug!(dir = %dir, count = names.len(), "moved directory contents");
        }

        tracing::info!(
            final_path = %plan.final_path,
            moved,
            selected = selected.len(),
            "flattened selected files"
        );
        moved
    }
}
