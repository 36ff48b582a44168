//! Workspace scan that seeds the file-type allow-list.

use std::path::Path;

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::filter::{is_ignored, suffix_of, FileTypeSet};

/// Collect the suffixes of every non-ignored file under `workspace`.
///
/// Uses the same ignore set as extraction, so suffixes that only occur
/// inside `node_modules`, `.git` and the like are not reported. Symlinks
/// are not followed.
pub fn detect_file_types(workspace: &Path) -> FileTypeSet {
    let walker = WalkBuilder::new(workspace)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            entry.depth() == 0 || !is_ignored(entry.path(), is_dir)
        })
        .build();

    let mut found = FileTypeSet::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry during detection: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Some(suffix) = suffix_of(entry.path()) {
            // Suffixes that fail normalization (e.g. containing spaces) are dropped.
            let _ = found.insert(&suffix);
        }
    }

    debug!(workspace = %workspace.display(), types = %found, "detected file types");
    found
}
