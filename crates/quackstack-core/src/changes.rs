//! Change classification between the indexed snapshot and the live tree.
//!
//! Pure set logic: the caller supplies what the store knows and what the
//! scanner found, and [`classify_changes`] counts new, modified, and deleted
//! files. File-system access lives in the application crate.

use std::collections::HashSet;

use crate::models::ChangeReport;

/// A path known to the index, with the latest `updated_at` (unix ms) of its
/// fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub path: String,
    pub updated_at: i64,
}

/// A path found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentFile {
    pub path: String,
    /// Modification time in unix ms, `None` when it could not be read.
    pub modified_at: Option<i64>,
}

/// Classify `current` against `indexed`.
///
/// Returns `None` when nothing is indexed. The last index time is the
/// maximum `updated_at` across all indexed files; an indexed file whose
/// mtime is strictly newer counts as modified. A file whose mtime is
/// unknown is neither new nor modified.
pub fn classify_changes(indexed: &[IndexedFile], current: &[CurrentFile]) -> Option<ChangeReport> {
    let last_index_time = indexed.iter().map(|f| f.updated_at).max()?;
    let indexed_paths: HashSet<&str> = indexed.iter().map(|f| f.path.as_str()).collect();
    let current_paths: HashSet<&str> = current.iter().map(|f| f.path.as_str()).collect();

    let mut new_files = 0;
    let mut modified_files = 0;
    for file in current {
        if !indexed_paths.contains(file.path.as_str()) {
            new_files += 1;
        } else if file.modified_at.is_some_and(|m| m > last_index_time) {
            modified_files += 1;
        }
    }

    let deleted_files = indexed_paths
        .iter()
        .filter(|p| !current_paths.contains(*p))
        .count();

    Some(ChangeReport::new(new_files, modified_files, deleted_files))
}

/// Human summary such as `"2 new files, 1 modified file"`.
///
/// Empty when the report has no changes.
pub fn format_change_message(report: &ChangeReport) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (report.new_files, "new"),
        (report.modified_files, "modified"),
        (report.deleted_files, "deleted"),
    ] {
        if count > 0 {
            let plural = if count > 1 { "s" } else { "" };
            parts.push(format!("{} {} file{}", count, label, plural));
        }
    }
    parts.join(", ")
}
