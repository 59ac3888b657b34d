//! Change detection against the working tree.
//!
//! Compares what the store last indexed with what the scanner sees now.
//! Classification itself lives in [`quackstack_core::changes`]; this module
//! only gathers the inputs.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use quackstack_core::changes::{classify_changes, CurrentFile};
use quackstack_core::models::ChangeReport;
use quackstack_core::store::SnippetStore;

use crate::scanner::Scanner;

/// Report changes under `root` since `project` was last indexed.
///
/// `None` when the project has never been indexed or when anything fails
/// along the way; failures are logged, never returned.
pub async fn detect_changes(
    store: &dyn SnippetStore,
    scanner: &Scanner,
    root: &Path,
    project: &str,
) -> Option<ChangeReport> {
    match try_detect(store, scanner, root, project).await {
        Ok(report) => report,
        Err(e) => {
            warn!(project, error = %e, "change detection failed");
            None
        }
    }
}

async fn try_detect(
    store: &dyn SnippetStore,
    scanner: &Scanner,
    root: &Path,
    project: &str,
) -> Result<Option<ChangeReport>> {
    let indexed = store.indexed_files(project).await?;
    if indexed.is_empty() {
        return Ok(None);
    }

    // Files ingestion cannot segment never reach the index, so they are
    // not new either.
    let current: Vec<CurrentFile> = scanner
        .scan(root)?
        .into_iter()
        .filter(|file| file.is_indexable())
        .map(|file| {
            let modified_at = file
                .modified_millis()
                .map_err(|e| debug!(file = %file.relative_path, error = %e, "mtime unavailable"))
                .ok();
            CurrentFile {
                path: file.relative_path,
                modified_at,
            }
        })
        .collect();

    Ok(classify_changes(&indexed, &current))
}
