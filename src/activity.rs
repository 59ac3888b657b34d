//! `quack history`: who works on the project and what moved recently.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::history::{AuthorStats, FileOwner, GitHistory, RecentChange, RevisionHistory};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityReport {
    authors: Vec<AuthorStats>,
    recent_files: Vec<RecentChange>,
    recent_days: u32,
}

/// Print author activity and files changed within `days` for the
/// repository containing `root`, or the owner of `file` when given.
pub fn run_history(
    root: &Path,
    depth: usize,
    days: u32,
    file: Option<&str>,
    json: bool,
) -> Result<()> {
    let Some(history) = GitHistory::discover(root, depth) else {
        bail!("{} is not inside a git work tree", root.display());
    };

    if let Some(path) = file {
        let owner = history.file_owner(path);
        if json {
            println!("{}", serde_json::to_string_pretty(&owner)?);
        } else {
            println!("{}", owner_line(path, owner.as_ref()));
        }
        return Ok(());
    }

    let report = ActivityReport {
        authors: history.author_stats(),
        recent_files: history.recently_changed(days),
        recent_days: days,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Authors");
    println!("=======");
    if report.authors.is_empty() {
        println!("  (none)");
    }
    for author in &report.authors {
        let last = author
            .recent_activity
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:>5} commits  +{} -{}  last {}",
            format!("{} <{}>", author.author, author.email),
            author.total_commits,
            author.lines_added,
            author.lines_removed,
            last
        );
    }
    println!();
    println!("Changed in the last {} days", days);
    println!("===========================");
    if report.recent_files.is_empty() {
        println!("  (none)");
    }
    for change in &report.recent_files {
        println!(
            "  {}  {}  {}",
            change.last_modified.format("%Y-%m-%d"),
            change.file_path,
            change.author
        );
    }
    Ok(())
}

fn owner_line(path: &str, owner: Option<&FileOwner>) -> String {
    match owner {
        Some(owner) => format!(
            "{}: {} <{}> ({} commit{})",
            path,
            owner.author,
            owner.email,
            owner.commit_count,
            if owner.commit_count == 1 { "" } else { "s" }
        ),
        None => format!("{}: no history", path),
    }
}
