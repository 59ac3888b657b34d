//! `quack status`: what is indexed and what changed since.

use anyhow::Result;
use std::path::Path;

use quackstack_core::changes::format_change_message;

use crate::config::Config;
use crate::index::CodeIndex;

/// Print a summary of `project`: store size, fragment and file counts,
/// the recorded generation, and pending changes under `root`.
pub async fn run_status(
    index: &CodeIndex,
    config: &Config,
    root: &Path,
    project: &str,
    json: bool,
) -> Result<()> {
    let status = index.status(root, project).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Quackstack index status");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Project:     {}", status.project);
    println!("  Fragments:   {}", status.fragments);
    println!("  Files:       {}", status.files);

    match &status.generation {
        Some(generation) => println!(
            "  Generation:  {} ({} terms, indexed {})",
            generation.generation,
            generation.vocabulary_size,
            format_ts_relative(generation.created_at / 1000)
        ),
        None => println!("  Generation:  none"),
    }

    let changes = match &status.changes {
        None => "not indexed".to_string(),
        Some(report) if !report.has_changes() => "up to date".to_string(),
        Some(report) => format!(
            "{} (run `quack ingest` to refresh)",
            format_change_message(report)
        ),
    };
    println!("  Changes:     {}", changes);
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a unix timestamp in seconds relative to now, e.g. "3 hours ago".
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_relative_times() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
