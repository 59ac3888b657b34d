//! Revision history enrichment from git.
//!
//! [`GitHistory`] shells out to the `git` binary, one `git log --follow`
//! per file. Anything that goes wrong (git missing, not a repository, an
//! untracked file) means no enrichment, never an error.
//!
//! Besides per-file revisions it answers repository-wide questions for
//! `quack history`: per-author activity ([`GitHistory::author_stats`]) and
//! files touched in the last few days ([`GitHistory::recently_changed`]).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use quackstack_core::models::RevisionInfo;

const LOG_FORMAT: &str = "--format=%H|%an|%ae|%aI|%s";

/// Per-file revision history provider.
pub trait RevisionHistory: Send + Sync {
    /// History for `path`, relative to the scan root. `None` when unknown.
    fn file_revision(&self, path: &str) -> Option<RevisionInfo>;

    /// The author with the most commits to `path`.
    fn file_owner(&self, path: &str) -> Option<FileOwner> {
        FileOwner::from_revision(&self.file_revision(path)?)
    }
}

/// Primary author of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOwner {
    pub author: String,
    pub email: String,
    pub commit_count: i64,
}

impl FileOwner {
    pub fn from_revision(info: &RevisionInfo) -> Option<Self> {
        Some(Self {
            author: info.primary_author.clone()?,
            email: info.primary_author_email.clone()?,
            commit_count: info.file_owner_commits.unwrap_or(0),
        })
    }
}

/// Repository-wide activity of one author, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorStats {
    pub author: String,
    pub email: String,
    pub total_commits: i64,
    pub recent_activity: Option<DateTime<Utc>>,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// A file touched within the requested window, with its newest commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentChange {
    pub file_path: String,
    pub last_modified: DateTime<Utc>,
    pub author: String,
}

/// Provider used when history is disabled.
pub struct NoHistory;

impl RevisionHistory for NoHistory {
    fn file_revision(&self, _path: &str) -> Option<RevisionInfo> {
        None
    }
}

/// Git-backed history for files under one scan root.
pub struct GitHistory {
    repo_root: PathBuf,
    scan_root: PathBuf,
    depth: usize,
}

impl GitHistory {
    /// Locate the repository containing `scan_root`.
    ///
    /// Returns `None` when git is not installed or `scan_root` is not
    /// inside a work tree.
    pub fn discover(scan_root: &Path, depth: usize) -> Option<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(scan_root)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if top.is_empty() {
            return None;
        }
        Some(Self {
            repo_root: PathBuf::from(top),
            scan_root: std::fs::canonicalize(scan_root).ok()?,
            depth: depth.max(1),
        })
    }

    /// Stdout of `git <args>` run at the repository root, `None` on failure.
    fn git<I, S>(&self, args: I) -> Option<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .ok()?;
        if !output.status.success() {
            tracing::debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git command failed"
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Commit counts, last activity, and line churn per author across all
    /// refs, most commits first. Empty when git fails.
    pub fn author_stats(&self) -> Vec<AuthorStats> {
        let Some(shortlog) = self.git(["shortlog", "-sne", "--all"]) else {
            return Vec::new();
        };
        let mut stats = parse_shortlog(&shortlog);
        for entry in &mut stats {
            let author = format!("--author={}", entry.email);
            if let Some(date) = self.git(["log", author.as_str(), "-1", "--format=%aI"]) {
                entry.recent_activity = DateTime::parse_from_rfc3339(date.trim())
                    .ok()
                    .map(|d| d.with_timezone(&Utc));
            }
            if let Some(numstat) = self.git(["log", author.as_str(), "--pretty=tformat:", "--numstat"]) {
                (entry.lines_added, entry.lines_removed) = parse_numstat(&numstat);
            }
        }
        stats.sort_by(|a, b| b.total_commits.cmp(&a.total_commits));
        stats
    }

    /// Files under the scan root committed within the last `days` days,
    /// newest first. Paths are relative to the scan root.
    pub fn recently_changed(&self, days: u32) -> Vec<RecentChange> {
        let since = Utc::now() - chrono::Duration::days(i64::from(days));
        let since = format!("--since={}", since.format("%Y-%m-%d"));
        let Some(log) = self.git(["log", since.as_str(), "--format=%aI|%an", "--name-only"]) else {
            return Vec::new();
        };
        parse_name_only_log(&log)
            .into_iter()
            .filter_map(|change| {
                let relative = self.relative_to_scan_root(&change.file_path)?;
                Some(RecentChange {
                    file_path: relative,
                    ..change
                })
            })
            .collect()
    }

    /// `repo_path` (relative to the repository root) expressed relative to
    /// the scan root, `None` when it lies outside.
    fn relative_to_scan_root(&self, repo_path: &str) -> Option<String> {
        let absolute = self.repo_root.join(repo_path);
        let relative = absolute.strip_prefix(&self.scan_root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl RevisionHistory for GitHistory {
    fn file_revision(&self, path: &str) -> Option<RevisionInfo> {
        let absolute = self.scan_root.join(path);
        let output = Command::new("git")
            .args(["log", "--follow", LOG_FORMAT, "-n"])
            .arg(self.depth.to_string())
            .arg("--")
            .arg(&absolute)
            .current_dir(&self.repo_root)
            .output()
            .ok()?;

        if !output.status.success() {
            tracing::debug!(
                file = path,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git log failed"
            );
            return None;
        }

        parse_log(&String::from_utf8_lossy(&output.stdout))
    }
}

struct Commit<'a> {
    hash: &'a str,
    author: &'a str,
    email: &'a str,
    date: Option<DateTime<Utc>>,
    message: String,
}

fn parse_commit(line: &str) -> Option<Commit<'_>> {
    let mut parts = line.splitn(5, '|');
    let hash = parts.next()?;
    let author = parts.next()?;
    let email = parts.next()?;
    let date = parts.next()?;
    let message = parts.next().unwrap_or("").to_string();
    if hash.is_empty() {
        return None;
    }
    Some(Commit {
        hash,
        author,
        email,
        date: DateTime::parse_from_rfc3339(date)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        message,
    })
}

/// Summarize `git log` output in `%H|%an|%ae|%aI|%s` format, newest first.
///
/// The primary author is the email with the most commits; ties go to the
/// author seen first (the most recent).
pub fn parse_log(output: &str) -> Option<RevisionInfo> {
    let commits: Vec<Commit> = output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(parse_commit)
        .collect();
    let last = commits.first()?;

    let mut order: Vec<&str> = Vec::new();
    let mut by_email: HashMap<&str, (&str, i64)> = HashMap::new();
    for c in &commits {
        by_email
            .entry(c.email)
            .and_modify(|(_, n)| *n += 1)
            .or_insert_with(|| {
                order.push(c.email);
                (c.author, 1)
            });
    }
    let mut primary: Option<(&str, &str, i64)> = None;
    for email in order {
        let (author, n) = by_email[email];
        if primary.map_or(true, |(_, _, best)| n > best) {
            primary = Some((email, author, n));
        }
    }

    Some(RevisionInfo {
        last_commit_hash: Some(last.hash.to_string()),
        last_commit_author: Some(last.author.to_string()),
        last_commit_email: Some(last.email.to_string()),
        last_commit_date: last.date,
        last_commit_message: Some(last.message.clone()),
        total_commits: Some(commits.len() as i64),
        primary_author: primary.map(|(_, a, _)| a.to_string()),
        primary_author_email: primary.map(|(e, _, _)| e.to_string()),
        file_owner_commits: primary.map(|(_, _, n)| n),
    })
}

/// Parse `git shortlog -sne` lines (`  12\tAnn Lee <ann@example.com>`).
///
/// Other fields start zeroed; order follows the input.
pub fn parse_shortlog(output: &str) -> Vec<AuthorStats> {
    output
        .lines()
        .filter_map(|line| {
            let (count, rest) = line.trim().split_once(char::is_whitespace)?;
            let total_commits = count.parse().ok()?;
            let (author, email) = rest.trim().rsplit_once('<')?;
            let email = email.strip_suffix('>')?;
            Some(AuthorStats {
                author: author.trim().to_string(),
                email: email.to_string(),
                total_commits,
                recent_activity: None,
                lines_added: 0,
                lines_removed: 0,
            })
        })
        .collect()
}

/// Sum `git log --numstat` output into `(added, removed)`.
///
/// Binary files report `-` and count as zero.
pub fn parse_numstat(output: &str) -> (u64, u64) {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let added = fields.next()?.parse().unwrap_or(0);
            let removed = fields.next()?.parse().unwrap_or(0);
            Some((added, removed))
        })
        .fold((0, 0), |(a, r), (da, dr)| (a + da, r + dr))
}

/// Parse `git log --format=%aI|%an --name-only` into one entry per file
/// carrying its newest commit, newest first (ties by path).
pub fn parse_name_only_log(output: &str) -> Vec<RecentChange> {
    let mut latest: HashMap<&str, (DateTime<Utc>, &str)> = HashMap::new();
    let mut current: Option<(DateTime<Utc>, &str)> = None;
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let header = line.split_once('|').and_then(|(date, author)| {
            let date = DateTime::parse_from_rfc3339(date).ok()?;
            Some((date.with_timezone(&Utc), author))
        });
        if header.is_some() {
            current = header;
            continue;
        }
        let Some((date, author)) = current else {
            continue;
        };
        latest
            .entry(line)
            .and_modify(|seen| {
                if date > seen.0 {
                    *seen = (date, author);
                }
            })
            .or_insert((date, author));
    }

    let mut changes: Vec<RecentChange> = latest
        .into_iter()
        .map(|(path, (date, author))| RecentChange {
            file_path: path.to_string(),
            last_modified: date,
            author: author.to_string(),
        })
        .collect();
    changes.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LOG: &str = "\
c3|Bob|bob@example.com|2024-05-03T10:00:00+02:00|fix: handle empty|input
b2|Ann|ann@example.com|2024-04-01T09:00:00Z|refactor loader
a1|Ann|ann@example.com|2024-03-01T09:00:00Z|initial commit
";

    #[test]
    fn test_parse_log_summary() {
        let info = parse_log(LOG).unwrap();
        assert_eq!(info.last_commit_hash.as_deref(), Some("c3"));
        assert_eq!(info.last_commit_author.as_deref(), Some("Bob"));
        assert_eq!(info.last_commit_message.as_deref(), Some("fix: handle empty|input"));
        assert_eq!(
            info.last_commit_date,
            Some(Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap())
        );
        assert_eq!(info.total_commits, Some(3));
        assert_eq!(info.primary_author.as_deref(), Some("Ann"));
        assert_eq!(info.primary_author_email.as_deref(), Some("ann@example.com"));
        assert_eq!(info.file_owner_commits, Some(2));
    }

    #[test]
    fn test_primary_author_tie_prefers_most_recent() {
        let log = "b|Bob|bob@x|2024-01-02T00:00:00Z|two\na|Ann|ann@x|2024-01-01T00:00:00Z|one\n";
        let info = parse_log(log).unwrap();
        assert_eq!(info.primary_author_email.as_deref(), Some("bob@x"));
    }

    #[test]
    fn test_empty_log_is_none() {
        assert!(parse_log("").is_none());
        assert!(parse_log("\n\n").is_none());
    }

    #[test]
    fn test_no_history_provider() {
        assert!(NoHistory.file_revision("a.ts").is_none());
    }

    #[test]
    fn test_file_owner_from_revision() {
        struct Fixed;
        impl RevisionHistory for Fixed {
            fn file_revision(&self, _path: &str) -> Option<RevisionInfo> {
                parse_log(LOG)
            }
        }
        let owner = Fixed.file_owner("a.ts").unwrap();
        assert_eq!(owner.author, "Ann");
        assert_eq!(owner.email, "ann@example.com");
        assert_eq!(owner.commit_count, 2);
        assert!(NoHistory.file_owner("a.ts").is_none());
    }

    #[test]
    fn test_parse_shortlog() {
        let out = "    12\tAnn Lee <ann@example.com>\n     3\tBob <bob@example.com>\ngarbage\n";
        let stats = parse_shortlog(out);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].author, "Ann Lee");
        assert_eq!(stats[0].email, "ann@example.com");
        assert_eq!(stats[0].total_commits, 12);
        assert_eq!(stats[1].total_commits, 3);
    }

    #[test]
    fn test_parse_numstat_skips_binary_counts() {
        let out = "10\t2\tsrc/a.ts\n\n-\t-\tlogo.png\n3\t0\tsrc/b.ts\n";
        assert_eq!(parse_numstat(out), (13, 2));
    }

    #[test]
    fn test_parse_name_only_log_keeps_newest_commit_per_file() {
        let out = "\
2024-05-03T10:00:00Z|Bob

src/a.ts
src/b.ts

2024-05-01T10:00:00Z|Ann

src/a.ts
src/c.ts
";
        let changes = parse_name_only_log(out);
        let paths: Vec<&str> = changes.iter().map(|c| c.file_path.as_str()).collect();
        assert_eq!(paths, ["src/a.ts", "src/b.ts", "src/c.ts"]);
        assert_eq!(changes[0].author, "Bob");
        assert_eq!(changes[2].author, "Ann");
    }

    fn git_in(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_repository_wide_activity() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // Skip where git is unavailable.
        if !git_in(root, &["init", "-q"]) {
            return;
        }
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/a.ts"), "const a = 1;\nconst b = 2;\n").unwrap();
        assert!(git_in(root, &["add", "."]));
        assert!(git_in(
            root,
            &[
                "-c", "user.name=Ann", "-c", "user.email=ann@example.com",
                "commit", "-q", "-m", "initial",
            ],
        ));

        let history = GitHistory::discover(&root.join("src"), 10).unwrap();
        let stats = history.author_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].email, "ann@example.com");
        assert_eq!(stats[0].total_commits, 1);
        assert_eq!(stats[0].lines_added, 2);
        assert!(stats[0].recent_activity.is_some());

        let recent = history.recently_changed(7);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].file_path, "a.ts");
        assert_eq!(recent[0].author, "Ann");

        assert_eq!(history.file_owner("a.ts").unwrap().email, "ann@example.com");
    }

    #[test]
    fn test_discover_outside_repository() {
        let dir = tempfile::tempdir().unwrap();
        // The temp dir is not a work tree unless the system tmp is inside one.
        if let Some(history) = GitHistory::discover(dir.path(), 10) {
            assert!(history.file_revision("missing.ts").is_none());
        }
    }
}
