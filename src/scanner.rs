//! Source file enumeration.
//!
//! Shared by ingestion and change detection so both see the same file set.
//! Paths are reported relative to the scan root with `/` separators, sorted.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;

/// A source file found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the root, `/`-separated. This is the fragment `file_path`.
    pub relative_path: String,
    pub path: PathBuf,
    /// Extension including the dot, e.g. `.ts`.
    pub language: String,
}

impl SourceFile {
    /// Modification time in unix milliseconds.
    pub fn modified_millis(&self) -> Result<i64> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        let millis = modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Ok(millis as i64)
    }

    /// Whether ingestion can produce fragments from this file: it opens
    /// and is not empty.
    pub fn is_indexable(&self) -> bool {
        let non_empty = std::fs::metadata(&self.path).is_ok_and(|m| m.len() > 0);
        non_empty && std::fs::File::open(&self.path).is_ok()
    }
}

pub struct Scanner {
    extensions: HashSet<String>,
    ignore_dirs: HashSet<String>,
    exclude_set: GlobSet,
    follow_symlinks: bool,
}

impl Scanner {
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            extensions: config.extensions.iter().cloned().collect(),
            ignore_dirs: config.ignore_dirs.iter().cloned().collect(),
            exclude_set: build_globset(&config.exclude_globs)?,
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// Enumerate matching files under `root`.
    ///
    /// Fails if `root` is not a readable directory. Unreadable entries
    /// below it are skipped with a warning.
    pub fn scan(&self, root: &Path) -> Result<Vec<SourceFile>> {
        if !root.is_dir() {
            bail!("Source root does not exist or is not a directory: {}", root.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_ignored_dir(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(language) = extension_with_dot(path) else {
                continue;
            };
            if !self.extensions.contains(&language) {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = to_slash_path(relative);
            if self.exclude_set.is_match(&rel_str) {
                continue;
            }

            files.push(SourceFile {
                relative_path: rel_str,
                path: path.to_path_buf(),
                language,
            });
        }

        // Sort for deterministic ordering
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    fn is_ignored_dir(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.ignore_dirs.contains(name))
    }
}

fn extension_with_dot(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/b.ts", "b");
        write(root, "src/a.py", "a");
        write(root, "README.md", "docs");
        write(root, "node_modules/pkg/index.js", "x");
        write(root, "src/nested/target/gen.rs", "x");

        let scanner = Scanner::from_config(&ScanConfig::default()).unwrap();
        let files = scanner.scan(root).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.py", "src/b.ts"]);
        assert_eq!(files[1].language, ".ts");
    }

    #[test]
    fn test_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/keep.ts", "k");
        write(dir.path(), "src/skip.test.ts", "s");

        let config = ScanConfig {
            exclude_globs: vec!["**/*.test.ts".to_string()],
            ..ScanConfig::default()
        };
        let files = Scanner::from_config(&config).unwrap().scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "src/keep.ts");
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::from_config(&ScanConfig::default()).unwrap();
        assert!(scanner.scan(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_modified_millis() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.ts", "a");
        let files = Scanner::from_config(&ScanConfig::default())
            .unwrap()
            .scan(dir.path())
            .unwrap();
        assert!(files[0].modified_millis().unwrap() > 0);
    }

    #[test]
    fn test_empty_file_is_not_indexable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.ts", "");
        write(dir.path(), "full.ts", "const a = 1;");
        let files = Scanner::from_config(&ScanConfig::default())
            .unwrap()
            .scan(dir.path())
            .unwrap();
        assert!(!files[0].is_indexable());
        assert!(files[1].is_indexable());
    }
}
