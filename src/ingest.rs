//! Ingestion pipeline orchestration.
//!
//! Coordinates a full re-index: scan → segment → history enrichment →
//! vocabulary build → vectorize → delete old fragments → batched writes →
//! record the index generation.
//!
//! Files are processed sequentially. Writes within a batch run
//! concurrently; batches run strictly in sequence. One file or fragment
//! failing is logged and skipped, it never aborts the run.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use quackstack_core::models::{IndexGeneration, NewFragment};
use quackstack_core::segment::Segmenter;
use quackstack_core::store::SnippetStore;
use quackstack_core::vector_space::VectorSpace;

use crate::config::Config;
use crate::history::{GitHistory, NoHistory, RevisionHistory};
use crate::index::CodeIndex;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::scanner::Scanner;

/// Counts reported after an ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub project: String,
    pub files_found: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub fragments_written: usize,
    pub fragments_failed: usize,
    pub fragments_deleted: u64,
    pub vocabulary_size: usize,
    pub generation: i64,
}

/// Everything an ingestion run needs, borrowed from the caller.
pub struct Ingestor<'a> {
    pub store: &'a dyn SnippetStore,
    pub scanner: &'a Scanner,
    pub segmenter: &'a Segmenter,
    pub history: &'a dyn RevisionHistory,
    pub progress: &'a dyn IngestProgressReporter,
    pub batch_size: usize,
}

impl Ingestor<'_> {
    /// Destructively re-index `root` as `project`.
    pub async fn run(&self, root: &Path, project: &str) -> Result<IngestSummary> {
        let mut summary = IngestSummary {
            project: project.to_string(),
            ..IngestSummary::default()
        };

        self.progress.report(IngestProgressEvent::Scanning {
            project: project.to_string(),
        });
        let files = self
            .scanner
            .scan(root)
            .with_context(|| format!("Failed to scan {}", root.display()))?;
        summary.files_found = files.len();
        info!(project, files = files.len(), "scanned source tree");

        let mut fragments: Vec<NewFragment> = Vec::new();
        for (i, file) in files.iter().enumerate() {
            let text = match std::fs::read(&file.path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(file = %file.relative_path, error = %e, "skipping unreadable file");
                    summary.files_skipped += 1;
                    continue;
                }
            };

            let segments = self.segmenter.segment(&text, &file.relative_path);
            let revision = self.history.file_revision(&file.relative_path);
            debug!(
                file = %file.relative_path,
                segments = segments.len(),
                history = revision.is_some(),
                "segmented file"
            );

            for segment in segments {
                let mut fragment =
                    NewFragment::from_segment(segment, &file.relative_path, project, &file.language);
                if let Some(revision) = &revision {
                    fragment.revision = revision.clone();
                }
                fragments.push(fragment);
            }
            summary.files_indexed += 1;

            self.progress.report(IngestProgressEvent::Segmenting {
                project: project.to_string(),
                n: (i + 1) as u64,
                total: files.len() as u64,
            });
        }

        let space = VectorSpace::build(fragments.iter().map(|f| f.content.as_str()));
        for fragment in &mut fragments {
            fragment.embedding = space.vectorize(&fragment.content);
        }
        summary.vocabulary_size = space.dims();
        info!(
            project,
            fragments = fragments.len(),
            vocabulary = space.dims(),
            "built vector space"
        );

        summary.fragments_deleted = self.store.delete_many(project).await?;

        let batch_size = self.batch_size.max(1);
        let total = fragments.len() as u64;
        let mut written = 0u64;
        for (b, batch) in fragments.chunks(batch_size).enumerate() {
            let results = join_all(batch.iter().map(|f| self.store.create(f))).await;
            for (fragment, result) in batch.iter().zip(results) {
                match result {
                    Ok(_) => summary.fragments_written += 1,
                    Err(e) => {
                        warn!(file = %fragment.file_path, error = %e, "failed to write fragment");
                        summary.fragments_failed += 1;
                    }
                }
            }
            written += batch.len() as u64;
            debug!(batch = b, size = batch.len(), "wrote batch");
            self.progress.report(IngestProgressEvent::Writing {
                project: project.to_string(),
                n: written,
                total,
            });
        }

        let previous = self.store.latest_generation(project).await?;
        let generation = IndexGeneration {
            generation: previous.map_or(1, |g| g.generation + 1),
            fingerprint: space.fingerprint().to_string(),
            document_count: space.document_count() as i64,
            vocabulary_size: space.dims() as i64,
            created_at: Utc::now().timestamp_millis(),
        };
        self.store.record_generation(project, &generation).await?;
        summary.generation = generation.generation;

        info!(
            project,
            generation = generation.generation,
            written = summary.fragments_written,
            failed = summary.fragments_failed,
            "ingestion complete"
        );
        Ok(summary)
    }
}

/// `quack ingest`: re-index `root` and print a summary.
pub async fn run_ingest(
    index: &CodeIndex,
    config: &Config,
    root: &Path,
    project: &str,
    with_history: bool,
    progress: ProgressMode,
) -> Result<()> {
    let git = if with_history && config.ingest.history {
        let git = GitHistory::discover(root, config.ingest.history_depth);
        if git.is_none() {
            info!(root = %root.display(), "not a git work tree, skipping history");
        }
        git
    } else {
        None
    };
    let history: &dyn RevisionHistory = match &git {
        Some(git) => git,
        None => &NoHistory,
    };

    let reporter = progress.reporter();
    let summary = index
        .ingest_corpus(root, project, history, reporter.as_ref())
        .await?;

    println!("Ingested {}", summary.project);
    println!(
        "  files:       {} found, {} indexed, {} skipped",
        summary.files_found, summary.files_indexed, summary.files_skipped
    );
    println!(
        "  fragments:   {} written, {} failed, {} replaced",
        summary.fragments_written, summary.fragments_failed, summary.fragments_deleted
    );
    println!("  vocabulary:  {} terms", summary.vocabulary_size);
    println!("  generation:  {}", summary.generation);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::history::NoHistory;
    use crate::progress::NoProgress;
    use quackstack_core::models::RevisionInfo;
    use quackstack_core::store::memory::InMemoryStore;
    use quackstack_core::store::FragmentFilter;

    struct FixedHistory;

    impl RevisionHistory for FixedHistory {
        fn file_revision(&self, path: &str) -> Option<RevisionInfo> {
            (path == "a.ts").then(|| RevisionInfo {
                last_commit_email: Some("ann@example.com".to_string()),
                total_commits: Some(4),
                ..RevisionInfo::default()
            })
        }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ts"),
            "function foo() {\n  return 1;\n}\n\nfunction bar() {\n  return 2;\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.py"), "print('hello world')\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_ingest_writes_fragments_with_history() {
        let dir = tree();
        let store = InMemoryStore::new();
        let scanner = Scanner::from_config(&ScanConfig::default()).unwrap();
        let segmenter = Segmenter::default();
        let ingestor = Ingestor {
            store: &store,
            scanner: &scanner,
            segmenter: &segmenter,
            history: &FixedHistory,
            progress: &NoProgress,
            batch_size: 2,
        };

        let summary = ingestor.run(dir.path(), "demo").await.unwrap();
        assert_eq!(summary.files_found, 2);
        assert_eq!(summary.files_indexed, 2);
        assert_eq!(summary.fragments_written, 3);
        assert_eq!(summary.generation, 1);

        let fragments = store.find_many("demo", &FragmentFilter::default()).await.unwrap();
        let names: Vec<Option<&str>> = fragments.iter().map(|f| f.function_name.as_deref()).collect();
        assert_eq!(names, vec![Some("foo"), Some("bar"), None]);
        assert_eq!(fragments[0].language, ".ts");
        assert_eq!(fragments[0].revision.total_commits, Some(4));
        assert!(fragments[2].revision.is_empty());
        assert!(fragments.iter().all(|f| f.embedding.len() == summary.vocabulary_size));
    }

    #[tokio::test]
    async fn test_reingest_replaces_fragments() {
        let dir = tree();
        let store = InMemoryStore::new();
        let scanner = Scanner::from_config(&ScanConfig::default()).unwrap();
        let segmenter = Segmenter::default();
        let ingestor = Ingestor {
            store: &store,
            scanner: &scanner,
            segmenter: &segmenter,
            history: &NoHistory,
            progress: &NoProgress,
            batch_size: 50,
        };

        let first = ingestor.run(dir.path(), "demo").await.unwrap();
        let second = ingestor.run(dir.path(), "demo").await.unwrap();
        assert_eq!(second.fragments_deleted, first.fragments_written as u64);
        assert_eq!(store.count("demo").await.unwrap(), first.fragments_written as i64);
        assert_eq!(second.generation, 2);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new();
        let scanner = Scanner::from_config(&ScanConfig::default()).unwrap();
        let segmenter = Segmenter::default();
        let ingestor = Ingestor {
            store: &store,
            scanner: &scanner,
            segmenter: &segmenter,
            history: &NoHistory,
            progress: &NoProgress,
            batch_size: 50,
        };
        assert!(ingestor.run(&dir.path().join("nope"), "demo").await.is_err());
    }
}
