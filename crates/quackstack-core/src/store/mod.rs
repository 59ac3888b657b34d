//! Storage abstraction for Quackstack.
//!
//! The [`SnippetStore`] trait defines the storage operations needed by the
//! ingestion, retrieval, and change-detection pipelines, so the same
//! pipeline runs against SQLite in the CLI and [`memory::InMemoryStore`]
//! in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::changes::IndexedFile;
use crate::models::{Fragment, IndexGeneration, NewFragment};

/// Optional narrowing applied to [`SnippetStore::find_many`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentFilter {
    /// Match fragments whose `last_commit_email` or
    /// `primary_author_email` equals this value.
    pub author_email: Option<String>,
}

impl FragmentFilter {
    pub fn by_author(email: impl Into<String>) -> Self {
        Self {
            author_email: Some(email.into()),
        }
    }

    pub fn matches(&self, fragment: &Fragment) -> bool {
        match &self.author_email {
            Some(email) => fragment.revision.authored_by(email),
            None => true,
        }
    }
}

/// Abstract snippet storage, keyed by project.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_many`](SnippetStore::find_many) | All fragments of a project, in id order |
/// | [`create`](SnippetStore::create) | Insert one fragment, returning its id |
/// | [`delete_many`](SnippetStore::delete_many) | Remove every fragment of a project |
/// | [`count`](SnippetStore::count) | Number of fragments in a project |
/// | [`indexed_files`](SnippetStore::indexed_files) | Distinct paths with their latest write time |
/// | [`record_generation`](SnippetStore::record_generation) | Persist the vector space generation of an ingestion |
/// | [`latest_generation`](SnippetStore::latest_generation) | Read it back |
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Fragments of `project` passing `filter`, ordered by ascending id.
    async fn find_many(&self, project: &str, filter: &FragmentFilter) -> Result<Vec<Fragment>>;

    /// Insert a fragment. The store assigns `id` and `updated_at`.
    async fn create(&self, fragment: &NewFragment) -> Result<i64>;

    /// Delete every fragment of `project`, returning how many were removed.
    async fn delete_many(&self, project: &str) -> Result<u64>;

    async fn count(&self, project: &str) -> Result<i64>;

    /// Distinct file paths of `project` with the max `updated_at` of each.
    ///
    /// The default implementation derives this from [`find_many`](SnippetStore::find_many);
    /// stores with a query engine should override it.
    async fn indexed_files(&self, project: &str) -> Result<Vec<IndexedFile>> {
        let fragments = self.find_many(project, &FragmentFilter::default()).await?;
        let mut latest: BTreeMap<String, i64> = BTreeMap::new();
        for f in fragments {
            let entry = latest.entry(f.file_path).or_insert(f.updated_at);
            *entry = (*entry).max(f.updated_at);
        }
        Ok(latest
            .into_iter()
            .map(|(path, updated_at)| IndexedFile { path, updated_at })
            .collect())
    }

    /// Replace the recorded generation for `project`.
    async fn record_generation(&self, project: &str, generation: &IndexGeneration) -> Result<()>;

    async fn latest_generation(&self, project: &str) -> Result<Option<IndexGeneration>>;

    /// Release any held resources.
    async fn close(&self) {}
}
