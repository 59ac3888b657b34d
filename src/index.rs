//! The code index service.
//!
//! [`CodeIndex`] ties the store, scanner, segmenter, vector space, and
//! ranker together behind the operations the CLI exposes: ingest, retrieve,
//! search (retrieve + answer), detect changes, and status.
//!
//! # Vector space generations
//!
//! Embeddings are only comparable within the vector space they were
//! projected into, and the space is a function of the exact stored corpus
//! (as a multiset; row order does not matter). At query time the stored
//! corpus is fingerprinted:
//!
//! - a cached [`Generation`] with the same fingerprint is reused as is;
//! - otherwise the space is rebuilt from the stored corpus. Stored
//!   embeddings are used only if the generation recorded at ingest time
//!   carries the same fingerprint; if not, every fragment is re-projected
//!   in memory with the rebuilt space.
//!
//! The cache is per project and cleared by [`CodeIndex::ingest_corpus`] and
//! [`CodeIndex::invalidate`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use quackstack_core::models::{ChangeReport, Fragment, IndexGeneration, RankedResult};
use quackstack_core::search::{build_context, rank, RankOptions};
use quackstack_core::segment::Segmenter;
use quackstack_core::store::{FragmentFilter, SnippetStore};
use quackstack_core::vector_space::{corpus_fingerprint, VectorSpace};

use crate::answer::AnswerProvider;
use crate::config::Config;
use crate::history::RevisionHistory;
use crate::ingest::{IngestSummary, Ingestor};
use crate::progress::IngestProgressReporter;
use crate::scanner::Scanner;
use crate::sqlite_store::SqliteStore;
use crate::{changes, db, migrate};

/// A vector space matching one stored corpus.
#[derive(Debug)]
pub struct Generation {
    space: VectorSpace,
    /// In-memory embeddings by fragment id, when the stored ones belong to
    /// a different space.
    reprojected: Option<HashMap<i64, Vec<f32>>>,
}

impl Generation {
    fn build(corpus: &[Fragment], recorded: Option<&IndexGeneration>) -> Self {
        let space = VectorSpace::build(corpus.iter().map(|f| f.content.as_str()));
        let stored_valid = recorded.is_some_and(|g| g.fingerprint == space.fingerprint())
            && corpus.iter().all(|f| f.embedding.len() == space.dims());

        let reprojected = if stored_valid {
            None
        } else {
            debug!(
                fragments = corpus.len(),
                "stored embeddings belong to another space, re-projecting"
            );
            Some(
                corpus
                    .iter()
                    .map(|f| (f.id, space.vectorize(&f.content)))
                    .collect(),
            )
        };
        Self { space, reprojected }
    }

    pub fn space(&self) -> &VectorSpace {
        &self.space
    }

    /// Whether stored embeddings are used directly.
    pub fn uses_stored_embeddings(&self) -> bool {
        self.reprojected.is_none()
    }

    /// Point `fragments` at embeddings from this space.
    fn align(&self, fragments: &mut [Fragment]) {
        let Some(reprojected) = &self.reprojected else {
            return;
        };
        for fragment in fragments {
            fragment.embedding = match reprojected.get(&fragment.id) {
                Some(embedding) => embedding.clone(),
                None => self.space.vectorize(&fragment.content),
            };
        }
    }
}

/// Result of [`CodeIndex::search`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub answer: String,
    pub sources: Vec<RankedResult>,
    /// The context string the answer was generated from.
    pub context: String,
}

/// Summary returned by [`CodeIndex::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub project: String,
    pub fragments: i64,
    pub files: usize,
    pub generation: Option<IndexGeneration>,
    pub changes: Option<ChangeReport>,
}

pub struct CodeIndex {
    store: Arc<dyn SnippetStore>,
    scanner: Scanner,
    segmenter: Segmenter,
    batch_size: usize,
    generations: RwLock<HashMap<String, Arc<Generation>>>,
}

impl CodeIndex {
    /// Open the SQLite store named by `config`, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Self::new(Arc::new(SqliteStore::new(pool)), config)
    }

    pub fn new(store: Arc<dyn SnippetStore>, config: &Config) -> Result<Self> {
        Ok(Self {
            store,
            scanner: Scanner::from_config(&config.scan)?,
            segmenter: Segmenter::new(config.segment.window_lines),
            batch_size: config.ingest.batch_size,
            generations: RwLock::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &dyn SnippetStore {
        self.store.as_ref()
    }

    /// Destructively re-index `root` as `project`.
    pub async fn ingest_corpus(
        &self,
        root: &Path,
        project: &str,
        history: &dyn RevisionHistory,
        progress: &dyn IngestProgressReporter,
    ) -> Result<IngestSummary> {
        let ingestor = Ingestor {
            store: self.store.as_ref(),
            scanner: &self.scanner,
            segmenter: &self.segmenter,
            history,
            progress,
            batch_size: self.batch_size,
        };
        let result = ingestor.run(root, project).await;
        self.invalidate(project);
        result
    }

    /// Rank stored fragments of `project` against `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        project: &str,
        options: &RankOptions,
    ) -> Result<Vec<RankedResult>> {
        let corpus = self.store.find_many(project, &FragmentFilter::default()).await?;
        if corpus.is_empty() {
            debug!(project, "nothing indexed");
            return Ok(Vec::new());
        }

        let generation = self.generation_for(project, &corpus).await?;
        let mut candidates = match &options.filter_author {
            Some(email) => {
                self.store
                    .find_many(project, &FragmentFilter::by_author(email.clone()))
                    .await?
            }
            None => corpus,
        };
        generation.align(&mut candidates);

        let query_vec = generation.space.vectorize(query);
        let results = rank(&query_vec, &candidates, options, Utc::now());
        debug!(
            project,
            candidates = candidates.len(),
            results = results.len(),
            "ranked fragments"
        );
        Ok(results)
    }

    /// Retrieve, build the context, and ask `provider` for an answer.
    ///
    /// The provider is called even when nothing matched, with an empty
    /// context.
    pub async fn search(
        &self,
        query: &str,
        project: &str,
        options: &RankOptions,
        provider: &dyn AnswerProvider,
    ) -> Result<SearchOutcome> {
        let sources = self.retrieve(query, project, options).await?;
        let context = build_context(&sources, Utc::now());
        info!(
            project,
            provider = provider.name(),
            sources = sources.len(),
            "generating answer"
        );
        let answer = provider.generate_answer(query, &context).await?;
        Ok(SearchOutcome {
            answer,
            sources,
            context,
        })
    }

    /// Files changed under `root` since `project` was indexed.
    pub async fn detect_changes(&self, root: &Path, project: &str) -> Option<ChangeReport> {
        changes::detect_changes(self.store.as_ref(), &self.scanner, root, project).await
    }

    pub async fn status(&self, root: &Path, project: &str) -> Result<IndexStatus> {
        Ok(IndexStatus {
            project: project.to_string(),
            fragments: self.store.count(project).await?,
            files: self.store.indexed_files(project).await?.len(),
            generation: self.store.latest_generation(project).await?,
            changes: self.detect_changes(root, project).await,
        })
    }

    /// Drop the cached generation of `project`.
    pub fn invalidate(&self, project: &str) {
        let mut cache = self.generations.write().unwrap_or_else(|e| e.into_inner());
        if cache.remove(project).is_some() {
            debug!(project, "generation cache invalidated");
        }
    }

    /// The cached generation of `project`, if a query has built one.
    pub fn generation(&self, project: &str) -> Option<Arc<Generation>> {
        self.generations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(project)
            .cloned()
    }

    pub async fn close(&self) {
        self.store.close().await;
    }

    async fn generation_for(&self, project: &str, corpus: &[Fragment]) -> Result<Arc<Generation>> {
        let fingerprint = corpus_fingerprint(corpus.iter().map(|f| f.content.as_str()));
        if let Some(cached) = self.generation(project) {
            if cached.space.fingerprint() == fingerprint {
                return Ok(cached);
            }
            debug!(project, "stored corpus changed since generation was cached");
        }

        let recorded = self.store.latest_generation(project).await?;
        if recorded.is_none() {
            warn!(project, "no recorded generation, embeddings will be re-projected");
        }
        let generation = Arc::new(Generation::build(corpus, recorded.as_ref()));
        debug!(
            project,
            vocabulary = generation.space.dims(),
            stored_embeddings = generation.uses_stored_embeddings(),
            "vector space rebuilt"
        );

        self.generations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(project.to_string(), Arc::clone(&generation));
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quackstack_core::models::{NewFragment, Segment};
    use quackstack_core::store::memory::InMemoryStore;
    use std::sync::Mutex;

    struct EchoProvider {
        contexts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnswerProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate_answer(&self, query: &str, context: &str) -> Result<String> {
            self.contexts.lock().unwrap().push(context.to_string());
            Ok(format!("answer to {}", query))
        }
    }

    fn fragment(path: &str, content: &str, space: Option<&VectorSpace>) -> NewFragment {
        let segment = Segment {
            content: content.to_string(),
            function_name: None,
            line_start: None,
            line_end: None,
        };
        let mut fragment = NewFragment::from_segment(segment, path, "demo", ".ts");
        if let Some(space) = space {
            fragment.embedding = space.vectorize(content);
        }
        fragment
    }

    fn index(store: Arc<InMemoryStore>) -> CodeIndex {
        CodeIndex::new(store, &Config::default()).unwrap()
    }

    const DOCS: [(&str, &str); 2] = [
        ("a.ts", "function parseConfig(path) { return readConfig(path); }"),
        ("b.ts", "function renderWidget(widget) { return draw(widget); }"),
    ];

    #[tokio::test]
    async fn test_retrieve_uses_stored_embeddings_when_fingerprint_matches() {
        let store = Arc::new(InMemoryStore::new());
        let space = VectorSpace::build(DOCS.iter().map(|(_, c)| *c));
        for (path, content) in DOCS {
            store.create(&fragment(path, content, Some(&space))).await.unwrap();
        }
        store
            .record_generation(
                "demo",
                &IndexGeneration {
                    generation: 1,
                    fingerprint: space.fingerprint().to_string(),
                    document_count: 2,
                    vocabulary_size: space.dims() as i64,
                    created_at: 0,
                },
            )
            .await
            .unwrap();

        let index = index(Arc::clone(&store));
        let results = index
            .retrieve("parseConfig", "demo", &RankOptions::default())
            .await
            .unwrap();
        assert_eq!(results[0].file_path, "a.ts");
        assert!(index.generation("demo").unwrap().uses_stored_embeddings());
    }

    #[tokio::test]
    async fn test_retrieve_reprojects_without_recorded_generation() {
        let store = Arc::new(InMemoryStore::new());
        for (path, content) in DOCS {
            store.create(&fragment(path, content, None)).await.unwrap();
        }

        let index = index(Arc::clone(&store));
        let results = index
            .retrieve("renderWidget widget", "demo", &RankOptions::default())
            .await
            .unwrap();
        assert_eq!(results[0].file_path, "b.ts");
        assert!(!index.generation("demo").unwrap().uses_stored_embeddings());
    }

    #[tokio::test]
    async fn test_cached_generation_reused_until_corpus_changes() {
        let store = Arc::new(InMemoryStore::new());
        for (path, content) in DOCS {
            store.create(&fragment(path, content, None)).await.unwrap();
        }
        let index = index(Arc::clone(&store));
        let options = RankOptions::default();

        index.retrieve("draw", "demo", &options).await.unwrap();
        let first = index.generation("demo").unwrap();
        index.retrieve("draw", "demo", &options).await.unwrap();
        assert!(Arc::ptr_eq(&first, &index.generation("demo").unwrap()));

        store
            .create(&fragment("c.ts", "const draw = () => canvas;", None))
            .await
            .unwrap();
        index.retrieve("draw", "demo", &options).await.unwrap();
        let rebuilt = index.generation("demo").unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(rebuilt.space().document_count(), 3);
    }

    #[tokio::test]
    async fn test_search_on_empty_project_still_asks_provider() {
        let index = index(Arc::new(InMemoryStore::new()));
        let provider = EchoProvider {
            contexts: Mutex::new(Vec::new()),
        };
        let outcome = index
            .search("what is foo?", "demo", &RankOptions::default(), &provider)
            .await
            .unwrap();
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.answer, "answer to what is foo?");
        assert_eq!(provider.contexts.lock().unwrap().as_slice(), [String::new()]);
    }

    #[tokio::test]
    async fn test_invalidate_drops_cache() {
        let store = Arc::new(InMemoryStore::new());
        store.create(&fragment("a.ts", DOCS[0].1, None)).await.unwrap();
        let index = index(store);
        index
            .retrieve("config", "demo", &RankOptions::default())
            .await
            .unwrap();
        assert!(index.generation("demo").is_some());
        index.invalidate("demo");
        assert!(index.generation("demo").is_none());
    }
}
