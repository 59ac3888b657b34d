//! In-memory [`SnippetStore`] implementation for tests and embedding.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Ids are assigned from a
//! counter that never reuses values, matching SQLite `AUTOINCREMENT`.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Fragment, IndexGeneration, NewFragment};

use super::{FragmentFilter, SnippetStore};

struct Rows {
    next_id: i64,
    fragments: Vec<Fragment>,
    generations: HashMap<String, IndexGeneration>,
}

/// In-memory snippet store.
pub struct InMemoryStore {
    rows: RwLock<Rows>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Rows {
                next_id: 1,
                fragments: Vec::new(),
                generations: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl SnippetStore for InMemoryStore {
    async fn find_many(&self, project: &str, filter: &FragmentFilter) -> Result<Vec<Fragment>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .fragments
            .iter()
            .filter(|f| f.project_name == project && filter.matches(f))
            .cloned()
            .collect())
    }

    async fn create(&self, fragment: &NewFragment) -> Result<i64> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let id = rows.next_id;
        rows.next_id += 1;
        let updated_at = Utc::now().timestamp_millis();
        rows.fragments
            .push(Fragment::from_new(id, updated_at, fragment.clone()));
        Ok(id)
    }

    async fn delete_many(&self, project: &str) -> Result<u64> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let before = rows.fragments.len();
        rows.fragments.retain(|f| f.project_name != project);
        Ok((before - rows.fragments.len()) as u64)
    }

    async fn count(&self, project: &str) -> Result<i64> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .fragments
            .iter()
            .filter(|f| f.project_name == project)
            .count() as i64)
    }

    async fn record_generation(&self, project: &str, generation: &IndexGeneration) -> Result<()> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.generations
            .insert(project.to_string(), generation.clone());
        Ok(())
    }

    async fn latest_generation(&self, project: &str) -> Result<Option<IndexGeneration>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.generations.get(project).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Segment;

    fn new_fragment(project: &str, path: &str, email: Option<&str>) -> NewFragment {
        let segment = Segment {
            content: format!("// {}", path),
            function_name: None,
            line_start: Some(1),
            line_end: Some(1),
        };
        let mut f = NewFragment::from_segment(segment, path, project, ".ts");
        f.revision.primary_author_email = email.map(str::to_string);
        f
    }

    #[tokio::test]
    async fn test_create_assigns_ascending_ids() {
        let store = InMemoryStore::new();
        let a = store.create(&new_fragment("p", "a.ts", None)).await.unwrap();
        let b = store.create(&new_fragment("p", "b.ts", None)).await.unwrap();
        assert!(b > a);

        let found = store.find_many("p", &FragmentFilter::default()).await.unwrap();
        let paths: Vec<&str> = found.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a.ts", "b.ts"]);
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let store = InMemoryStore::new();
        store.create(&new_fragment("p", "a.ts", None)).await.unwrap();
        store.create(&new_fragment("q", "a.ts", None)).await.unwrap();

        assert_eq!(store.delete_many("p").await.unwrap(), 1);
        assert_eq!(store.count("p").await.unwrap(), 0);
        assert_eq!(store.count("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = InMemoryStore::new();
        let first = store.create(&new_fragment("p", "a.ts", None)).await.unwrap();
        store.delete_many("p").await.unwrap();
        let second = store.create(&new_fragment("p", "a.ts", None)).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_author_filter() {
        let store = InMemoryStore::new();
        store
            .create(&new_fragment("p", "a.ts", Some("ann@example.com")))
            .await
            .unwrap();
        store
            .create(&new_fragment("p", "b.ts", Some("bob@example.com")))
            .await
            .unwrap();

        let found = store
            .find_many("p", &FragmentFilter::by_author("bob@example.com"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_path, "b.ts");
    }

    #[tokio::test]
    async fn test_generation_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.latest_generation("p").await.unwrap().is_none());

        let generation = IndexGeneration {
            generation: 2,
            fingerprint: "abc".to_string(),
            document_count: 3,
            vocabulary_size: 10,
            created_at: 1,
        };
        store.record_generation("p", &generation).await.unwrap();
        assert_eq!(store.latest_generation("p").await.unwrap(), Some(generation));
        assert!(store.latest_generation("q").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_indexed_files_default() {
        let store = InMemoryStore::new();
        store.create(&new_fragment("p", "b.ts", None)).await.unwrap();
        store.create(&new_fragment("p", "a.ts", None)).await.unwrap();
        store.create(&new_fragment("p", "a.ts", None)).await.unwrap();

        let files = store.indexed_files("p").await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.ts", "b.ts"]);
        assert!(files.iter().all(|f| f.updated_at > 0));
    }
}
