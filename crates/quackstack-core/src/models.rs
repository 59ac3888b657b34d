//! Core data models used throughout Quackstack.
//!
//! These types represent the fragments, ranked results, and change reports
//! that flow through the indexing and retrieval pipeline. Field names
//! serialize in camelCase so exported records line up with the persisted
//! snippet schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Revision-history enrichment attached to a fragment.
///
/// Opaque passthrough data: the core only reads it to apply boosts,
/// filter by author, and annotate context headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub last_commit_hash: Option<String>,
    pub last_commit_author: Option<String>,
    pub last_commit_email: Option<String>,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub last_commit_message: Option<String>,
    pub total_commits: Option<i64>,
    pub primary_author: Option<String>,
    pub primary_author_email: Option<String>,
    pub file_owner_commits: Option<i64>,
}

impl RevisionInfo {
    /// True when neither commit nor authorship data is present.
    pub fn is_empty(&self) -> bool {
        *self == RevisionInfo::default()
    }

    /// Whether `email` is this fragment's last committer or primary author.
    pub fn authored_by(&self, email: &str) -> bool {
        self.last_commit_email.as_deref() == Some(email)
            || self.primary_author_email.as_deref() == Some(email)
    }
}

/// A fragment precursor produced by the segmenter.
///
/// Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub content: String,
    pub function_name: Option<String>,
    pub line_start: Option<usize>,
    pub line_end: Option<usize>,
}

/// A fragment ready to be written to a snippet store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFragment {
    pub content: String,
    pub file_path: String,
    pub project_name: String,
    pub language: String,
    pub function_name: Option<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub embedding: Vec<f32>,
    #[serde(flatten)]
    pub revision: RevisionInfo,
}

impl NewFragment {
    /// Build a fragment from a segment, with an empty embedding and no history.
    pub fn from_segment(segment: Segment, file_path: &str, project_name: &str, language: &str) -> Self {
        Self {
            content: segment.content,
            file_path: file_path.to_string(),
            project_name: project_name.to_string(),
            language: language.to_string(),
            function_name: segment.function_name,
            line_start: segment.line_start.map(|l| l as i64),
            line_end: segment.line_end.map(|l| l as i64),
            embedding: Vec::new(),
            revision: RevisionInfo::default(),
        }
    }
}

/// A persisted fragment, as returned by a snippet store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Store-assigned identifier; ascending ids follow insertion order.
    pub id: i64,
    pub content: String,
    pub file_path: String,
    pub project_name: String,
    pub language: String,
    pub function_name: Option<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub embedding: Vec<f32>,
    #[serde(flatten)]
    pub revision: RevisionInfo,
    /// Unix milliseconds at which the store wrote this row.
    pub updated_at: i64,
}

impl Fragment {
    /// Attach store metadata to a new fragment.
    pub fn from_new(id: i64, updated_at: i64, new: NewFragment) -> Self {
        Self {
            id,
            content: new.content,
            file_path: new.file_path,
            project_name: new.project_name,
            language: new.language,
            function_name: new.function_name,
            line_start: new.line_start,
            line_end: new.line_end,
            embedding: new.embedding,
            revision: new.revision,
            updated_at,
        }
    }
}

/// A scored fragment returned from a query. Created per query and discarded
/// once the answer is produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub id: i64,
    pub content: String,
    pub file_path: String,
    pub function_name: Option<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    /// Cosine similarity after boosts.
    pub score: f64,
    #[serde(flatten)]
    pub revision: RevisionInfo,
}

/// Classification of files relative to the last indexed snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    pub new_files: usize,
    pub modified_files: usize,
    pub deleted_files: usize,
    pub total_changes: usize,
}

impl ChangeReport {
    pub fn new(new_files: usize, modified_files: usize, deleted_files: usize) -> Self {
        Self {
            new_files,
            modified_files,
            deleted_files,
            total_changes: new_files + modified_files + deleted_files,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.total_changes > 0
    }
}

/// Persisted record of the vector space that produced a project's stored
/// embeddings.
///
/// `fingerprint` is the order-insensitive corpus fingerprint of the
/// fragment contents that were vectorized. When it equals the fingerprint
/// of the stored corpus, the stored embeddings belong to the space rebuilt
/// from that corpus, whatever order the rows were written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexGeneration {
    /// Monotonic per project, starting at 1.
    pub generation: i64,
    pub fingerprint: String,
    pub document_count: i64,
    pub vocabulary_size: i64,
    /// Unix milliseconds.
    pub created_at: i64,
}
