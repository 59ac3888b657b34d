//! SQLite-backed [`SnippetStore`] implementation.
//!
//! Maps each store operation onto the `code_snippets` table created by
//! [`crate::migrate`]. Embeddings are stored as little-endian `f32` BLOBs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use quackstack_core::changes::IndexedFile;
use quackstack_core::embedding::{blob_to_vec, vec_to_blob};
use quackstack_core::models::{Fragment, IndexGeneration, NewFragment, RevisionInfo};
use quackstack_core::store::{FragmentFilter, SnippetStore};

const SELECT_COLUMNS: &str = "id, project_name, file_path, language, content, function_name, \
     line_start, line_end, embedding, last_commit_hash, last_commit_author, last_commit_email, \
     last_commit_date, last_commit_message, total_commits, primary_author, primary_author_email, \
     file_owner_commits, updated_at";

/// SQLite implementation of the [`SnippetStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_fragment(row: &SqliteRow) -> Result<Fragment> {
    let blob: Vec<u8> = row.try_get("embedding")?;
    let commit_secs: Option<i64> = row.try_get("last_commit_date")?;
    Ok(Fragment {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        file_path: row.try_get("file_path")?,
        project_name: row.try_get("project_name")?,
        language: row.try_get("language")?,
        function_name: row.try_get("function_name")?,
        line_start: row.try_get("line_start")?,
        line_end: row.try_get("line_end")?,
        embedding: blob_to_vec(&blob),
        revision: RevisionInfo {
            last_commit_hash: row.try_get("last_commit_hash")?,
            last_commit_author: row.try_get("last_commit_author")?,
            last_commit_email: row.try_get("last_commit_email")?,
            last_commit_date: commit_secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)),
            last_commit_message: row.try_get("last_commit_message")?,
            total_commits: row.try_get("total_commits")?,
            primary_author: row.try_get("primary_author")?,
            primary_author_email: row.try_get("primary_author_email")?,
            file_owner_commits: row.try_get("file_owner_commits")?,
        },
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl SnippetStore for SqliteStore {
    async fn find_many(&self, project: &str, filter: &FragmentFilter) -> Result<Vec<Fragment>> {
        let rows = match &filter.author_email {
            Some(email) => {
                let sql = format!(
                    "SELECT {} FROM code_snippets \
                     WHERE project_name = ? AND (last_commit_email = ? OR primary_author_email = ?) \
                     ORDER BY id ASC",
                    SELECT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(project)
                    .bind(email)
                    .bind(email)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM code_snippets WHERE project_name = ? ORDER BY id ASC",
                    SELECT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(project)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_fragment).collect()
    }

    async fn create(&self, fragment: &NewFragment) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        let blob = vec_to_blob(&fragment.embedding);
        let rev = &fragment.revision;

        let result = sqlx::query(
            r#"
            INSERT INTO code_snippets (project_name, file_path, language, content, function_name,
                                       line_start, line_end, embedding,
                                       last_commit_hash, last_commit_author, last_commit_email,
                                       last_commit_date, last_commit_message, total_commits,
                                       primary_author, primary_author_email, file_owner_commits,
                                       created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fragment.project_name)
        .bind(&fragment.file_path)
        .bind(&fragment.language)
        .bind(&fragment.content)
        .bind(&fragment.function_name)
        .bind(fragment.line_start)
        .bind(fragment.line_end)
        .bind(&blob)
        .bind(&rev.last_commit_hash)
        .bind(&rev.last_commit_author)
        .bind(&rev.last_commit_email)
        .bind(rev.last_commit_date.map(|d| d.timestamp()))
        .bind(&rev.last_commit_message)
        .bind(rev.total_commits)
        .bind(&rev.primary_author)
        .bind(&rev.primary_author_email)
        .bind(rev.file_owner_commits)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn delete_many(&self, project: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM code_snippets WHERE project_name = ?")
            .bind(project)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, project: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM code_snippets WHERE project_name = ?")
                .bind(project)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn indexed_files(&self, project: &str) -> Result<Vec<IndexedFile>> {
        let rows = sqlx::query(
            r#"
            SELECT file_path, MAX(updated_at) AS updated_at
            FROM code_snippets
            WHERE project_name = ?
            GROUP BY file_path
            ORDER BY file_path
            "#,
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(IndexedFile {
                    path: row.try_get("file_path")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    async fn record_generation(&self, project: &str, generation: &IndexGeneration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_generations (project_name, generation, fingerprint,
                                           document_count, vocabulary_size, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_name) DO UPDATE SET
                generation = excluded.generation,
                fingerprint = excluded.fingerprint,
                document_count = excluded.document_count,
                vocabulary_size = excluded.vocabulary_size,
                created_at = excluded.created_at
            "#,
        )
        .bind(project)
        .bind(generation.generation)
        .bind(&generation.fingerprint)
        .bind(generation.document_count)
        .bind(generation.vocabulary_size)
        .bind(generation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_generation(&self, project: &str) -> Result<Option<IndexGeneration>> {
        let row = sqlx::query(
            "SELECT generation, fingerprint, document_count, vocabulary_size, created_at \
             FROM index_generations WHERE project_name = ?",
        )
        .bind(project)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(IndexGeneration {
                generation: row.try_get("generation")?,
                fingerprint: row.try_get("fingerprint")?,
                document_count: row.try_get("document_count")?,
                vocabulary_size: row.try_get("vocabulary_size")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
