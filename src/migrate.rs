use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connect, apply the schema, and close. Backs `quack init`.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables and indexes that do not exist yet. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Timestamps: last_commit_date in unix seconds, created_at/updated_at in unix ms
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS code_snippets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            language TEXT NOT NULL,
            content TEXT NOT NULL,
            function_name TEXT,
            line_start INTEGER,
            line_end INTEGER,
            embedding BLOB NOT NULL,
            last_commit_hash TEXT,
            last_commit_author TEXT,
            last_commit_email TEXT,
            last_commit_date INTEGER,
            last_commit_message TEXT,
            total_commits INTEGER,
            primary_author TEXT,
            primary_author_email TEXT,
            file_owner_commits INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_generations (
            project_name TEXT PRIMARY KEY,
            generation INTEGER NOT NULL,
            fingerprint TEXT NOT NULL,
            document_count INTEGER NOT NULL,
            vocabulary_size INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_snippets_project ON code_snippets(project_name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snippets_project_file ON code_snippets(project_name, file_path)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
