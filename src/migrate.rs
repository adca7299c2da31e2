use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            subject TEXT NOT NULL,
            level TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            user_id TEXT,
            content TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create passages table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS passages (
            document_id TEXT NOT NULL,
            passage_index INTEGER NOT NULL,
            byte_offset INTEGER NOT NULL,
            text TEXT NOT NULL,
            PRIMARY KEY (document_id, passage_index),
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_user_id ON documents(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}
