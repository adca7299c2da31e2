//! SQLite-backed [`Store`] implementation.
//!
//! Documents live in the `documents` table and their cached passages in
//! `passages`. Inserts and deletes each run in a single transaction, and a
//! passage snapshot is read inside one transaction as well, so readers never
//! observe a document without its passages.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use socratic_tutor_core::models::{Document, DocumentMetadata, Level, Passage, Subject};
use socratic_tutor_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("invalid timestamp in database: {}", ms))
}

fn parse_subject(row: &SqliteRow) -> Result<Subject> {
    let raw: String = row.try_get("subject")?;
    Ok(raw.parse()?)
}

fn parse_level(row: &SqliteRow) -> Result<Level> {
    let raw: String = row.try_get("level")?;
    Ok(raw.parse()?)
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        subject: parse_subject(row)?,
        level: parse_level(row)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
    })
}

fn row_to_metadata(row: &SqliteRow) -> Result<DocumentMetadata> {
    let content_chars: i64 = row.try_get("content_chars")?;
    let passage_count: i64 = row.try_get("passage_count")?;
    Ok(DocumentMetadata {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        subject: parse_subject(row)?,
        level: parse_level(row)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        user_id: row.try_get("user_id")?,
        content_chars: content_chars as usize,
        passage_count: passage_count as usize,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &Document, passages: &[Passage]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, subject, level, created_at, user_id, content)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(doc.subject.as_str())
        .bind(doc.level.as_str())
        .bind(to_millis(&doc.created_at))
        .bind(&doc.user_id)
        .bind(&doc.content)
        .execute(&mut *tx)
        .await?;

        for passage in passages {
            sqlx::query(
                "INSERT INTO passages (document_id, passage_index, byte_offset, text) VALUES (?, ?, ?, ?)",
            )
            .bind(&passage.document_id)
            .bind(passage.index as i64)
            .bind(passage.offset as i64)
            .bind(&passage.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(document_id = %doc.id, passages = passages.len(), "document persisted");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, filename, subject, level, created_at, user_id, content
            FROM documents
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<DocumentMetadata>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.filename, d.subject, d.level, d.created_at, d.user_id,
                   length(d.content) AS content_chars,
                   (SELECT COUNT(*) FROM passages p WHERE p.document_id = d.id) AS passage_count
            FROM documents d
            WHERE (? IS NULL OR d.user_id = ?)
            ORDER BY d.created_at ASC, d.rowid ASC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_metadata).collect()
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM passages WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn passages(&self, id: &str) -> Result<Option<Arc<[Passage]>>> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if !exists {
            tx.commit().await?;
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            SELECT document_id, passage_index, byte_offset, text
            FROM passages
            WHERE document_id = ?
            ORDER BY passage_index ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let passages = rows
            .iter()
            .map(|row| -> Result<Passage> {
                let index: i64 = row.try_get("passage_index")?;
                let offset: i64 = row.try_get("byte_offset")?;
                Ok(Passage {
                    document_id: row.try_get("document_id")?,
                    index: index as usize,
                    offset: offset as usize,
                    text: row.try_get("text")?,
                })
            })
            .collect::<Result<Vec<Passage>>>()?;

        Ok(Some(Arc::from(passages)))
    }
}
