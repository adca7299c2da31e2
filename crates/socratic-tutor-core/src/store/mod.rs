//! Storage abstraction for documents and their cached passages.
//!
//! The [`Store`] trait defines every persistence operation the
//! [`Retriever`](crate::retriever::Retriever) needs, enabling pluggable
//! backends (SQLite in the application crate, in-memory here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must make each call atomic: a reader sees a document either with all of
//! its passages or not at all.

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, DocumentMetadata, Passage};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](Store::insert_document) | Persist a new document with its passages |
/// | [`get_document`](Store::get_document) | Fetch a full document by id |
/// | [`list_documents`](Store::list_documents) | List metadata in creation order |
/// | [`delete_document`](Store::delete_document) | Remove a document and its passages |
/// | [`passages`](Store::passages) | Snapshot a document's passages for ranking |
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist `doc` and `passages` in one atomic write.
    async fn insert_document(&self, doc: &Document, passages: &[Passage]) -> Result<()>;

    /// Retrieve a full document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// List document metadata ordered by `created_at` ascending, then by
    /// insertion order. When `user_id` is given, only that user's documents.
    async fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<DocumentMetadata>>;

    /// Delete a document and its passages. Returns `false` if it was absent.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    /// Snapshot of a document's passages in offset order, taken in a single
    /// read, or `None` if the document does not exist.
    async fn passages(&self, id: &str) -> Result<Option<Arc<[Passage]>>>;
}
