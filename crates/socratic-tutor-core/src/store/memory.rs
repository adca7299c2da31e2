//! In-memory [`Store`] implementation for tests and embedded use.
//!
//! One `std::sync::RwLock` guards the whole document map, so every
//! mutation is serialized and every read sees a complete document.
//! Passages live behind an `Arc<[Passage]>` so a retrieval snapshot is a
//! reference-count bump taken under the read lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Document, DocumentMetadata, Passage};

use super::Store;

struct StoredDoc {
    doc: Document,
    passages: Arc<[Passage]>,
    /// Insertion sequence; breaks `created_at` ties in listings.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<String, StoredDoc>,
    next_seq: u64,
}

/// In-memory document store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_document(&self, doc: &Document, passages: &[Passage]) -> Result<()> {
        let mut inner = self.write()?;
        if inner.docs.contains_key(&doc.id) {
            return Err(anyhow!("document id already exists: {}", doc.id));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.docs.insert(
            doc.id.clone(),
            StoredDoc {
                doc: doc.clone(),
                passages: passages.to_vec().into(),
                seq,
            },
        );
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let inner = self.read()?;
        Ok(inner.docs.get(id).map(|s| s.doc.clone()))
    }

    async fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<DocumentMetadata>> {
        let inner = self.read()?;
        let mut stored: Vec<&StoredDoc> = inner
            .docs
            .values()
            .filter(|s| user_id.map_or(true, |u| s.doc.user_id.as_deref() == Some(u)))
            .collect();
        stored.sort_by(|a, b| {
            a.doc
                .created_at
                .cmp(&b.doc.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        Ok(stored
            .into_iter()
            .map(|s| s.doc.metadata(s.passages.len()))
            .collect())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.docs.remove(id).is_some())
    }

    async fn passages(&self, id: &str) -> Result<Option<Arc<[Passage]>>> {
        let inner = self.read()?;
        Ok(inner.docs.get(id).map(|s| Arc::clone(&s.passages)))
    }
}
