//! Document store and passage retriever.
//!
//! [`Retriever`] owns the document lifecycle (add, get, list, delete) and
//! answers relevance queries by ranking a document's passages with a
//! pluggable [`Scorer`]. It operates entirely through the [`Store`] trait;
//! the calling application chooses the backend and injects the retriever
//! wherever it is needed.
//!
//! # Ranking
//!
//! 1. Snapshot the document's cached passages in one store read.
//! 2. Score every passage against the query text.
//! 3. Sort by score (desc), then offset (asc).
//! 4. Truncate to `k`.
//!
//! Questions without a document are ranked against the optional
//! [`KnowledgeBase`] with the same scorer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunk::{chunk_text, validate_params, DEFAULT_OVERLAP_CHARS, DEFAULT_TARGET_CHARS};
use crate::error::{Result, RetrievalError};
use crate::knowledge::{KnowledgeBase, ScoredKnowledge};
use crate::models::{Document, DocumentMetadata, Level, Passage, ScoredPassage, Subject};
use crate::scoring::{LexicalScorer, Scorer};
use crate::store::Store;

/// Scoring yields back to the executor after this many passages.
const YIELD_EVERY: usize = 256;

/// Chunking parameters applied to every added document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    /// Target passage size in chars.
    pub target_size: usize,
    /// Overlap between adjacent passages in chars.
    pub overlap: usize,
}

impl ChunkParams {
    /// Validated constructor; `overlap` must be smaller than `target_size`.
    pub fn new(target_size: usize, overlap: usize) -> Result<Self> {
        validate_params(target_size, overlap)?;
        Ok(Self {
            target_size,
            overlap,
        })
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_CHARS,
            overlap: DEFAULT_OVERLAP_CHARS,
        }
    }
}

/// Input for [`Retriever::add_document`].
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub subject: Subject,
    pub level: Level,
    pub content: String,
    pub user_id: Option<String>,
}

/// A newly stored document and the number of passages it was split into.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedDocument {
    pub document: Document,
    pub passage_count: usize,
}

impl AddedDocument {
    pub fn metadata(&self) -> DocumentMetadata {
        self.document.metadata(self.passage_count)
    }
}

/// The document store and retriever.
pub struct Retriever {
    store: Arc<dyn Store>,
    scorer: Arc<dyn Scorer>,
    chunking: ChunkParams,
    knowledge: Arc<KnowledgeBase>,
}

impl Retriever {
    /// Create a retriever over `store` using the [`LexicalScorer`].
    pub fn new(store: Arc<dyn Store>, chunking: ChunkParams) -> Self {
        Self {
            store,
            scorer: Arc::new(LexicalScorer::new()),
            chunking,
            knowledge: Arc::new(KnowledgeBase::default()),
        }
    }

    /// Replace the passage scorer.
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Attach the static knowledge base searched by [`search_knowledge`](Self::search_knowledge).
    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = Arc::new(knowledge);
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn chunking(&self) -> ChunkParams {
        self.chunking
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// Store a new document and its passages under a fresh id.
    ///
    /// Re-adding identical content creates a second, distinct document.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::EmptyContent`] if `content` is blank.
    pub async fn add_document(&self, new: NewDocument) -> Result<AddedDocument> {
        if new.content.trim().is_empty() {
            return Err(RetrievalError::EmptyContent);
        }

        let id = Uuid::new_v4().to_string();
        let passages = chunk_text(
            &id,
            &new.content,
            self.chunking.target_size,
            self.chunking.overlap,
        )?;

        let doc = Document {
            id,
            filename: new.filename,
            subject: new.subject,
            level: new.level,
            // Millisecond precision, the resolution stores persist.
            created_at: Utc::now().trunc_subsecs(3),
            user_id: new.user_id,
            content: new.content,
        };

        self.store.insert_document(&doc, &passages).await?;

        info!(
            document_id = %doc.id,
            filename = %doc.filename,
            chars = doc.content.chars().count(),
            passages = passages.len(),
            "document added"
        );

        Ok(AddedDocument {
            document: doc,
            passage_count: passages.len(),
        })
    }

    /// Fetch a document by id.
    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| RetrievalError::NotFound(id.to_string()))
    }

    /// Document metadata in creation order, optionally for one user only.
    pub async fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<DocumentMetadata>> {
        Ok(self.store.list_documents(user_id).await?)
    }

    /// Delete a document and its cached passages.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        if !self.store.delete_document(id).await? {
            return Err(RetrievalError::NotFound(id.to_string()));
        }
        info!(document_id = %id, "document deleted");
        Ok(())
    }

    /// All passages of a document in offset order.
    pub async fn passages(&self, id: &str) -> Result<Vec<Passage>> {
        let passages = self
            .store
            .passages(id)
            .await?
            .ok_or_else(|| RetrievalError::NotFound(id.to_string()))?;
        Ok(passages.to_vec())
    }

    /// The `k` passages of `document_id` most relevant to `query`.
    ///
    /// Results are ordered by score (desc) then offset (asc); a document with
    /// fewer than `k` passages returns all of them.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::InvalidArgument`] if `k == 0`.
    /// - [`RetrievalError::NotFound`] if the document does not exist.
    pub async fn retrieve(
        &self,
        document_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredPassage>> {
        if k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let passages = self
            .store
            .passages(document_id)
            .await?
            .ok_or_else(|| RetrievalError::NotFound(document_id.to_string()))?;

        let mut scored: Vec<(usize, f64)> = Vec::with_capacity(passages.len());
        for (i, passage) in passages.iter().enumerate() {
            if i > 0 && i % YIELD_EVERY == 0 {
                yield_now().await;
            }
            scored.push((i, self.scorer.score(query, &passage.text)));
        }

        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then(passages[a.0].offset.cmp(&passages[b.0].offset))
        });
        scored.truncate(k);

        let results: Vec<ScoredPassage> = scored
            .into_iter()
            .map(|(i, score)| ScoredPassage {
                passage: passages[i].clone(),
                score,
            })
            .collect();

        debug!(
            document_id = %document_id,
            scorer = self.scorer.name(),
            candidates = passages.len(),
            k,
            hits = results.len(),
            "passages retrieved"
        );

        Ok(results)
    }

    /// The `k` knowledge-base passages most relevant to `query`, optionally
    /// restricted to one subject and/or level.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidArgument`] if `k == 0`.
    pub fn search_knowledge(
        &self,
        query: &str,
        subject: Option<Subject>,
        level: Option<Level>,
        k: usize,
    ) -> Result<Vec<ScoredKnowledge>> {
        if k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let results = self
            .knowledge
            .search(self.scorer.as_ref(), query, subject, level, k);

        debug!(
            scorer = self.scorer.name(),
            candidates = self.knowledge.len(),
            subject = ?subject,
            level = ?level,
            k,
            hits = results.len(),
            "knowledge searched"
        );

        Ok(results)
    }
}

/// Yield once to the executor so a dropped request stops between batches.
fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Hand-rolled `yield_now`: the core is runtime-agnostic, so `tokio::task::yield_now` is unavailable.
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
