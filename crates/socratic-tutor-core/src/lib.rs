//! # Socratic Tutor Core
//!
//! Runtime-agnostic logic for the Socratic Tutor document retrieval
//! subsystem: document models, the passage chunker, pluggable passage
//! scoring, the store abstraction, the static knowledge base, and the
//! [`Retriever`](retriever::Retriever) service that ties them together.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies.

pub mod chunk;
pub mod error;
pub mod knowledge;
pub mod models;
pub mod retriever;
pub mod scoring;
pub mod store;

pub use error::RetrievalError;
pub use knowledge::KnowledgeBase;
pub use retriever::{AddedDocument, ChunkParams, Retriever};
