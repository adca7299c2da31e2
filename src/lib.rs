//! # Socratic Tutor
//!
//! Document store and passage retriever behind a Socratic AI tutor.
//!
//! Students upload study notes (plain text, Markdown, PDF, or DOCX). Each
//! document is split into overlapping passages and persisted in SQLite. When
//! the student asks a question about a document, the most relevant passages
//! are selected and handed to the language model, which answers with a
//! clarifying question, a concept hint, and feedback rather than the answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ Extract  │──▶│  Retriever   │──▶│  SQLite   │
//! │ txt/pdf  │   │ chunk+score  │   │ documents │
//! └──────────┘   └──────┬───────┘   └───────────┘
//!                       │
//!            ┌──────────┴─────────┐
//!            ▼                    ▼
//!       ┌──────────┐        ┌──────────┐      ┌─────┐
//!       │   CLI    │        │   HTTP   │─────▶│ LLM │
//!       │ (tutor)  │        │  (axum)  │      └─────┘
//!       └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tutor init                                   # create database
//! tutor add notes.md --subject physics         # store a document
//! tutor retrieve <id> "inertia law of motion"  # top passages
//! tutor serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`commands`] | CLI command implementations |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` backend |
//! | [`extract`] | Text extraction from uploaded files |
//! | [`knowledge`] | Static knowledge base loader |
//! | [`llm`] | Socratic tutor LLM client |
//! | [`server`] | HTTP API server |

pub mod commands;
pub mod config;
pub mod db;
pub mod extract;
pub mod knowledge;
pub mod llm;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
