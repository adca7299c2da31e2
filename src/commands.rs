//! CLI command implementations.
//!
//! Each `run_*` function backs one `tutor` subcommand: it opens the
//! SQLite-backed [`Retriever`], performs the operation, and prints the
//! result to stdout. Failures propagate as `anyhow` errors so `main` can
//! report them and exit non-zero.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use socratic_tutor_core::chunk::chunk_text;
use socratic_tutor_core::models::{Level, Subject};
use socratic_tutor_core::retriever::NewDocument;
use socratic_tutor_core::{ChunkParams, Retriever};

use crate::config::Config;
use crate::db;
use crate::extract::{apply_upload_rules, extract_text};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Open the database (creating the schema if needed) and wrap it in a retriever.
pub async fn open_retriever(config: &Config) -> Result<Retriever> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(Retriever::new(
        Arc::new(SqliteStore::new(pool)),
        config.chunking.params(),
    ))
}

fn read_document(path: &Path) -> Result<(String, String)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    let text = extract_text(&filename, &bytes)?;
    Ok((filename, text))
}

pub async fn run_add(
    config: &Config,
    path: &Path,
    subject: Subject,
    level: Level,
    user_id: Option<String>,
) -> Result<()> {
    let (filename, text) = read_document(path)?;
    let content = apply_upload_rules(text, &config.upload)?;

    let retriever = open_retriever(config).await?;
    let added = retriever
        .add_document(NewDocument {
            filename,
            subject,
            level,
            content,
            user_id,
        })
        .await?;
    let doc = &added.document;

    println!("added {}", doc.id);
    println!("  filename: {}", doc.filename);
    println!("  subject:  {}", doc.subject);
    println!("  level:    {}", doc.level);
    println!("  passages: {}", added.passage_count);
    Ok(())
}

pub async fn run_list(config: &Config, user_id: Option<&str>) -> Result<()> {
    let retriever = open_retriever(config).await?;
    let documents = retriever.list_documents(user_id).await?;

    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for doc in &documents {
        println!(
            "{}  {}  {}/{}  {} chars  {} passages  {}",
            doc.id,
            doc.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
            doc.subject,
            doc.level,
            doc.content_chars,
            doc.passage_count,
            doc.filename,
        );
    }
    println!("{} document(s)", documents.len());
    Ok(())
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let retriever = open_retriever(config).await?;
    let doc = retriever.get_document(id).await?;
    let passages = retriever.passages(id).await?;

    println!("--- Document ---");
    println!("id:         {}", doc.id);
    println!("filename:   {}", doc.filename);
    println!("subject:    {}", doc.subject);
    println!("level:      {}", doc.level);
    println!("created_at: {}", doc.created_at.format("%Y-%m-%dT%H:%M:%SZ"));
    if let Some(ref user) = doc.user_id {
        println!("user_id:    {}", user);
    }
    println!();

    println!("--- Content ---");
    println!("{}", doc.content);
    println!();

    println!("--- Passages ({}) ---", passages.len());
    for passage in &passages {
        println!("[passage {} @ {}]", passage.index, passage.offset);
        println!("{}", passage.text);
        println!();
    }
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let retriever = open_retriever(config).await?;
    retriever.delete_document(id).await?;
    println!("deleted {}", id);
    Ok(())
}

pub async fn run_retrieve(config: &Config, id: &str, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.default_k);
    let retriever = open_retriever(config).await?;
    let results = retriever.retrieve(id, query, k).await?;

    for (rank, hit) in results.iter().enumerate() {
        println!(
            "{}. [score: {:.4}] passage {} @ {}",
            rank + 1,
            hit.score,
            hit.passage.index,
            hit.passage.offset
        );
        println!("    {}", hit.passage.text.replace('\n', "\n    "));
        println!();
    }
    println!("{} result(s)", results.len());
    Ok(())
}

/// Chunk a file without touching the database.
pub fn run_chunk(path: &Path, params: ChunkParams) -> Result<()> {
    let (filename, text) = read_document(path)?;
    let passages = chunk_text(&filename, &text, params.target_size, params.overlap)?;

    for passage in &passages {
        println!(
            "[passage {} @ {}, {} chars]",
            passage.index,
            passage.offset,
            passage.text.chars().count()
        );
        println!("{}", passage.text);
        println!();
    }
    println!("{} passage(s)", passages.len());
    Ok(())
}
