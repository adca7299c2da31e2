//! Knowledge directory loader.
//!
//! Reads every `*.json` file in the configured `[knowledge].dir` (in file
//! name order) into a [`KnowledgeBase`]. Each file holds an `entries` array:
//!
//! ```json
//! {
//!   "entries": [
//!     { "text": "Inertia is ...", "subject": "physics", "level": "beginner", "source": "Physics primer" }
//!   ]
//! }
//! ```
//!
//! `subject` defaults to `general`, `level` to `beginner`, and `source` to
//! the file name. Entries with blank text are skipped. An unknown subject or
//! level fails the load with the file and entry position in the message.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use socratic_tutor_core::knowledge::{KnowledgeBase, KnowledgePassage};
use socratic_tutor_core::models::{Level, Subject};

use crate::config::Config;

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    entries: Vec<KnowledgeEntry>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeEntry {
    #[serde(default)]
    text: String,
    subject: Option<String>,
    level: Option<String>,
    source: Option<String>,
}

/// Load the knowledge base named by `[knowledge].dir`, or an empty one when
/// no directory is configured.
pub fn load_from_config(config: &Config) -> Result<KnowledgeBase> {
    match &config.knowledge.dir {
        Some(dir) => load_knowledge_dir(dir),
        None => Ok(KnowledgeBase::default()),
    }
}

/// Load every `*.json` file in `dir`. A missing directory yields an empty
/// base with a warning.
pub fn load_knowledge_dir(dir: &Path) -> Result<KnowledgeBase> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "knowledge directory not found; continuing without it");
        return Ok(KnowledgeBase::default());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read knowledge directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();

    let mut passages = Vec::new();
    for path in &files {
        passages.extend(load_file(path)?);
    }

    let knowledge = KnowledgeBase::new(passages);
    info!(
        dir = %dir.display(),
        files = files.len(),
        passages = knowledge.len(),
        "knowledge loaded"
    );
    Ok(knowledge)
}

fn load_file(path: &Path) -> Result<Vec<KnowledgePassage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge file: {}", path.display()))?;
    let file: KnowledgeFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse knowledge file: {}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let mut passages = Vec::with_capacity(file.entries.len());
    for (i, entry) in file.entries.into_iter().enumerate() {
        if entry.text.trim().is_empty() {
            continue;
        }
        let subject = match entry.subject.as_deref() {
            Some(s) => s
                .parse()
                .with_context(|| format!("{}: entry {}", path.display(), i))?,
            None => Subject::General,
        };
        let level = match entry.level.as_deref() {
            Some(l) => l
                .parse()
                .with_context(|| format!("{}: entry {}", path.display(), i))?,
            None => Level::Beginner,
        };
        passages.push(KnowledgePassage {
            text: entry.text,
            subject,
            level,
            source: entry.source.unwrap_or_else(|| file_name.clone()),
        });
    }
    Ok(passages)
}
