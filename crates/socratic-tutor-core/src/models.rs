//! Core data models for the document store and retriever.
//!
//! These types represent the uploaded documents, the passages derived from
//! them, and the scored results returned by a retrieval query.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Academic subject a document or question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Math,
    Physics,
    Biology,
    History,
    Chemistry,
    #[default]
    General,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Math,
        Subject::Physics,
        Subject::Biology,
        Subject::History,
        Subject::Chemistry,
        Subject::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Physics => "physics",
            Subject::Biology => "biology",
            Subject::History => "history",
            Subject::Chemistry => "chemistry",
            Subject::General => "general",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == wanted)
            .ok_or_else(|| {
                RetrievalError::InvalidArgument(format!(
                    "unknown subject '{}'; valid subjects: {}",
                    s,
                    join_names(Subject::ALL.iter().map(Subject::as_str))
                ))
            })
    }
}

/// Difficulty level a document or question is pitched at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| {
                RetrievalError::InvalidArgument(format!(
                    "unknown level '{}'; valid levels: {}",
                    s,
                    join_names(Level::ALL.iter().map(Level::as_str))
                ))
            })
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// An uploaded document. Immutable once created; owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub subject: Subject,
    pub level: Level,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub content: String,
}

impl Document {
    /// Metadata view of this document, without the content body.
    pub fn metadata(&self, passage_count: usize) -> DocumentMetadata {
        DocumentMetadata {
            id: self.id.clone(),
            filename: self.filename.clone(),
            subject: self.subject,
            level: self.level,
            created_at: self.created_at,
            user_id: self.user_id.clone(),
            content_chars: self.content.chars().count(),
            passage_count,
        }
    }
}

/// Document listing entry. Excludes `content` so listings stay small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub filename: String,
    pub subject: Subject,
    pub level: Level,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub content_chars: usize,
    pub passage_count: usize,
}

/// A contiguous slice of a document's content.
///
/// `offset` is a byte offset into the parent content, so
/// `&content[offset..offset + text.len()] == text` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub document_id: String,
    pub index: usize,
    pub offset: usize,
    pub text: String,
}

/// A passage together with its relevance score for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f64,
}
