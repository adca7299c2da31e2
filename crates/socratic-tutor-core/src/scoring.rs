//! Passage relevance scoring.
//!
//! The [`Scorer`] trait is the seam between the retriever and the ranking
//! method. [`LexicalScorer`] is the default: cosine similarity between the
//! term-frequency vectors of the query and the passage.
//!
//! Term frequencies are accumulated in `BTreeMap`s so floating-point sums
//! always run in the same order; identical inputs give bit-identical scores.

use std::collections::BTreeMap;

/// Scores how relevant a passage is to a query.
///
/// Implementations must be deterministic: the same `(query, passage)` pair
/// always yields the same score, independent of call order or wall-clock
/// time. Higher is more relevant.
pub trait Scorer: Send + Sync {
    /// Short identifier for logs (e.g. `"lexical"`).
    fn name(&self) -> &str;

    /// Relevance of `passage` to `query`.
    fn score(&self, query: &str, passage: &str) -> f64;
}

/// Words too common to carry relevance.
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "does", "for",
    "from", "how", "i", "if", "in", "into", "is", "it", "its", "of", "on", "or", "s", "so",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to",
    "was", "what", "when", "where", "which", "who", "why", "will", "with", "you",
];

/// Term-frequency cosine similarity.
///
/// Tokens are maximal runs of alphanumeric characters, lowercased, with
/// [`STOPWORDS`] removed. Scores lie in `[0.0, 1.0]` and are symmetric:
/// `score(a, b) == score(b, a)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Scorer for LexicalScorer {
    fn name(&self) -> &str {
        "lexical"
    }

    fn score(&self, query: &str, passage: &str) -> f64 {
        let q = term_frequencies(query);
        let p = term_frequencies(passage);
        if q.is_empty() || p.is_empty() {
            return 0.0;
        }

        let dot: f64 = q
            .iter()
            .filter_map(|(term, qf)| p.get(term).map(|pf| qf * pf))
            .sum();
        if dot == 0.0 {
            return 0.0;
        }

        dot / (norm(&q) * norm(&p))
    }
}

/// Lowercased, stopword-free tokens of `text` in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn term_frequencies(text: &str) -> BTreeMap<String, f64> {
    let mut tf = BTreeMap::new();
    for token in tokenize(text) {
        *tf.entry(token).or_insert(0.0) += 1.0;
    }
    tf
}

fn norm(tf: &BTreeMap<String, f64>) -> f64 {
    tf.values().map(|f| f * f).sum::<f64>().sqrt()
}
