//! Static knowledge base.
//!
//! A curated set of short passages, each tagged with a subject, a level,
//! and a source label. Questions that name no document are answered from
//! here: candidates are filtered by the requested subject and level, then
//! ranked with the same [`Scorer`] used for document passages.
//!
//! The base is loaded once at startup (the application crate reads it from
//! JSON files) and is immutable afterwards, so searches take no locks.

use serde::{Deserialize, Serialize};

use crate::models::{Level, Subject};
use crate::scoring::Scorer;

/// One curated passage of subject knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePassage {
    pub text: String,
    pub subject: Subject,
    pub level: Level,
    /// Where the passage came from, e.g. `"physics.json"`.
    pub source: String,
}

/// A knowledge passage with its relevance score for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredKnowledge {
    pub passage: KnowledgePassage,
    pub score: f64,
}

/// Immutable collection of [`KnowledgePassage`]s in load order.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    passages: Vec<KnowledgePassage>,
}

impl KnowledgeBase {
    /// Build a base from `passages`, dropping any with blank text.
    pub fn new(passages: Vec<KnowledgePassage>) -> Self {
        Self {
            passages: passages
                .into_iter()
                .filter(|p| !p.text.trim().is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[KnowledgePassage] {
        &self.passages
    }

    /// The `k` passages most relevant to `query`.
    ///
    /// `subject` and `level`, when given, restrict the candidates to exact
    /// matches. Results are ordered by score (desc) then load order (asc);
    /// zero-score candidates still fill the remaining slots.
    pub fn search(
        &self,
        scorer: &dyn Scorer,
        query: &str,
        subject: Option<Subject>,
        level: Option<Level>,
        k: usize,
    ) -> Vec<ScoredKnowledge> {
        let mut scored: Vec<(usize, f64)> = self
            .passages
            .iter()
            .enumerate()
            .filter(|(_, p)| subject.map_or(true, |s| p.subject == s))
            .filter(|(_, p)| level.map_or(true, |l| p.level == l))
            .map(|(i, p)| (i, scorer.score(query, &p.text)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredKnowledge {
                passage: self.passages[i].clone(),
                score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::LexicalScorer;

    fn passage(text: &str, subject: Subject, level: Level) -> KnowledgePassage {
        KnowledgePassage {
            text: text.to_string(),
            subject,
            level,
            source: "test.json".to_string(),
        }
    }

    fn base() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            passage(
                "Newton's first law: an object keeps its velocity unless a net force acts on it.",
                Subject::Physics,
                Level::Beginner,
            ),
            passage(
                "Momentum is the product of mass and velocity and is conserved in closed systems.",
                Subject::Physics,
                Level::Advanced,
            ),
            passage(
                "Photosynthesis stores light energy as glucose in plant cells.",
                Subject::Biology,
                Level::Beginner,
            ),
            passage("   ", Subject::Physics, Level::Beginner),
        ])
    }

    #[test]
    fn test_blank_passages_dropped() {
        assert_eq!(base().len(), 3);
        assert!(KnowledgeBase::default().is_empty());
    }

    #[test]
    fn test_search_ranks_by_score() {
        let results = base().search(&LexicalScorer::new(), "velocity force", None, None, 3);
        assert_eq!(results.len(), 3);
        assert!(results[0].passage.text.starts_with("Newton's first law"));
        assert!(results[0].score > results[1].score);
        assert_eq!(results[2].score, 0.0);
    }

    #[test]
    fn test_search_filters_by_subject_and_level() {
        let kb = base();
        let scorer = LexicalScorer::new();

        let physics = kb.search(&scorer, "energy", Some(Subject::Physics), None, 10);
        assert_eq!(physics.len(), 2);
        assert!(physics.iter().all(|s| s.passage.subject == Subject::Physics));

        let advanced = kb.search(&scorer, "mass", Some(Subject::Physics), Some(Level::Advanced), 10);
        assert_eq!(advanced.len(), 1);
        assert!(advanced[0].passage.text.starts_with("Momentum"));

        assert!(kb.search(&scorer, "war", Some(Subject::History), None, 10).is_empty());
    }

    #[test]
    fn test_ties_keep_load_order() {
        let results = base().search(&LexicalScorer::new(), "unrelated", None, None, 2);
        assert_eq!(results.len(), 2);
        assert!(results[0].passage.text.starts_with("Newton's first law"));
        assert!(results[1].passage.text.starts_with("Momentum"));
    }
}
