//! Boundary-aware overlapping text chunker.
//!
//! Splits document content into [`Passage`]s of roughly `target_size`
//! characters. Sizes are measured in Unicode scalar values (`char`s), never
//! bytes, so multi-byte text is never split inside a character.
//!
//! # Algorithm
//!
//! 1. Reject `overlap >= target_size` as an invalid configuration.
//! 2. Whitespace-only content yields no passages; content no longer than
//!    `target_size` yields exactly one passage (the trimmed content).
//! 3. Otherwise take a window `[start, start + target_size)`. Within the
//!    lookback window (the last `target_size / 5` chars, at least one) pick
//!    the latest paragraph break (`\n\n`), else the latest sentence end
//!    (`.`, `!`, `?` followed by whitespace). With neither, cut hard at
//!    `start + target_size`.
//! 4. Emit the trimmed span, then restart `overlap` chars before the cut,
//!    but always strictly after the emitted passage's start.
//!
//! Each passage's `offset` is the byte offset of its (trimmed) text in the
//! parent content.
//!
//! # Example
//!
//! ```rust
//! use socratic_tutor_core::chunk::chunk_text;
//!
//! let passages = chunk_text("doc-123", "Hello world.\n\nSecond paragraph.", 1000, 200).unwrap();
//! assert_eq!(passages.len(), 1);
//! assert_eq!(passages[0].offset, 0);
//! ```

use crate::error::{Result, RetrievalError};
use crate::models::Passage;

/// Default passage size in characters.
pub const DEFAULT_TARGET_CHARS: usize = 1000;

/// Default overlap between adjacent passages in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// The lookback window is `target_size / LOOKBACK_DIVISOR` chars.
const LOOKBACK_DIVISOR: usize = 5;

/// Split `content` into overlapping passages belonging to `document_id`.
///
/// # Errors
///
/// [`RetrievalError::InvalidConfiguration`] when `overlap >= target_size`
/// (this also rejects a zero `target_size`).
///
/// # Guarantees
///
/// - Passage offsets are strictly increasing and indices are `0..N`.
/// - Every passage has at most `target_size` chars.
/// - Every non-whitespace character of `content` lies inside some passage.
/// - Identical inputs always produce identical output.
pub fn chunk_text(
    document_id: &str,
    content: &str,
    target_size: usize,
    overlap: usize,
) -> Result<Vec<Passage>> {
    validate_params(target_size, overlap)?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let text = CharText::new(content);
    let total = text.chars.len();
    let mut passages = Vec::new();

    if total <= target_size {
        text.push_span(document_id, &mut passages, 0, total);
        return Ok(passages);
    }

    let lookback = (target_size / LOOKBACK_DIVISOR).max(1);
    let mut start = 0;

    loop {
        let end = start + target_size;
        if end >= total {
            text.push_span(document_id, &mut passages, start, total);
            break;
        }

        let floor = (start + 1).max(end.saturating_sub(lookback));
        let cut = text.find_break(floor, end).unwrap_or(end);
        // A boundary early in the lookback window can sit less than
        // `overlap` chars past the start of the text.
        let restart = cut.saturating_sub(overlap);

        start = match text.push_span(document_id, &mut passages, start, cut) {
            Some(emitted_at) => restart.max(emitted_at + 1),
            None => restart.max(start + 1),
        };
    }

    Ok(passages)
}

/// Check that `overlap < target_size`.
pub fn validate_params(target_size: usize, overlap: usize) -> Result<()> {
    if overlap >= target_size {
        return Err(RetrievalError::InvalidConfiguration(format!(
            "chunk overlap ({}) must be smaller than target size ({})",
            overlap, target_size
        )));
    }
    Ok(())
}

/// Content viewed as chars, with a char-index → byte-offset table.
struct CharText<'a> {
    content: &'a str,
    chars: Vec<char>,
    byte_at: Vec<usize>,
}

impl<'a> CharText<'a> {
    fn new(content: &'a str) -> Self {
        let chars: Vec<char> = content.chars().collect();
        let byte_at: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();
        Self {
            content,
            chars,
            byte_at,
        }
    }

    /// Trim `[start, end)` and append it as a passage.
    ///
    /// Returns the char index the passage starts at, or `None` when the
    /// span held only whitespace and was skipped.
    fn push_span(
        &self,
        document_id: &str,
        passages: &mut Vec<Passage>,
        start: usize,
        end: usize,
    ) -> Option<usize> {
        let mut s = start;
        while s < end && self.chars[s].is_whitespace() {
            s += 1;
        }
        let mut e = end;
        while e > s && self.chars[e - 1].is_whitespace() {
            e -= 1;
        }
        if s == e {
            return None;
        }

        let offset = self.byte_at[s];
        passages.push(Passage {
            document_id: document_id.to_string(),
            index: passages.len(),
            offset,
            text: self.content[offset..self.byte_at[e]].to_string(),
        });
        Some(s)
    }

    /// Latest paragraph break in `[floor, end]`, else latest sentence end.
    fn find_break(&self, floor: usize, end: usize) -> Option<usize> {
        (floor..=end)
            .rev()
            .find(|&p| self.is_paragraph_break(p))
            .or_else(|| (floor..=end).rev().find(|&p| self.is_sentence_end(p)))
    }

    fn is_paragraph_break(&self, p: usize) -> bool {
        if p < 2 || self.chars[p - 1] != '\n' {
            return false;
        }
        match self.chars[p - 2] {
            '\n' => true,
            '\r' => p >= 3 && self.chars[p - 3] == '\n',
            _ => false,
        }
    }

    fn is_sentence_end(&self, p: usize) -> bool {
        p >= 1
            && matches!(self.chars[p - 1], '.' | '!' | '?')
            && self.chars.get(p).map_or(true, |c| c.is_whitespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(passages: &[Passage]) -> Vec<&str> {
        passages.iter().map(|p| p.text.as_str()).collect()
    }

    fn assert_invariants(content: &str, passages: &[Passage], target: usize) {
        let mut covered = vec![false; content.len()];
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.index, i, "index mismatch at position {}", i);
            assert_eq!(&content[p.offset..p.offset + p.text.len()], p.text);
            assert!(p.text.chars().count() <= target, "passage too long: {:?}", p.text);
            assert!(!p.text.trim().is_empty());
            if i > 0 {
                assert!(p.offset > passages[i - 1].offset, "offsets not increasing");
            }
            for flag in &mut covered[p.offset..p.offset + p.text.len()] {
                *flag = true;
            }
        }
        for (i, c) in content.char_indices() {
            if !c.is_whitespace() {
                assert!(covered[i], "char {:?} at byte {} not covered", c, i);
            }
        }
    }

    /// Walk the passages left to right, appending only the part of each
    /// span not already covered, and require the original content back.
    fn assert_reconstructs(content: &str, passages: &[Passage]) {
        let mut rebuilt = String::new();
        let mut pos = 0;
        for p in passages {
            let end = p.offset + p.text.len();
            if p.offset > pos {
                let gap = &content[pos..p.offset];
                assert!(gap.trim().is_empty(), "uncovered text between passages: {:?}", gap);
                rebuilt.push_str(gap);
                pos = p.offset;
            }
            if end > pos {
                rebuilt.push_str(&content[pos..end]);
                pos = end;
            }
        }
        let tail = &content[pos..];
        assert!(tail.trim().is_empty(), "uncovered trailing text: {:?}", tail);
        rebuilt.push_str(tail);
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_empty_content() {
        assert!(chunk_text("doc1", "", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_only_content() {
        assert!(chunk_text("doc1", " \n\n\t ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_short_content_single_trimmed_passage() {
        let passages = chunk_text("doc1", "  Hello, world!\n", 100, 10).unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "Hello, world!");
        assert_eq!(passages[0].offset, 2);
        assert_eq!(passages[0].document_id, "doc1");
    }

    #[test]
    fn test_content_exactly_target_size() {
        let passages = chunk_text("doc1", "abcd", 4, 1).unwrap();
        assert_eq!(texts(&passages), vec!["abcd"]);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_target() {
        let err = chunk_text("doc1", "some text", 10, 10).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfiguration(_)));
        let err = chunk_text("doc1", "some text", 0, 0).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_invalid_configuration_checked_before_empty_content() {
        assert!(chunk_text("doc1", "", 3, 5).is_err());
    }

    #[test]
    fn test_short_sentences_overlap_by_one() {
        let content = "A. B. C.";
        let passages = chunk_text("doc1", content, 4, 1).unwrap();
        assert_eq!(texts(&passages), vec!["A. B", "B. C", "C."]);
        for pair in passages.windows(2) {
            let prev_end = pair[0].offset + pair[0].text.len();
            assert_eq!(prev_end - pair[1].offset, 1, "adjacent passages must share 1 char");
        }
        assert_invariants(content, &passages, 4);
    }

    #[test]
    fn test_prefers_sentence_end_in_lookback_window() {
        let passages = chunk_text("doc1", "The cat sat. The dog ran far away.", 15, 0).unwrap();
        assert_eq!(passages[0].text, "The cat sat.");
        assert_invariants("The cat sat. The dog ran far away.", &passages, 15);
    }

    #[test]
    fn test_prefers_paragraph_break_over_sentence_end() {
        let content = "One two three. Four five.\n\nSix. Seven eight nine ten.";
        let passages = chunk_text("doc1", content, 30, 0).unwrap();
        assert_eq!(passages[0].text, "One two three. Four five.");
        assert_eq!(passages[1].text, "Six. Seven eight nine ten.");
        assert_invariants(content, &passages, 30);
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let passages = chunk_text("doc1", "abcdefghij", 4, 0).unwrap();
        assert_eq!(texts(&passages), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_invariants_on_long_text() {
        let content = (0..60)
            .map(|i| {
                if i % 7 == 0 {
                    format!("Paragraph {} ends here.\n\n", i)
                } else {
                    format!("Sentence number {} talks about forces and motion. ", i)
                }
            })
            .collect::<String>();
        for (target, overlap) in [(80, 20), (120, 0), (50, 49), (300, 60), (100, 95)] {
            let passages = chunk_text("doc1", &content, target, overlap).unwrap();
            assert!(passages.len() > 1);
            assert_invariants(&content, &passages, target);
            assert_reconstructs(&content, &passages);
        }
    }

    #[test]
    fn test_high_overlap_with_early_sentence_break() {
        let content = "Abcdefg. hijklmnop qrstuv";
        let passages = chunk_text("d", content, 10, 9).unwrap();
        assert_eq!(passages[0].text, "Abcdefg.");
        assert_invariants(content, &passages, 10);
        assert_reconstructs(content, &passages);
    }

    #[test]
    fn test_every_overlap_below_target_on_varied_content() {
        let contents = [
            "Abcdefg. hijklmnop qrstuv",
            "A. B. C. D. E. F. G. H.",
            "One.\n\nTwo three four.\n\nFive six seven eight nine.",
            "Line one here.\r\n\r\nLine two is longer.\r\n\r\nThird!",
            "Ünïcödé wörds. Ärger über Öl! Çà et là? Fin.",
            "abcdefghijklmnopqrstuvwxyz0123456789",
            "x. y",
            "  padded start. and end.   ",
        ];
        for content in contents {
            for target in 1..=14 {
                for overlap in 0..target {
                    let passages = chunk_text("d", content, target, overlap).unwrap();
                    assert!(!passages.is_empty(), "no passages for {:?}", content);
                    assert_invariants(content, &passages, target);
                    assert_reconstructs(content, &passages);
                }
            }
        }
    }

    #[test]
    fn test_target_one_and_two() {
        let passages = chunk_text("d", "ab. c", 1, 0).unwrap();
        assert_eq!(texts(&passages), vec!["a", "b", ".", "c"]);

        let content = "ab. cd";
        let passages = chunk_text("d", content, 2, 1).unwrap();
        assert_invariants(content, &passages, 2);
        assert_reconstructs(content, &passages);
    }

    #[test]
    fn test_long_whitespace_runs_are_skipped() {
        let content = format!("alpha{}beta", " ".repeat(40));
        let passages = chunk_text("doc1", &content, 8, 2).unwrap();
        assert_eq!(passages.first().unwrap().text, "alpha");
        assert_eq!(passages.last().unwrap().text, "beta");
        assert_invariants(&content, &passages, 8);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let content = "┌──────────────────┐\n│ Hello wörld ünïcode │\n└──────────────────┘";
        let passages = chunk_text("doc1", content, 7, 2).unwrap();
        assert!(passages.len() > 1);
        assert_invariants(content, &passages, 7);
    }

    #[test]
    fn test_deterministic() {
        let content = "Alpha beta. Gamma delta!\n\nEpsilon zeta? Eta theta iota kappa.";
        let a = chunk_text("doc1", content, 12, 3).unwrap();
        let b = chunk_text("doc1", content, 12, 3).unwrap();
        assert_eq!(a, b);
    }
}
