//! Default candidate scoring.
//!
//! Three signals, summed:
//! - `length`   : 1.0 when the text length (chars) is inside `[min_len, max_len]`, else 0.0
//! - `novelty`  : 1 - highest normalized Levenshtein similarity to a recent text (1.0 if none)
//! - `banned`   : -2.0 when the text mentions an ignored topic (case-insensitive)
//!
//! Pure and deterministic: same inputs, same score.

use super::Scorer;
use crate::dedup::normalize_key;
use crate::generate::Candidate;

const BANNED_PENALTY: f64 = -2.0;

#[derive(Debug, Clone)]
pub struct DefaultScorer {
    min_len: usize,
    max_len: usize,
    banned: Vec<String>,
}

impl DefaultScorer {
    pub fn new(min_len: usize, max_len: usize, banned: Vec<String>) -> Self {
        let banned = banned
            .into_iter()
            .map(|b| normalize_key(&b))
            .filter(|b| !b.is_empty())
            .collect();
        Self {
            min_len,
            max_len: max_len.max(min_len),
            banned,
        }
    }

    fn length_bonus(&self, text: &str) -> f64 {
        let n = text.chars().count();
        if (self.min_len..=self.max_len).contains(&n) {
            1.0
        } else {
            0.0
        }
    }

    fn banned_penalty(&self, key: &str) -> f64 {
        if self.banned.iter().any(|b| key.contains(b.as_str())) {
            BANNED_PENALTY
        } else {
            0.0
        }
    }

    fn novelty(key: &str, recent: &[String]) -> f64 {
        let closest = recent
            .iter()
            .map(|r| strsim::normalized_levenshtein(key, &normalize_key(r)))
            .fold(0.0f64, f64::max);
        (1.0 - closest).clamp(0.0, 1.0)
    }
}

impl Default for DefaultScorer {
    fn default() -> Self {
        Self::new(40, 280, Vec::new())
    }
}

impl Scorer for DefaultScorer {
    fn score(&self, candidate: &Candidate, recent: &[String]) -> f64 {
        if candidate.is_sentinel() {
            return f64::NEG_INFINITY;
        }
        let key = normalize_key(&candidate.text);
        self.length_bonus(&candidate.text) + Self::novelty(&key, recent) + self.banned_penalty(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Headline;

    fn c(text: &str) -> Candidate {
        Candidate::generated(text, Headline::fallback("h", None), 0)
    }

    #[test]
    fn in_range_text_beats_too_short_text() {
        let s = DefaultScorer::new(10, 100, vec![]);
        assert!(s.score(&c("You are as bright as a new phone"), &[]) > s.score(&c("Hi"), &[]));
    }

    #[test]
    fn banned_topic_is_penalized() {
        let s = DefaultScorer::new(0, 100, vec!["War".into()]);
        let clean = s.score(&c("You rally like the stocks"), &[]);
        let banned = s.score(&c("You win like a war general"), &[]);
        assert!(clean > banned);
    }

    #[test]
    fn near_copy_of_recent_text_scores_lower() {
        let s = DefaultScorer::new(0, 100, vec![]);
        let recent = vec!["You are brilliant like the sun".to_string()];
        let copy = s.score(&c("You are brilliant like the sun!"), &recent);
        let fresh = s.score(&c("Your code compiles on the first try"), &recent);
        assert!(fresh > copy);
    }

    #[test]
    fn score_is_deterministic() {
        let s = DefaultScorer::default();
        let recent = vec!["a".to_string(), "b".to_string()];
        let cand = c("Some candidate text that is long enough to count");
        assert_eq!(s.score(&cand, &recent), s.score(&cand, &recent));
    }
}
