// src/select/mod.rs
//! Picks one candidate out of the day's pool.

pub mod scoring;

use std::cmp::Ordering;
use std::sync::Arc;

use crate::generate::Candidate;

pub use scoring::DefaultScorer;

/// Pluggable scoring strategy. Must be total and deterministic.
pub trait Scorer: Send + Sync {
    fn score(&self, candidate: &Candidate, recent: &[String]) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&Candidate, &[String]) -> f64 + Send + Sync,
{
    fn score(&self, candidate: &Candidate, recent: &[String]) -> f64 {
        self(candidate, recent)
    }
}

#[derive(Clone)]
pub struct Selector {
    scorer: Arc<dyn Scorer>,
}

impl Selector {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self { scorer }
    }

    /// Highest score wins; equal scores go to the earliest `attempt_index`.
    /// Sentinels are only returned when nothing else is available.
    /// `None` only for an empty pool.
    pub fn select(&self, candidates: Vec<Candidate>, recent: &[String]) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let mut first_sentinel: Option<Candidate> = None;

        for cand in candidates {
            if cand.is_sentinel() {
                if first_sentinel
                    .as_ref()
                    .map_or(true, |s| cand.attempt_index < s.attempt_index)
                {
                    first_sentinel = Some(cand);
                }
                continue;
            }

            let score = self.scorer.score(&cand, recent);
            let scored = cand.with_score(score);
            let replace = match &best {
                None => true,
                Some(b) => match score.total_cmp(&b.score.unwrap_or(f64::NEG_INFINITY)) {
                    Ordering::Greater => true,
                    Ordering::Equal => scored.attempt_index < b.attempt_index,
                    Ordering::Less => false,
                },
            };
            if replace {
                best = Some(scored);
            }
        }

        match best {
            Some(b) => {
                tracing::debug!(
                    target: "select",
                    attempt_index = b.attempt_index,
                    score = b.score.unwrap_or_default(),
                    "candidate selected"
                );
                Some(b)
            }
            None => first_sentinel,
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScorer::default()))
    }
}
