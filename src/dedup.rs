//! dedup.rs — keeps a day's compliment from repeating one inside the history window.

use metrics::counter;
use std::collections::HashSet;
use std::future::Future;

use crate::error::FailureKind;
use crate::generate::Candidate;

/// Dedup key: case-fold, trim, collapse inner whitespace.
pub fn normalize_key(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct DuplicateGuard {
    max_regenerations: u32,
    fallback_text: String,
}

impl DuplicateGuard {
    pub fn new(max_regenerations: u32, fallback_text: impl Into<String>) -> Self {
        Self {
            max_regenerations,
            fallback_text: fallback_text.into(),
        }
    }

    pub fn fallback_text(&self) -> &str {
        &self.fallback_text
    }

    /// True if `text` repeats an entry of `history`. The fallback text is exempt.
    pub fn is_duplicate(&self, text: &str, history: &[String]) -> bool {
        let key = normalize_key(text);
        if key == normalize_key(&self.fallback_text) {
            return false;
        }
        history.iter().any(|h| normalize_key(h) == key)
    }

    /// Return `candidate` if it is usable and unique; otherwise call
    /// `regenerate` up to `max_regenerations` times, then give up with a
    /// fallback candidate carrying the configured fallback text.
    pub async fn check_and_resolve<F, Fut>(
        &self,
        candidate: Candidate,
        history: &[String],
        mut regenerate: F,
    ) -> Candidate
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Candidate>,
    {
        let fallback_key = normalize_key(&self.fallback_text);
        let seen: HashSet<String> = history
            .iter()
            .map(|t| normalize_key(t))
            .filter(|k| *k != fallback_key)
            .collect();

        let mut current = candidate;
        let mut regenerations = 0u32;
        let last_failure = loop {
            let failure = if current.is_sentinel() {
                FailureKind::GenerationExhausted
            } else if seen.contains(&normalize_key(&current.text)) {
                FailureKind::DuplicateExhausted
            } else {
                return current;
            };

            tracing::debug!(
                target: "dedup",
                attempt_index = current.attempt_index,
                reason = failure.as_str(),
                regenerations,
                "candidate rejected"
            );
            if regenerations >= self.max_regenerations {
                break failure;
            }
            regenerations += 1;
            current = regenerate().await;
        };

        counter!("compliment_fallback_total", "kind" => last_failure.as_str()).increment(1);
        tracing::warn!(
            target: "dedup",
            reason = last_failure.as_str(),
            regenerations,
            "no unique candidate, using fallback text"
        );
        Candidate::fallback(&self.fallback_text, current.headline, current.attempt_index)
    }
}
