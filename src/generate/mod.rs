// src/generate/mod.rs
//! Candidate generation: one headline in, one compliment candidate out.
//!
//! Provider failures never escape this module. After `max_retries` calls
//! without a usable text the generator returns the sentinel candidate
//! (`Candidate::is_sentinel`), so callers branch on a value instead of
//! handling an error.

pub mod prompt;
pub mod provider;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FailureKind, ProviderError};
use crate::generate::prompt::PromptTemplate;
use crate::generate::provider::{sanitize_output, GenerativeTextProvider, ModelParams};
use crate::ingest::types::Headline;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "compliment_provider_calls_total",
            "Generative provider calls by outcome."
        );
        describe_counter!(
            "compliment_generation_exhausted_total",
            "Headlines for which every provider call failed."
        );
        describe_histogram!(
            "compliment_provider_call_ms",
            "Generative provider round-trip in milliseconds."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Text returned by the provider.
    Generated,
    /// Sentinel: every attempt for this headline failed.
    Exhausted,
    /// Configured fallback text substituted by the duplicate guard.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub headline: Headline,
    pub attempt_index: u32,
    pub score: Option<f64>,
    kind: CandidateKind,
}

impl Candidate {
    pub fn generated(text: &str, headline: Headline, attempt_index: u32) -> Self {
        Self {
            text: text.to_string(),
            headline,
            attempt_index,
            score: None,
            kind: CandidateKind::Generated,
        }
    }

    /// The sentinel failure candidate.
    pub fn exhausted(headline: Headline, attempt_index: u32) -> Self {
        Self {
            text: String::new(),
            headline,
            attempt_index,
            score: None,
            kind: CandidateKind::Exhausted,
        }
    }

    pub fn fallback(text: &str, headline: Headline, attempt_index: u32) -> Self {
        Self {
            text: text.to_string(),
            headline,
            attempt_index,
            score: None,
            kind: CandidateKind::Fallback,
        }
    }

    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    pub fn is_sentinel(&self) -> bool {
        self.kind == CandidateKind::Exhausted
    }

    pub fn is_fallback(&self) -> bool {
        self.kind == CandidateKind::Fallback
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total provider calls per headline (first call included).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-call deadline; exceeding it counts as a transient failure.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            call_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows the `n`-th (0-based) transient failure:
    /// `base_delay * 2^n`, capped at `max_delay`.
    pub fn backoff(&self, n: u32) -> Duration {
        let factor = 1u32.checked_shl(n.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

pub struct CandidateGenerator {
    provider: Arc<dyn GenerativeTextProvider>,
    template: PromptTemplate,
    params: ModelParams,
    policy: RetryPolicy,
}

impl CandidateGenerator {
    pub fn new(
        provider: Arc<dyn GenerativeTextProvider>,
        template: PromptTemplate,
        params: ModelParams,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            template,
            params,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate with the configured template and model parameters.
    pub async fn generate(&self, headline: &Headline, attempt_index: u32) -> Candidate {
        self.generate_with(headline, &self.template, &self.params, attempt_index)
            .await
    }

    pub async fn generate_with(
        &self,
        headline: &Headline,
        template: &PromptTemplate,
        params: &ModelParams,
        attempt_index: u32,
    ) -> Candidate {
        ensure_metrics_described();

        let prompt = template.render(headline);
        let provider = self.provider.name();
        let max_calls = self.policy.max_retries.max(1);
        let mut transient = 0u32;
        let mut invalid = 0u32;

        for call in 0..max_calls {
            let t0 = std::time::Instant::now();
            let outcome = match tokio::time::timeout(
                self.policy.call_timeout,
                self.provider.complete(&prompt, params),
            )
            .await
            {
                Ok(r) => r,
                Err(_) => Err(ProviderError::Timeout),
            };
            histogram!("compliment_provider_call_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

            let failure = match outcome {
                Ok(raw) => {
                    let text = sanitize_output(&raw);
                    if !text.is_empty() {
                        counter!("compliment_provider_calls_total", "provider" => provider, "result" => "ok")
                            .increment(1);
                        tracing::debug!(
                            target: "generate",
                            attempt_index,
                            call,
                            "candidate generated"
                        );
                        return Candidate::generated(&text, headline.clone(), attempt_index);
                    }
                    invalid += 1;
                    FailureKind::ProviderInvalidResponse
                }
                Err(e) if e.is_transient() => {
                    transient += 1;
                    tracing::debug!(target: "generate", error = %e, call, "transient provider failure");
                    FailureKind::ProviderTransient
                }
                Err(e) => {
                    invalid += 1;
                    tracing::debug!(target: "generate", error = %e, call, "invalid provider response");
                    FailureKind::ProviderInvalidResponse
                }
            };
            counter!("compliment_provider_calls_total", "provider" => provider, "result" => failure.as_str())
                .increment(1);

            let has_next = call + 1 < max_calls;
            if has_next && failure == FailureKind::ProviderTransient {
                tokio::time::sleep(self.policy.backoff(transient - 1)).await;
            }
        }

        counter!("compliment_generation_exhausted_total").increment(1);
        tracing::warn!(
            target: "generate",
            reason = FailureKind::GenerationExhausted.as_str(),
            attempt_index,
            transient,
            invalid,
            "provider attempts exhausted, returning sentinel"
        );
        Candidate::exhausted(headline.clone(), attempt_index)
    }
}
