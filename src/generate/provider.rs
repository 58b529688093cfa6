//! Generative text provider abstraction + OpenAI chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;
use crate::generate::prompt::Prompt;

/// Hard cap on a sanitized compliment, in chars.
pub const MAX_OUTPUT_CHARS: usize = 400;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
        }
    }
}

/// One completion per call; the caller owns retries and timeouts.
#[async_trait]
pub trait GenerativeTextProvider: Send + Sync {
    async fn complete(&self, prompt: &Prompt, params: &ModelParams) -> Result<String, ProviderError>;
    /// Provider name for diagnostics/metric labels.
    fn name(&self) -> &'static str;
}

/// OpenAI provider (Chat Completions API, JSON object output).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("daily-compliment/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            url: CHAT_COMPLETIONS_URL.to_string(),
        }
    }

    /// Any OpenAI-compatible endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}
#[derive(Deserialize)]
struct ComplimentJson {
    compliment: String,
}

/// Pull the compliment out of a JSON object reply; plain text is accepted as-is.
pub fn extract_compliment(content: &str) -> String {
    match serde_json::from_str::<ComplimentJson>(content.trim()) {
        Ok(v) => v.compliment,
        Err(_) => content.to_string(),
    }
}

#[async_trait]
impl GenerativeTextProvider for OpenAiProvider {
    async fn complete(&self, prompt: &Prompt, params: &ModelParams) -> Result<String, ProviderError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ProviderError::Malformed("OPENAI_API_KEY not configured".into()));
        };

        let system = format!(
            "{}\nRespond with a JSON object of the form {{\"compliment\": \"...\"}}.",
            prompt.system
        );
        let req = Req {
            model: &params.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &system,
                },
                Msg {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: params.temperature,
            max_tokens: 200,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("openai json: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(extract_compliment(&content))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// Single line, collapsed whitespace, no wrapping quotes, <= MAX_OUTPUT_CHARS.
pub fn sanitize_output(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_OUTPUT_CHARS));
    let mut prev_space = false;
    let mut count = 0usize;
    for ch in input.chars() {
        let c = if ch.is_whitespace() || ch.is_control() {
            ' '
        } else {
            ch
        };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
                count += 1;
            }
            prev_space = true;
        } else {
            out.push(c);
            count += 1;
            prev_space = false;
        }
        if count >= MAX_OUTPUT_CHARS {
            break;
        }
    }
    let trimmed = out.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}
