//! LLM-backed fact extraction.
//!
//! The pipeline talks to the model through the [`LlmExtractor`] trait:
//!
//! - **[`DisabledExtractor`]** always returns no facts, so extraction falls
//!   through to the heuristic tier.
//! - **[`OpenAiExtractor`]** calls an OpenAI-compatible chat completions
//!   endpoint with a JSON-object response format.
//!
//! # Retry
//!
//! The OpenAI extractor retries transient failures with exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//!
//! Callers treat every error as "no facts".

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use brain_ingest_core::models::{Document, FactCandidate};

use crate::config::LlmConfig;

/// Confidence assigned to model facts that do not report one.
pub const DEFAULT_LLM_CONFIDENCE: f64 = 0.8;

const SYSTEM_PROMPT: &str = "You extract durable key facts about the organization, person or \
product a web page describes. Respond with a JSON object of the form \
{\"facts\": [{\"key\": string, \"value\": string, \"confidence\": number between 0 and 1}]}. \
Use short, human-readable keys such as \"Company Name\", \"Email\", \"Phone\", \"Address\", \
\"Founded\", \"Pricing\". Only include facts stated on the page. Return {\"facts\": []} when \
nothing qualifies.";

/// Delay before retry `attempt` (1-based): 1s, 2s, 4s, capped at 32s.
pub fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// Upper bound for one extraction call including every retry and backoff.
pub fn call_budget(config: &LlmConfig) -> Duration {
    let per_request = Duration::from_secs(config.timeout_secs);
    let requests = per_request * (config.max_retries + 1);
    (1..=config.max_retries).map(retry_backoff).fold(requests, |total, d| total + d)
}

#[async_trait]
pub trait LlmExtractor: Send + Sync {
    /// Facts the model finds in `document`.
    async fn extract_facts(&self, document: &Document) -> Result<Vec<FactCandidate>>;
}

/// Extractor used when no model is configured.
pub struct DisabledExtractor;

#[async_trait]
impl LlmExtractor for DisabledExtractor {
    async fn extract_facts(&self, _document: &Document) -> Result<Vec<FactCandidate>> {
        Ok(Vec::new())
    }
}

pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: u32,
    max_input_chars: usize,
}

impl OpenAiExtractor {
    /// Requires `OPENAI_API_KEY` in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            max_retries: config.max_retries,
            max_input_chars: config.max_input_chars,
        })
    }

    fn request_body(&self, document: &Document) -> Value {
        let text: String = document
            .text_content
            .chars()
            .take(self.max_input_chars)
            .collect();
        let user = format!(
            "URL: {}\nTitle: {}\nDescription: {}\n\n{}",
            document.url, document.title, document.excerpt, text
        );
        serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user },
            ],
        })
    }
}

#[async_trait]
impl LlmExtractor for OpenAiExtractor {
    async fn extract_facts(&self, document: &Document) -> Result<Vec<FactCandidate>> {
        let body = self.request_body(document);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_backoff(attempt)).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: Value = response.json().await?;
                        return parse_chat_response(&json, &document.url);
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("LLM API error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("LLM API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("LLM extraction failed after retries")))
    }
}

/// Pull the fact list out of a chat completions response.
pub fn parse_chat_response(json: &Value, default_source: &str) -> Result<Vec<FactCandidate>> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Invalid LLM response: missing message content"))?;
    let parsed: Value = serde_json::from_str(content)
        .map_err(|e| anyhow!("LLM returned non-JSON content: {}", e))?;
    Ok(parse_fact_list(&parsed, default_source))
}

/// Accepts `{"facts": [...]}` or a bare array. Entries without a key or
/// value are dropped; validation happens later.
pub fn parse_fact_list(value: &Value, default_source: &str) -> Vec<FactCandidate> {
    let items: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("facts") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| {
            let key = item.get("key")?.as_str()?.trim();
            let value = match item.get("value")? {
                Value::String(s) => s.trim().to_string(),
                Value::Null => return None,
                other => other.to_string(),
            };
            let confidence = item
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_LLM_CONFIDENCE);
            let source = item
                .get("source")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(default_source);
            Some(FactCandidate::new(key, value, confidence, source))
        })
        .collect()
}

/// Build the extractor selected by `[llm] provider`.
pub fn create_extractor(config: &LlmConfig) -> Result<Arc<dyn LlmExtractor>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledExtractor)),
        "openai" => Ok(Arc::new(OpenAiExtractor::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
