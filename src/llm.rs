//! Language model client.
//!
//! [`LanguageModel`] is the seam between message handling and the hosted
//! model; [`GeminiClient`] implements it against the Generative Language
//! `generateContent` endpoint.
//!
//! # Failure handling
//!
//! A call is one best-effort attempt: no retry and no backoff. Every
//! failure (missing key, transport error, non-2xx status, malformed or
//! empty response) comes back as a descriptive error.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::LlmConfig;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Generate a text answer for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    endpoint: String,
    api_key_env: String,
}

impl GeminiClient {
    /// Build a client from configuration.
    ///
    /// The API key is read from the environment on each call, so a missing
    /// key only fails requests that actually need the model.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => bail!(
                "API key not configured. Please set the {} environment variable.",
                self.api_key_env
            ),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "calling language model");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("could not fetch answer")?;

        let status = resp.status();
        if !status.is_success() {
            let detail: Value = resp.json().await.unwrap_or_default();
            let message = detail
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            tracing::warn!(%status, error = message, "language model returned an error");
            bail!("Gemini API returned {}. {}", status, message);
        }

        let data: Value = resp
            .json()
            .await
            .context("Gemini API returned invalid JSON")?;
        extract_answer(&data)
    }
}

/// Pull the answer text out of a `generateContent` response.
pub fn extract_answer(data: &Value) -> Result<String> {
    let candidate = data
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| anyhow!("Unexpected response format: no candidates"))?;

    let text = candidate
        .pointer("/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if text.is_empty() {
        bail!("No response from Gemini - response was empty.");
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_answer() {
        let data = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Mitochondria." }] } }]
        });
        assert_eq!(extract_answer(&data).unwrap(), "Mitochondria.");
    }

    #[test]
    fn test_extract_answer_no_candidates() {
        let err = extract_answer(&json!({ "promptFeedback": {} })).unwrap_err();
        assert!(err.to_string().contains("no candidates"));
        assert!(extract_answer(&json!({ "candidates": [] })).is_err());
    }

    #[test]
    fn test_extract_answer_empty_text() {
        let data = json!({ "candidates": [{ "content": { "parts": [] } }] });
        let err = extract_answer(&data).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let config = LlmConfig {
            api_key_env: "CLASSROOM_RAG_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(err.to_string().contains("CLASSROOM_RAG_TEST_UNSET_KEY"));
    }
}
