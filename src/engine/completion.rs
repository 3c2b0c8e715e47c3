// ── Memory Engine: Completion Service Client ───────────────────────────────
//
// The extraction pipeline and timeline summarizer only depend on the
// `CompletionClient` trait — one `complete()` operation over role/content
// messages. The bundled `HttpCompletionClient` speaks the OpenAI-compatible
// `/chat/completions` wire format, which covers OpenAI, OpenRouter, Ollama
// and most hosted gateways. Tests substitute scripted stubs.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::types::{CompletionMessage, CompletionOptions, CompletionResponse};
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

// ── Trait ──────────────────────────────────────────────────────────────────

/// Black-box text completion boundary.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        options: &CompletionOptions,
    ) -> MemoryResult<CompletionResponse>;
}

// ── HTTP client configuration ──────────────────────────────────────────────

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// E.g. `https://api.openai.com/v1` (no trailing slash required).
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

// ── HTTP client ────────────────────────────────────────────────────────────

pub struct HttpCompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpCompletionClient {
    /// Build a client. Rejects blank base URL / key / model up front so a
    /// half-configured summary API fails at construction, not mid-extraction.
    pub fn new(config: CompletionConfig) -> MemoryResult<Self> {
        if config.base_url.trim().is_empty()
            || config.api_key.trim().is_empty()
            || config.model.trim().is_empty()
        {
            return Err(MemoryError::Config(
                "completion service needs base_url, api_key and model".to_string(),
            ));
        }
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        options: &CompletionOptions,
    ) -> MemoryResult<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let snippet: String = detail.chars().take(200).collect();
            warn!("[memory:completion] HTTP {} from {}: {}", status, url, snippet);
            return Err(MemoryError::completion(
                &self.model,
                format!("HTTP {}: {}", status, snippet),
            ));
        }

        let payload: Value = response.json().await?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                MemoryError::completion(&self.model, "response has no message content")
            })?
            .to_string();

        Ok(CompletionResponse { content })
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_config() {
        let config = CompletionConfig {
            base_url: String::new(),
            api_key: "key".to_string(),
            model: "gpt-4o-mini".to_string(),
        };
        assert!(matches!(
            HttpCompletionClient::new(config),
            Err(MemoryError::Config(_))
        ));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = HttpCompletionClient::new(CompletionConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            api_key: "key".to_string(),
            model: "m".to_string(),
        })
        .unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }
}
