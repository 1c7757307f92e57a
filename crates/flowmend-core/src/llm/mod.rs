//! Completion collaborator — the external text-generation service.
//!
//! The orchestrator and agents only see the `CompletionClient` trait: one
//! opaque `complete(prompt, temperature, max_tokens) -> String` operation.
//! The shipped `HttpCompletionClient` speaks either the Anthropic-compatible
//! Messages API or an OpenAI-compatible `chat/completions` API, selected by
//! the `adapter` string.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;

/// Opaque text-completion operation. No streaming, no structured-output mode.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ServiceError>;
}

/// Configuration for the HTTP completion client.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Adapter type: "anthropic" or "openai"
    pub adapter: String,
    /// API base URL
    pub base_url: String,
    /// API key / auth token
    pub api_key: String,
    /// Model ID
    pub model: String,
    /// Wall-clock deadline for one completion call
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            adapter: "anthropic".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            timeout_secs: 120,
        }
    }
}

impl CompletionConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Reads `FLOWMEND_LLM_ADAPTER`, `FLOWMEND_LLM_BASE_URL`,
    /// `FLOWMEND_LLM_API_KEY` (then `ANTHROPIC_AUTH_TOKEN` /
    /// `ANTHROPIC_API_KEY`), `FLOWMEND_LLM_MODEL`, `FLOWMEND_LLM_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            adapter: std::env::var("FLOWMEND_LLM_ADAPTER").unwrap_or(defaults.adapter),
            base_url: std::env::var("FLOWMEND_LLM_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("FLOWMEND_LLM_API_KEY")
                .or_else(|_| std::env::var("ANTHROPIC_AUTH_TOKEN"))
                .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
                .unwrap_or_default(),
            model: std::env::var("FLOWMEND_LLM_MODEL").unwrap_or(defaults.model),
            timeout_secs: std::env::var("FLOWMEND_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Calls the completion service over HTTP.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    /// POST {base_url}/v1/messages (Anthropic-compatible Messages API).
    async fn complete_anthropic(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        tracing::debug!(
            "[Completion] POST {} (model: {}, max_tokens: {})",
            url,
            self.config.model,
            max_tokens
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ServiceError::Upstream(format!(
                "Completion API returned {}: {}",
                status, response_text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| ServiceError::Upstream(format!("Malformed completion response: {}", e)))?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block.get("text").and_then(|t| t.as_str())
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(content)
    }

    /// POST {base_url}/chat/completions (OpenAI-compatible API).
    async fn complete_openai(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ServiceError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        tracing::debug!(
            "[Completion] POST {} (model: {}, max_tokens: {})",
            url,
            self.config.model,
            max_tokens
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ServiceError::Upstream(format!(
                "Completion API returned {}: {}",
                status, response_text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| ServiceError::Upstream(format!("Malformed completion response: {}", e)))?;

        let content = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        Ok(content)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ServiceError> {
        match self.config.adapter.as_str() {
            "openai" | "openai-compatible" => {
                self.complete_openai(prompt, temperature, max_tokens).await
            }
            // Anthropic-compatible is the default adapter.
            _ => {
                self.complete_anthropic(prompt, temperature, max_tokens)
                    .await
            }
        }
    }
}

/// Timeouts are recoverable at the agent layer (treated like a parse
/// failure); every other transport error surfaces as `Upstream`.
fn map_transport_err(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(format!("Completion call timed out: {}", e))
    } else {
        ServiceError::Upstream(format!("HTTP request failed: {}", e))
    }
}
