//! Web-search collaborator.
//!
//! Optional: when no search backend is configured the information-retrieval
//! agent substitutes an LLM-simulated result list, so the pipeline works
//! without one.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub url: String,
}

/// External search index, abstracted away from any wire format.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, ServiceError>;
}

/// Configuration for the HTTP search client.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Base URL of a SearxNG-style JSON search endpoint
    pub base_url: String,
    pub timeout_secs: u64,
}

impl SearchConfig {
    /// Read `FLOWMEND_SEARCH_URL`; returns `None` when no backend is set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FLOWMEND_SEARCH_URL").ok()?;
        Some(Self {
            base_url,
            timeout_secs: std::env::var("FLOWMEND_SEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }
}

/// Queries a SearxNG-style endpoint: `GET {base}/search?q=...&format=json`,
/// expecting `{"results": [{"title", "content", "url"}, ...]}`.
pub struct HttpSearchClient {
    client: reqwest::Client,
    config: SearchConfig,
}

impl HttpSearchClient {
    pub fn new(config: SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));

        tracing::debug!("[Search] GET {} q='{}'", url, query);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout(format!("Search call timed out: {}", e))
                } else {
                    ServiceError::Upstream(format!("Search request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Upstream(format!(
                "Search API returned {}",
                status
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Malformed search response: {}", e)))?;

        let hits = json
            .get("results")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .take(count)
                    .map(|item| SearchHit {
                        title: item
                            .get("title")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        snippet: item
                            .get("content")
                            .or_else(|| item.get("snippet"))
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        url: item
                            .get("url")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(hits)
    }
}
