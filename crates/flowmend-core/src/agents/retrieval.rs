//! Information-retrieval agent — external lookup plus verification.
//!
//! The only agent that never surfaces an error: every failure mode decays
//! toward a low-confidence record so the solution step always has a
//! well-formed input.

use std::sync::Arc;

use crate::agents::{call_and_repair, CallSpec, RepairedCall};
use crate::llm::CompletionClient;
use crate::models::{Confidence, Relevance, VerifiedInformation};
use crate::search::{SearchClient, SearchHit};

const SIMULATE_SPEC: CallSpec = CallSpec {
    temperature: 0.7,
    max_tokens: 800,
};

const VERIFY_SPEC: CallSpec = CallSpec {
    temperature: 0.3,
    max_tokens: 1000,
};

const SEARCH_RESULT_COUNT: usize = 5;

pub struct RetrievalAgent {
    completion: Arc<dyn CompletionClient>,
    search: Option<Arc<dyn SearchClient>>,
}

impl RetrievalAgent {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        search: Option<Arc<dyn SearchClient>>,
    ) -> Self {
        Self { completion, search }
    }

    /// Retrieve supporting information for a query and verify/summarize it.
    ///
    /// Worst case is a populated record with `confidence: Low` — never an
    /// error, never an empty shell.
    pub async fn retrieve_and_verify(&self, query: &str) -> VerifiedInformation {
        tracing::info!("RetrievalAgent: retrieving info for '{}'", truncate(query, 80));

        let hits = self.gather_hits(query).await;
        if hits.is_empty() {
            return Self::not_found(query);
        }

        match self.verify(query, &hits).await {
            Some(info) => info,
            None => Self::not_found(query),
        }
    }

    /// Real search first; LLM-simulated results when the backend is absent
    /// or failing.
    async fn gather_hits(&self, query: &str) -> Vec<SearchHit> {
        if let Some(search) = &self.search {
            match search.search(query, SEARCH_RESULT_COUNT).await {
                Ok(hits) if !hits.is_empty() => return hits,
                Ok(_) => {
                    tracing::info!("RetrievalAgent: search returned no hits, simulating");
                }
                Err(e) => {
                    tracing::warn!("RetrievalAgent: search backend failed ({}), simulating", e);
                }
            }
        }
        self.simulate_hits(query).await
    }

    /// Ask the completion service to stand in for the missing search index.
    async fn simulate_hits(&self, query: &str) -> Vec<SearchHit> {
        let prompt = format!(
            r#"Simulate the results of a web search for the query below, drawing on general knowledge of business-process best practices.

Query: "{query}"

Return a JSON array of up to {SEARCH_RESULT_COUNT} results:
[
    {{ "title": "...", "snippet": "...", "url": "https://..." }}
]
Ensure the JSON is perfectly valid and can be directly parsed. Do not add any extra text outside the JSON block."#
        );

        match call_and_repair(self.completion.as_ref(), &prompt, SIMULATE_SPEC).await {
            Ok(RepairedCall::Parsed(value)) => {
                serde_json::from_value::<Vec<SearchHit>>(value).unwrap_or_default()
            }
            Ok(RepairedCall::Unparseable { failure, .. }) => {
                tracing::warn!("RetrievalAgent: simulated search unparseable: {}", failure);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("RetrievalAgent: simulated search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Summarize the hits and grade confidence/relevance.
    async fn verify(&self, query: &str, hits: &[SearchHit]) -> Option<VerifiedInformation> {
        let hits_block = hits
            .iter()
            .map(|h| format!("- {} ({}): {}", h.title, h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"You are verifying search results for a business-process improvement question.

Query: "{query}"

Search Results:
{hits_block}

Summarize what the results establish about the query, and grade the result set.

Return a single JSON object:
{{
    "summary": "concise summary of the verified information",
    "confidence": "High" | "Medium" | "Low",
    "relevance": "Direct" | "Indirect" | "None"
}}
Ensure the JSON is perfectly valid and can be directly parsed. Do not add any extra text outside the JSON block."#
        );

        let value = match call_and_repair(self.completion.as_ref(), &prompt, VERIFY_SPEC).await {
            Ok(RepairedCall::Parsed(value)) => value,
            Ok(RepairedCall::Unparseable { failure, .. }) => {
                tracing::warn!("RetrievalAgent: verification unparseable: {}", failure);
                return None;
            }
            Err(e) => {
                tracing::warn!("RetrievalAgent: verification call failed: {}", e);
                return None;
            }
        };

        let summary = value
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if summary.is_empty() {
            return None;
        }

        let confidence = value
            .get("confidence")
            .and_then(|v| v.as_str())
            .and_then(Confidence::from_label)
            .unwrap_or(Confidence::Medium);
        let relevance = value
            .get("relevance")
            .and_then(|v| v.as_str())
            .and_then(Relevance::from_label)
            .unwrap_or(Relevance::Indirect);

        Some(VerifiedInformation {
            query: query.to_string(),
            sources: hits.iter().map(|h| h.url.clone()).collect(),
            summary,
            confidence,
            relevance,
        })
    }

    fn not_found(query: &str) -> VerifiedInformation {
        VerifiedInformation {
            query: query.to_string(),
            sources: Vec::new(),
            summary: "No relevant information found for this query.".to_string(),
            confidence: Confidence::Low,
            relevance: Relevance::Indirect,
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
