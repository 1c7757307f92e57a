//! Shared application state for the HTTP server.

use std::sync::Arc;

use crate::extract::{ExtensionExtractor, TextExtractor};
use crate::llm::{CompletionClient, CompletionConfig, HttpCompletionClient};
use crate::orchestration::WorkflowOrchestrator;
use crate::search::{HttpSearchClient, SearchClient, SearchConfig};

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub orchestrator: WorkflowOrchestrator,
    pub extractor: Box<dyn TextExtractor>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Wire the orchestrator from environment configuration.
    pub fn from_env() -> Self {
        let completion: Arc<dyn CompletionClient> =
            Arc::new(HttpCompletionClient::new(CompletionConfig::from_env()));
        let search: Option<Arc<dyn SearchClient>> = SearchConfig::from_env()
            .map(|config| Arc::new(HttpSearchClient::new(config)) as Arc<dyn SearchClient>);
        Self::new(completion, search)
    }

    pub fn new(
        completion: Arc<dyn CompletionClient>,
        search: Option<Arc<dyn SearchClient>>,
    ) -> Self {
        Self {
            orchestrator: WorkflowOrchestrator::new(completion, search),
            extractor: Box::new(ExtensionExtractor),
        }
    }
}
