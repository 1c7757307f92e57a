//! Single-call classifiers routing requests to the right pipeline.
//!
//! Each classifier is one low-temperature completion with an
//! enumerated-label instruction. There are no retries: any answer that is
//! not an exact label after trimming/lowercasing — including a collaborator
//! failure — routes to the safest default rather than erroring.

use std::sync::Arc;

use crate::llm::CompletionClient;

/// Primary intent of a user query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Visualize,
    Improve,
    Analyze,
    Conversation,
}

impl Intent {
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "visualize" => Some(Self::Visualize),
            "improve" => Some(Self::Improve),
            "analyze" => Some(Self::Analyze),
            "conversation" => Some(Self::Conversation),
            _ => None,
        }
    }
}

/// Sub-classification of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Question,
    Modification,
    Information,
}

impl ConversationKind {
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "question" => Some(Self::Question),
            "modification" => Some(Self::Modification),
            "information" => Some(Self::Information),
            _ => None,
        }
    }
}

/// Maps a free-text query to one of the pipeline intents.
pub struct IntentClassifier {
    completion: Arc<dyn CompletionClient>,
}

impl IntentClassifier {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    pub async fn classify(&self, query: &str) -> Intent {
        let prompt = format!(
            r#"Analyze the following user query and determine their primary intent:

Query: "{query}"

Classify the intent as one of:
- "visualize": the user wants to create/generate a BPMN diagram from a process description
- "improve": the user wants to improve/optimize an existing process
- "analyze": the user wants to analyze a process for bottlenecks or issues
- "conversation": the user is asking questions about an existing diagram, requesting modifications, or providing additional information

Look for keywords like:
- "conversation": "what is", "how does", "explain", "modify", "add", "change", "update", "question", "why", "when", "where"
- "visualize": "create diagram", "generate BPMN", "draw", "visualize", "show me"
- "improve": "improve", "optimize", "better", "faster", "cheaper", "enhance"
- "analyze": "analyze", "bottleneck", "problem", "issue", "slow", "expensive"

Return only the intent word (visualize, improve, analyze, or conversation)."#
        );

        match self.completion.complete(&prompt, 0.1, 50).await {
            Ok(label) => Intent::from_label(&label).unwrap_or(Intent::Conversation),
            Err(e) => {
                tracing::warn!("Intent classification failed, defaulting to conversation: {}", e);
                Intent::Conversation
            }
        }
    }
}

/// Sub-classifies conversational turns into question / modification /
/// information.
pub struct ConversationTypeClassifier {
    completion: Arc<dyn CompletionClient>,
}

impl ConversationTypeClassifier {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    pub async fn classify(&self, query: &str) -> ConversationKind {
        let prompt = format!(
            r#"Analyze this query and determine the conversation type:

Query: "{query}"

Classify as:
- "question": the user is asking about the diagram (what, how, why, when, where, explain, describe)
- "modification": the user wants to change/modify the diagram (add, remove, change, modify, update, edit)
- "information": the user is providing additional information or context

Return only: question, modification, or information"#
        );

        match self.completion.complete(&prompt, 0.1, 50).await {
            Ok(label) => ConversationKind::from_label(&label).unwrap_or(ConversationKind::Question),
            Err(e) => {
                tracing::warn!("Conversation-type classification failed, defaulting to question: {}", e);
                ConversationKind::Question
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;

    struct FixedClient(Option<&'static str>);

    #[async_trait]
    impl CompletionClient for FixedClient {
        async fn complete(
            &self,
            _prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, ServiceError> {
            match self.0 {
                Some(reply) => Ok(reply.to_string()),
                None => Err(ServiceError::Upstream("down".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_exact_labels_are_matched() {
        let classifier = IntentClassifier::new(Arc::new(FixedClient(Some("  Visualize\n"))));
        assert_eq!(classifier.classify("draw my flow").await, Intent::Visualize);
    }

    #[tokio::test]
    async fn test_unknown_label_defaults_to_conversation() {
        let classifier = IntentClassifier::new(Arc::new(FixedClient(Some("maybe improve?"))));
        assert_eq!(classifier.classify("hmm").await, Intent::Conversation);
    }

    #[tokio::test]
    async fn test_collaborator_failure_defaults() {
        let intent = IntentClassifier::new(Arc::new(FixedClient(None)));
        assert_eq!(intent.classify("anything").await, Intent::Conversation);

        let kind = ConversationTypeClassifier::new(Arc::new(FixedClient(None)));
        assert_eq!(kind.classify("anything").await, ConversationKind::Question);
    }

    #[tokio::test]
    async fn test_conversation_kind_labels() {
        let kind = ConversationTypeClassifier::new(Arc::new(FixedClient(Some("modification"))));
        assert_eq!(kind.classify("rename Task_1").await, ConversationKind::Modification);
    }
}
