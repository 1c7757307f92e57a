//! Context agent — turns free text (or a diagram) into process context.

use std::sync::Arc;

use crate::agents::{call_and_repair, CallSpec, RepairedCall};
use crate::error::ServiceError;
use crate::llm::CompletionClient;
use crate::models::ProcessDescription;

const EXTRACT_SPEC: CallSpec = CallSpec {
    temperature: 0.2,
    max_tokens: 700,
};

const DIAGRAM_SPEC: CallSpec = CallSpec {
    temperature: 0.3,
    max_tokens: 1500,
};

const ANSWER_SPEC: CallSpec = CallSpec {
    temperature: 0.3,
    max_tokens: 20_000,
};

pub struct ContextAgent {
    completion: Arc<dyn CompletionClient>,
}

impl ContextAgent {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    /// Extract a structured [`ProcessDescription`] from a user query.
    ///
    /// The fallback description has empty steps, so it trips the
    /// orchestrator's clarification gate rather than silently continuing.
    pub async fn extract_from_query(
        &self,
        query: &str,
    ) -> Result<ProcessDescription, ServiceError> {
        let prompt = format!(
            r#"Analyze the following user query about a business process.
Extract the process name, its key sequential steps (if mentioned or implied), primary inputs, primary outputs,
any explicitly stated pain points or inefficiencies, and the user's main goal for this process improvement.
If any information is missing or unclear, state what needs clarification in the pain_points or goal field,
or just provide what is available.

User Query: "{query}"

Provide the output as a single JSON object with this shape:
{{
    "name": "...",
    "steps": ["...", "..."],
    "inputs": ["..."],
    "outputs": ["..."],
    "pain_points": ["..."],
    "metrics": {{}},
    "goal": "..."
}}
Ensure the JSON is perfectly valid and can be directly parsed. Do not add any extra text outside the JSON block.
If steps are not explicitly listed, try to infer a simple start-to-end flow."#
        );

        tracing::info!("ContextAgent: extracting process context from query");
        match call_and_repair(self.completion.as_ref(), &prompt, EXTRACT_SPEC).await? {
            RepairedCall::Parsed(value) => match serde_json::from_value::<ProcessDescription>(value)
            {
                Ok(desc) => Ok(desc),
                Err(e) => Ok(Self::fallback(&e.to_string(), "")),
            },
            RepairedCall::Unparseable { failure, raw } => {
                Ok(Self::fallback(&failure.reason, &raw))
            }
        }
    }

    /// Summarize an existing BPMN diagram into a free-text process overview
    /// (used by the optimization pipeline, which has no user query to mine).
    pub async fn summarize_diagram(
        &self,
        diagram_xml: &str,
        memory: &str,
        language_instruction: &str,
    ) -> Result<String, ServiceError> {
        let prompt = format!(
            r#"{language_instruction}
Read the following BPMN 2.0 XML diagram and the accumulated conversation memory.
Describe the business process the diagram represents: its purpose, the sequence of activities,
decision points, and any apparent inefficiencies.

Diagram:
{diagram_xml}

Conversation Memory:
{memory}

Answer with a plain-text summary only."#
        );

        tracing::info!("ContextAgent: summarizing diagram for optimization");
        match self
            .completion
            .complete(&prompt, DIAGRAM_SPEC.temperature, DIAGRAM_SPEC.max_tokens)
            .await
        {
            Ok(summary) => Ok(summary.trim().to_string()),
            Err(ServiceError::Timeout(msg)) => {
                tracing::warn!("Diagram summary timed out: {}", msg);
                Ok("The diagram could not be summarized in time.".to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Answer a user question about the current diagram.
    ///
    /// Never fails: an unreachable collaborator yields an apology the caller
    /// can return verbatim.
    pub async fn answer_about_diagram(
        &self,
        question: &str,
        diagram_xml: &str,
        memory: &str,
        diagram_description: &str,
        language_instruction: &str,
    ) -> String {
        let prompt = format!(
            r#"{language_instruction}
Based on the following context, answer the user's question about the BPMN diagram.

Context:
Diagram Data: {diagram_xml}
Conversation Memory: {memory}
Diagram Description: {diagram_description}

User Question: "{question}"

Provide a clear, helpful answer about the diagram. If the question cannot be answered from the available information, say so politely."#
        );

        match self
            .completion
            .complete(&prompt, ANSWER_SPEC.temperature, ANSWER_SPEC.max_tokens)
            .await
        {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::error!("Error answering diagram question: {}", e);
                "I'm sorry, I couldn't process your question at the moment. Please try again."
                    .to_string()
            }
        }
    }

    fn fallback(error: &str, raw: &str) -> ProcessDescription {
        let mut detail = format!("Error parsing context: {}", error);
        if !raw.is_empty() {
            detail.push_str(&format!(". Raw model output: {}", raw));
        }
        ProcessDescription {
            name: "Unknown Process".to_string(),
            steps: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            pain_points: vec![detail],
            metrics: Default::default(),
            goal: Some("Clarification needed due to parsing error.".to_string()),
        }
    }
}
