//! Bottleneck agent — hypothesizes where and why a process stalls.

use std::sync::Arc;

use crate::agents::{call_and_repair, CallSpec, RepairedCall};
use crate::error::ServiceError;
use crate::llm::CompletionClient;
use crate::models::{BottleneckHypothesis, ProcessDescription, VerifiedInformation};

const IDENTIFY_SPEC: CallSpec = CallSpec {
    temperature: 0.5,
    max_tokens: 1000,
};

pub struct BottleneckAgent {
    completion: Arc<dyn CompletionClient>,
}

impl BottleneckAgent {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    /// Identify bottleneck hypotheses for a process.
    ///
    /// When `verified` is given the call is a refinement pass: its result
    /// replaces the earlier hypotheses wholesale (refinement overwrites,
    /// not appends). An empty list is the fallback for any parse failure —
    /// the orchestrator treats "no hypotheses" as a clarification trigger.
    pub async fn identify(
        &self,
        process: &ProcessDescription,
        verified: Option<&VerifiedInformation>,
        diagram_xml: Option<&str>,
    ) -> Result<Vec<BottleneckHypothesis>, ServiceError> {
        let info_context = verified
            .map(|v| {
                format!(
                    "\nConsider the following verified information and best practices: {}\nSource Confidence: {}",
                    v.summary,
                    v.confidence.as_str()
                )
            })
            .unwrap_or_default();

        let diagram_context = diagram_xml
            .map(|xml| format!("\nCurrent BPMN diagram of the process:\n{}", xml))
            .unwrap_or_default();

        let pain_points = if process.pain_points.is_empty() {
            "None specified".to_string()
        } else {
            process.pain_points.join(", ")
        };

        let prompt = format!(
            r#"Analyze the following business process description.
Identify potential bottlenecks, inefficiencies, or areas for improvement based on the process steps, pain points, and stated goals.
If verified information is provided, use it to refine your analysis and inform your hypotheses.

For each suspected bottleneck:
1. State the 'location' (specific step or area in the process).
2. Propose a 'reason_hypothesis' for why it's a bottleneck.
3. List specific 'info_needed' (questions or data points) to confirm this bottleneck or to find effective solutions.

Process Name: {name}
Steps: {steps}
Pain Points: {pain_points}
Goal: {goal}{info_context}{diagram_context}

Provide the output as a JSON list:
[
    {{
        "location": "...",
        "reason_hypothesis": "...",
        "info_needed": ["...", "..."]
    }}
]
Ensure the JSON is perfectly valid and can be directly parsed. Do not add any extra text outside the JSON block.
If no obvious bottlenecks are identified, return an empty list []."#,
            name = process.name,
            steps = process.steps.join(", "),
            goal = process.goal.as_deref().unwrap_or("Not specified"),
        );

        tracing::info!("BottleneckAgent: analyzing process '{}'", process.name);
        match call_and_repair(self.completion.as_ref(), &prompt, IDENTIFY_SPEC).await? {
            RepairedCall::Parsed(value) => {
                match serde_json::from_value::<Vec<BottleneckHypothesis>>(value) {
                    Ok(hypotheses) => Ok(hypotheses),
                    Err(e) => {
                        tracing::error!("BottleneckAgent: invalid hypothesis list: {}", e);
                        Ok(Vec::new())
                    }
                }
            }
            RepairedCall::Unparseable { failure, .. } => {
                tracing::error!("BottleneckAgent: unparseable output: {}", failure);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedClient(&'static str);

    #[async_trait]
    impl CompletionClient for FixedClient {
        async fn complete(
            &self,
            _prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, ServiceError> {
            Ok(self.0.to_string())
        }
    }

    fn sample_process() -> ProcessDescription {
        ProcessDescription {
            name: "Support".to_string(),
            steps: vec!["intake".into(), "triage".into(), "resolve".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_parses_hypothesis_list() {
        let agent = BottleneckAgent::new(Arc::new(FixedClient(
            r#"[{"location": "triage", "reason_hypothesis": "manual routing", "info_needed": ["avg queue time"]}]"#,
        )));
        let hypotheses = agent.identify(&sample_process(), None, None).await.unwrap();
        assert_eq!(hypotheses.len(), 1);
        assert_eq!(hypotheses[0].location, "triage");
        assert_eq!(hypotheses[0].info_needed, vec!["avg queue time"]);
    }

    #[tokio::test]
    async fn test_malformed_output_falls_back_to_empty() {
        let agent = BottleneckAgent::new(Arc::new(FixedClient("there are no bottlenecks")));
        let hypotheses = agent.identify(&sample_process(), None, None).await.unwrap();
        assert!(hypotheses.is_empty());
    }

    #[tokio::test]
    async fn test_object_instead_of_list_falls_back_to_empty() {
        let agent =
            BottleneckAgent::new(Arc::new(FixedClient(r#"{"location": "triage"}"#)));
        let hypotheses = agent.identify(&sample_process(), None, None).await.unwrap();
        assert!(hypotheses.is_empty());
    }
}
