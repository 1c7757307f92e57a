//! Visualization agent — generates and modifies BPMN 2.0 diagrams.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::{call_and_repair, CallSpec, RepairedCall};
use crate::error::ServiceError;
use crate::language::{could_not_process_message, language_instruction, Language};
use crate::llm::CompletionClient;
use crate::models::DiagramResult;

const GENERATE_SPEC: CallSpec = CallSpec {
    temperature: 0.2,
    max_tokens: 2000,
};

const MODIFY_SPEC: CallSpec = CallSpec {
    temperature: 0.0,
    max_tokens: 20_000,
};

/// Outcome of a diagram-modification request.
#[derive(Debug, Clone)]
pub struct DiagramModification {
    pub diagram_data: String,
    pub detail_descriptions: HashMap<String, String>,
    pub summary: String,
}

pub struct VisualizationAgent {
    completion: Arc<dyn CompletionClient>,
}

impl VisualizationAgent {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    /// Generate a BPMN diagram for a process.
    ///
    /// The fallback path builds a minimal start→tasks→end skeleton directly
    /// from the step list, with no completion call.
    pub async fn generate_diagram(
        &self,
        process_name: &str,
        process_steps: &[String],
        process_description: &str,
        file_context: Option<&str>,
        existing_diagram: Option<&str>,
    ) -> Result<DiagramResult, ServiceError> {
        let steps_text = process_steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n");

        let extra_context = match (file_context, existing_diagram) {
            (Some(file), _) if !file.is_empty() => format!("\nFile Context: {}", file),
            (_, Some(xml)) if !xml.is_empty() => {
                format!("\nExisting diagram to evolve from:\n{}", xml)
            }
            _ => String::new(),
        };

        let first_step = process_steps.first().map(String::as_str).unwrap_or("First task");

        let prompt = format!(
            r#"Generate a BPMN (Business Process Model and Notation) 2.0 XML diagram for the following process.

Process Name: {process_name}
Process Description: {process_description}
Process Steps:
{steps_text}{extra_context}

Create a valid BPMN 2.0 XML diagram that includes:
1. A start event
2. Tasks for each process step
3. Sequence flows between tasks
4. An end event
5. Proper BPMN XML structure with namespaces

Every node must be reachable from the start event and connected to the end event.

Return the response in this exact JSON format:
{{
    "diagram_data": "<bpmn:definitions xmlns:bpmn='http://www.omg.org/spec/BPMN/20100524/MODEL'>...</bpmn:definitions>",
    "diagram_name": "{process_name} Diagram",
    "diagram_description": "BPMN diagram representing the {process_name} process",
    "detail_descriptions": {{
        "StartEvent_1": "Process starts",
        "Task_1": "{first_step}",
        "EndEvent_1": "Process ends"
    }}
}}
Ensure the BPMN XML is valid and follows BPMN 2.0 standards."#
        );

        tracing::info!("VisualizationAgent: generating diagram for '{}'", process_name);
        match call_and_repair(self.completion.as_ref(), &prompt, GENERATE_SPEC).await? {
            RepairedCall::Parsed(value) => {
                let mut result: DiagramResult =
                    serde_json::from_value(value).unwrap_or_default();
                if result.diagram_data.trim().is_empty() {
                    tracing::warn!("VisualizationAgent: empty diagram_data, using fallback");
                    return Ok(Self::fallback_diagram(process_name, process_steps));
                }
                if result.diagram_name.is_empty() {
                    result.diagram_name = format!("{} Diagram", process_name);
                }
                if result.diagram_description.is_empty() {
                    result.diagram_description = format!("BPMN diagram for {}", process_name);
                }
                Ok(result)
            }
            RepairedCall::Unparseable { failure, .. } => {
                tracing::error!("VisualizationAgent: unparseable output: {}", failure);
                Ok(Self::fallback_diagram(process_name, process_steps))
            }
        }
    }

    /// Modify an existing diagram per a user request.
    ///
    /// On repair failure the original diagram is returned unchanged with a
    /// localized apology as the summary.
    pub async fn modify_diagram(
        &self,
        request: &str,
        diagram_xml: &str,
        memory: &str,
        diagram_description: &str,
        language: Language,
    ) -> Result<DiagramModification, ServiceError> {
        let prompt = format!(
            r#"{instruction}
Based on the following context, modify the BPMN diagram according to the user's request.

Context:
Original Diagram: {diagram_xml}
Conversation Memory: {memory}
Diagram Description: {diagram_description}

User Modification Request: "{request}"

Generate a modified BPMN 2.0 XML diagram that incorporates the requested changes.
Also extract the node descriptions from the modified diagram.

In the summary, concisely and naturally describe the changes in the same language as the user's request. Do not use generic phrases like 'Changes made:' or 'Diagram has been modified.'

Return ONLY the following JSON object. Do not include any explanation or text outside the JSON.
{{
    "diagram_data": "<bpmn:definitions>...</bpmn:definitions>",
    "detail_descriptions": {{
        "StartEvent_1": "Process starts",
        "Task_1": "Description of the first task",
        "EndEvent_1": "Process ends"
    }},
    "summary": "Description of what was modified"
}}

Ensure the BPMN XML is valid and follows BPMN 2.0 standards.
The summary should clearly explain what changes were made to the diagram."#,
            instruction = language_instruction(language),
        );

        tracing::info!("VisualizationAgent: modifying diagram");
        match call_and_repair(self.completion.as_ref(), &prompt, MODIFY_SPEC).await? {
            RepairedCall::Parsed(value) => Ok(DiagramModification {
                diagram_data: value
                    .get("diagram_data")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(diagram_xml)
                    .to_string(),
                detail_descriptions: value
                    .get("detail_descriptions")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default(),
                summary: value
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(could_not_process_message(language))
                    .to_string(),
            }),
            RepairedCall::Unparseable { failure, .. } => {
                tracing::error!("VisualizationAgent: modification unparseable: {}", failure);
                Ok(DiagramModification {
                    diagram_data: diagram_xml.to_string(),
                    detail_descriptions: HashMap::new(),
                    summary: could_not_process_message(language).to_string(),
                })
            }
        }
    }

    /// Deterministic start→tasks→end skeleton built from the step list.
    pub fn fallback_diagram(process_name: &str, process_steps: &[String]) -> DiagramResult {
        let mut nodes = String::new();
        let mut flows = String::new();
        let mut detail_descriptions = HashMap::new();

        detail_descriptions.insert("StartEvent_1".to_string(), "Process starts".to_string());
        detail_descriptions.insert("EndEvent_1".to_string(), "Process ends".to_string());

        let mut prev = "StartEvent_1".to_string();
        for (i, step) in process_steps.iter().enumerate() {
            let task_id = format!("Task_{}", i + 1);
            nodes.push_str(&format!(
                "    <bpmn:task id=\"{}\" name=\"{}\" />\n",
                task_id,
                xml_escape(step)
            ));
            flows.push_str(&format!(
                "    <bpmn:sequenceFlow id=\"Flow_{}\" sourceRef=\"{}\" targetRef=\"{}\" />\n",
                i + 1,
                prev,
                task_id
            ));
            detail_descriptions.insert(task_id.clone(), step.clone());
            prev = task_id;
        }
        flows.push_str(&format!(
            "    <bpmn:sequenceFlow id=\"Flow_{}\" sourceRef=\"{}\" targetRef=\"EndEvent_1\" />\n",
            process_steps.len() + 1,
            prev
        ));

        let process_id = format!("Process_{}", process_name.replace(' ', "_"));
        let diagram_data = format!(
            "<bpmn:definitions xmlns:bpmn=\"http://www.omg.org/spec/BPMN/20100524/MODEL\">\n  <bpmn:process id=\"{}\" name=\"{}\">\n    <bpmn:startEvent id=\"StartEvent_1\" name=\"Start\" />\n{}    <bpmn:endEvent id=\"EndEvent_1\" name=\"End\" />\n{}  </bpmn:process>\n</bpmn:definitions>",
            xml_escape(&process_id),
            xml_escape(process_name),
            nodes,
            flows
        );

        DiagramResult {
            diagram_data,
            diagram_name: format!("{} Diagram", process_name),
            diagram_description: format!("Basic BPMN diagram for {}", process_name),
            detail_descriptions,
        }
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
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

    #[tokio::test]
    async fn test_parses_generated_diagram() {
        let agent = VisualizationAgent::new(Arc::new(FixedClient(
            r#"{"diagram_data": "<bpmn:definitions><bpmn:process/></bpmn:definitions>", "diagram_name": "Support Diagram", "diagram_description": "d", "detail_descriptions": {"Task_1": "intake"}}"#,
        )));
        let result = agent
            .generate_diagram("Support", &["intake".to_string()], "", None, None)
            .await
            .unwrap();
        assert!(result.diagram_data.contains("<bpmn"));
        assert_eq!(result.detail_descriptions.get("Task_1").unwrap(), "intake");
    }

    #[tokio::test]
    async fn test_garbage_yields_skeleton_fallback() {
        let agent = VisualizationAgent::new(Arc::new(FixedClient("no xml here")));
        let steps = vec!["intake".to_string(), "resolve".to_string()];
        let result = agent
            .generate_diagram("Support", &steps, "", None, None)
            .await
            .unwrap();
        assert!(result.diagram_data.contains("<bpmn:startEvent"));
        assert!(result.diagram_data.contains("Task_2"));
        assert!(result.diagram_data.contains("sourceRef=\"Task_2\" targetRef=\"EndEvent_1\""));
        assert_eq!(result.detail_descriptions.len(), 4);
    }

    #[tokio::test]
    async fn test_modification_failure_returns_original_diagram() {
        let agent = VisualizationAgent::new(Arc::new(FixedClient("cannot do that")));
        let modification = agent
            .modify_diagram("rename Task_1", "<bpmn:definitions/>", "", "", Language::English)
            .await
            .unwrap();
        assert_eq!(modification.diagram_data, "<bpmn:definitions/>");
        assert!(modification.detail_descriptions.is_empty());
        assert!(modification.summary.starts_with("Sorry"));
    }

    #[test]
    fn test_fallback_skeleton_scans_cleanly() {
        let result = VisualizationAgent::fallback_diagram(
            "Order Handling",
            &["Validate".to_string(), "Ship".to_string()],
        );
        let pairs = crate::bpmn::scan_id_name_pairs(&result.diagram_data).unwrap();
        assert_eq!(pairs.get("Task_1").unwrap(), "Validate");
        assert_eq!(pairs.get("EndEvent_1").unwrap(), "End");
    }
}
