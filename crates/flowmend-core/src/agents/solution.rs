//! Solution agent — proposes improvements and the redesigned step sequence.

use std::sync::Arc;

use serde::Deserialize;

use crate::agents::{call_and_repair, CallSpec, RepairedCall};
use crate::error::ServiceError;
use crate::llm::CompletionClient;
use crate::models::{
    BottleneckHypothesis, ImprovedProcess, ProcessDescription, ProposedImprovement,
    VerifiedInformation,
};

const GENERATE_SPEC: CallSpec = CallSpec {
    temperature: 0.7,
    max_tokens: 1800,
};

/// Lenient parse target: the model's echo of `original_process` drifts from
/// the real shape often enough that every field is optional here and the
/// record is normalized afterwards.
#[derive(Debug, Deserialize)]
struct RawImprovedProcess {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    original_process: Option<ProcessDescription>,
    #[serde(default)]
    improvements: Vec<ProposedImprovement>,
    #[serde(default)]
    improved_steps: Vec<String>,
    #[serde(default)]
    summary_of_changes: Option<String>,
}

pub struct SolutionAgent {
    completion: Arc<dyn CompletionClient>,
}

impl SolutionAgent {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    /// Generate an [`ImprovedProcess`] from the accumulated analysis.
    ///
    /// Falls back to a canned four-step generic plan when the response
    /// cannot be parsed, so the diagram step downstream always has steps to
    /// draw.
    pub async fn generate(
        &self,
        process: &ProcessDescription,
        bottlenecks: &[BottleneckHypothesis],
        verified: &[VerifiedInformation],
        diagram_xml: Option<&str>,
    ) -> Result<ImprovedProcess, ServiceError> {
        let bottleneck_summary = bottlenecks
            .iter()
            .map(|b| {
                format!(
                    "- Location: {}, Reason: {}. Info needed: {}",
                    b.location,
                    b.reason_hypothesis,
                    b.info_needed.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let verified_summary = verified
            .iter()
            .map(|v| {
                format!(
                    "- Query: {}, Info: {} (Confidence: {})",
                    v.query,
                    v.summary,
                    v.confidence.as_str()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let diagram_context = diagram_xml
            .map(|xml| format!("\nCurrent BPMN diagram of the process:\n{}", xml))
            .unwrap_or_default();

        let original_json = serde_json::to_string(process)
            .map_err(|e| ServiceError::Internal(format!("serialize process: {}", e)))?;

        let prompt = format!(
            r#"Based on the following original process description, identified bottlenecks, and verified information,
propose concrete, actionable solutions to improve the process.
Then, describe the sequential steps of the NEW, IMPROVED process.

Aim for practical, actionable improvements that directly address the bottlenecks and align with the user's goal.
Consider using the verified information (best practices, data) to inform your solutions.

Original Process Name: {name}
Original Steps: {steps:?}
Original Pain Points: {pain_points}
Goal: {goal}

Identified Bottlenecks:
{bottlenecks}

Verified Information (Relevant Best Practices/Data):
{verified}{diagram_context}

Provide the output as a single JSON object with this shape:
{{
    "name": "Improved {name}",
    "original_process": {original_json},
    "improvements": [
        {{
            "step_number": null,
            "description": "A detailed description of the proposed change.",
            "expected_impact": "Expected benefits.",
            "tools_or_tech": ["Recommended tools or technologies"],
            "actors_involved": ["Roles or departments involved"]
        }}
    ],
    "improved_steps": ["Step 1 of improved process", "Step 2 of improved process"],
    "summary_of_changes": "A high-level summary of all proposed changes and their overall impact."
}}
Ensure the JSON is perfectly valid and can be directly parsed. Do not add any extra text outside the JSON block.
Ensure 'improved_steps' is a clear, concise, sequential list representing the new flow."#,
            name = process.name,
            steps = process.steps,
            pain_points = if process.pain_points.is_empty() {
                "None".to_string()
            } else {
                process.pain_points.join(", ")
            },
            goal = process.goal.as_deref().unwrap_or("Not specified"),
            bottlenecks = if bottleneck_summary.is_empty() {
                "No specific bottlenecks identified. Focus on general optimization based on pain points."
            } else {
                &bottleneck_summary
            },
            verified = if verified_summary.is_empty() {
                "No additional verified information."
            } else {
                &verified_summary
            },
        );

        tracing::info!("SolutionAgent: generating improvements for '{}'", process.name);
        match call_and_repair(self.completion.as_ref(), &prompt, GENERATE_SPEC).await? {
            RepairedCall::Parsed(value) => {
                match serde_json::from_value::<RawImprovedProcess>(value) {
                    Ok(raw) => Ok(Self::normalize(raw, process)),
                    Err(e) => {
                        tracing::error!("SolutionAgent: invalid improvement record: {}", e);
                        Ok(Self::fallback(process))
                    }
                }
            }
            RepairedCall::Unparseable { failure, .. } => {
                tracing::error!("SolutionAgent: unparseable output: {}", failure);
                Ok(Self::fallback(process))
            }
        }
    }

    /// Fill gaps in the parsed record from what we already know. The echoed
    /// `original_process` is only trusted when it is itself complete.
    fn normalize(raw: RawImprovedProcess, process: &ProcessDescription) -> ImprovedProcess {
        let original_process = match raw.original_process {
            Some(echoed) if !echoed.is_incomplete() => echoed,
            _ => process.clone(),
        };

        let improved_steps = if raw.improved_steps.is_empty() {
            process.steps.clone()
        } else {
            raw.improved_steps
        };

        ImprovedProcess {
            name: raw
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Improved {}", process.name)),
            original_process,
            improvements: raw.improvements,
            improved_steps,
            summary_of_changes: raw.summary_of_changes.unwrap_or_default(),
        }
    }

    /// Canned generic plan used when the model output is unusable.
    fn fallback(process: &ProcessDescription) -> ImprovedProcess {
        let plan = [
            (
                "Document the current process end to end",
                "Creates a shared baseline and exposes undocumented handoffs.",
            ),
            (
                "Automate repetitive manual steps",
                "Reduces cycle time and error rates on high-volume work.",
            ),
            (
                "Standardize handoffs between actors",
                "Removes wait time caused by unclear ownership.",
            ),
            (
                "Measure outcomes and review regularly",
                "Makes further bottlenecks visible as they emerge.",
            ),
        ];

        ImprovedProcess {
            name: format!("Improved {}", process.name),
            original_process: process.clone(),
            improvements: plan
                .iter()
                .map(|(description, impact)| ProposedImprovement {
                    step_number: None,
                    description: description.to_string(),
                    expected_impact: impact.to_string(),
                    tools_or_tech: Vec::new(),
                    actors_involved: Vec::new(),
                })
                .collect(),
            improved_steps: plan.iter().map(|(d, _)| d.to_string()).collect(),
            summary_of_changes:
                "Applied a generic four-step improvement plan; a tailored solution could not be generated from the model output."
                    .to_string(),
        }
    }
}
