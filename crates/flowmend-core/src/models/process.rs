//! Typed records exchanged between agents.
//!
//! These are the structured shapes the agents instruct the completion
//! service to emit. Parsing is always lenient (`#[serde(default)]` on
//! everything optional) because the producer is a text generator, not a
//! schema-aware peer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Structured description of a business process extracted from free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub metrics: HashMap<String, String>,
    #[serde(default)]
    pub goal: Option<String>,
}

impl ProcessDescription {
    /// A description with no name or no steps cannot drive the pipeline;
    /// the orchestrator pauses for clarification on it.
    pub fn is_incomplete(&self) -> bool {
        self.name.trim().is_empty() || self.steps.is_empty()
    }
}

/// A suspected bottleneck in a process, plus what we'd need to confirm it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleneckHypothesis {
    pub location: String,
    pub reason_hypothesis: String,
    #[serde(default)]
    pub info_needed: Vec<String>,
}

/// Confidence level attached to retrieved information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Lenient label parse — the model does not always match case.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// How relevant a piece of retrieved information is to the bottleneck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relevance {
    Direct,
    Indirect,
    None,
}

impl Relevance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "Direct",
            Self::Indirect => "Indirect",
            Self::None => "None",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "indirect" => Some(Self::Indirect),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Externally-sourced information after retrieval and verification.
///
/// Retrieval never fails outright: the worst case is a record with
/// `confidence: Low` and an apologetic summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedInformation {
    pub query: String,
    #[serde(default)]
    pub sources: Vec<String>,
    pub summary: String,
    pub confidence: Confidence,
    pub relevance: Relevance,
}

/// A single proposed change to the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedImprovement {
    #[serde(default)]
    pub step_number: Option<u32>,
    pub description: String,
    #[serde(default)]
    pub expected_impact: String,
    #[serde(default)]
    pub tools_or_tech: Vec<String>,
    #[serde(default)]
    pub actors_involved: Vec<String>,
}

/// The redesigned process with its improvements applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovedProcess {
    pub name: String,
    pub original_process: ProcessDescription,
    #[serde(default)]
    pub improvements: Vec<ProposedImprovement>,
    #[serde(default)]
    pub improved_steps: Vec<String>,
    #[serde(default)]
    pub summary_of_changes: String,
}

/// A generated BPMN diagram plus its per-node documentation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagramResult {
    #[serde(default)]
    pub diagram_data: String,
    #[serde(default)]
    pub diagram_name: String,
    #[serde(default)]
    pub diagram_description: String,
    #[serde(default)]
    pub detail_descriptions: HashMap<String, String>,
}
