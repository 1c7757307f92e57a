//! Per-conversation session record and its status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::process::{
    BottleneckHypothesis, DiagramResult, ImprovedProcess, ProcessDescription, VerifiedInformation,
};
use crate::extract::FileKind;

/// Where a session currently sits in its lifecycle.
///
/// `Processing*` states are transient (visible only to a concurrent
/// `get_session_status` probe); every pipeline ends in `Completed`,
/// `ClarificationNeeded`, or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initialized,
    ProcessingQuery,
    ProcessingVisualization,
    ProcessingConversation,
    ProcessingOptimization,
    ClarificationNeeded,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::ProcessingQuery => "processing_query",
            Self::ProcessingVisualization => "processing_visualization",
            Self::ProcessingConversation => "processing_conversation",
            Self::ProcessingOptimization => "processing_optimization",
            Self::ClarificationNeeded => "clarification_needed",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// The last pipeline step a session finished, for mid-run progress probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    ContextAnalysis,
    BottleneckHypotheses,
    BottleneckAnalysisComplete,
    SolutionGeneration,
    VisualizationComplete,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextAnalysis => "context_analysis",
            Self::BottleneckHypotheses => "bottleneck_hypotheses",
            Self::BottleneckAnalysisComplete => "bottleneck_analysis_complete",
            Self::SolutionGeneration => "solution_generation",
            Self::VisualizationComplete => "visualization_complete",
        }
    }
}

/// The only mutable, long-lived record in the system.
///
/// Owned and mutated exclusively by the orchestrator; every pipeline step
/// writes its result here before the next step runs, so progress survives a
/// mid-pipeline status probe and later prompts can embed earlier results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub query: Option<String>,
    pub original_file_texts: Option<String>,
    pub original_file_type: Option<FileKind>,
    pub process_desc: Option<ProcessDescription>,
    pub bottlenecks: Vec<BottleneckHypothesis>,
    pub verified_info: Vec<VerifiedInformation>,
    pub improved_process: Option<ImprovedProcess>,
    pub diagram: Option<DiagramResult>,
    /// Formatted memo summarizing the last completed pipeline run.
    pub run_memory: String,
    /// Append-only free-text log of conversational turns.
    pub conversation_memory: String,
    pub status: SessionStatus,
    pub last_step_completed: Option<PipelineStep>,
    pub message: String,
    pub clarification_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, user_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            query: None,
            original_file_texts: None,
            original_file_type: None,
            process_desc: None,
            bottlenecks: Vec::new(),
            verified_info: Vec::new(),
            improved_process: None,
            diagram: None,
            run_memory: String::new(),
            conversation_memory: String::new(),
            status: SessionStatus::Initialized,
            last_step_completed: None,
            message: String::new(),
            clarification_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a step completion and bump the update timestamp.
    pub fn mark_step(&mut self, step: PipelineStep) {
        self.last_step_completed = Some(step);
        self.updated_at = Utc::now();
    }
}
