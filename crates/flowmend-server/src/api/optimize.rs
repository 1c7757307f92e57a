//! `/api/optimize` — rework an existing diagram end to end.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use flowmend_core::{AppState, ServiceError, WorkflowReply};

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    /// The BPMN XML diagram data of the process to optimize.
    pub diagram_data: String,
    /// Accumulated conversational memory for context.
    #[serde(default)]
    pub memory: String,
}

/// POST /api/optimize
pub async fn optimize(
    State(state): State<AppState>,
    Json(body): Json<OptimizeRequest>,
) -> Result<Json<WorkflowReply>, ServiceError> {
    let reply = state
        .orchestrator
        .handle_optimization(&body.diagram_data, &body.memory)
        .await?;
    Ok(Json(reply))
}
