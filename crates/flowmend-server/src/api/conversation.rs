//! `/api/conversation` — questions, modifications, and added context for an
//! existing diagram.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use flowmend_core::{AppState, ServiceError, WorkflowReply};

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    /// Session to converse in; a fresh one is created when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// The user's question, modification request, or information to add.
    pub prompt: String,
    /// The current BPMN XML diagram data.
    #[serde(default)]
    pub diagram_data: String,
    /// The current conversational memory string.
    #[serde(default)]
    pub memory: String,
}

/// POST /api/conversation
pub async fn conversation(
    State(state): State<AppState>,
    Json(body): Json<ConversationRequest>,
) -> Result<Json<WorkflowReply>, ServiceError> {
    let session_id = match body.session_id {
        Some(id) => id,
        None => state.orchestrator.start_new_session("conversation").await,
    };

    let reply = state
        .orchestrator
        .handle_conversation(&session_id, &body.prompt, &body.diagram_data, &body.memory)
        .await?;
    Ok(Json(reply))
}
