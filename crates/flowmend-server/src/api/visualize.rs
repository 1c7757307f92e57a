//! `/api/visualize` — diagram generation without the improvement pipeline.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use flowmend_core::{AppState, ServiceError, WorkflowReply};

#[derive(Debug, Deserialize)]
pub struct FileText {
    #[serde(default)]
    pub file_type: String,
    pub file_content: String,
}

#[derive(Debug, Deserialize)]
pub struct VisualizeRequest {
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Prompt describing the process to visualize.
    pub prompt: String,
    /// Already-extracted file contents supplying extra context.
    #[serde(default)]
    pub file_texts: Vec<FileText>,
}

fn default_user() -> String {
    "visualize".to_string()
}

/// POST /api/visualize
pub async fn visualize(
    State(state): State<AppState>,
    Json(body): Json<VisualizeRequest>,
) -> Result<Json<WorkflowReply>, ServiceError> {
    let file_texts = if body.file_texts.is_empty() {
        None
    } else {
        Some(
            body.file_texts
                .iter()
                .map(|f| f.file_content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    };

    let session_id = state.orchestrator.start_new_session(&body.user_id).await;
    let reply = state
        .orchestrator
        .visualize_process_only(&session_id, &body.prompt, file_texts, None)
        .await?;
    Ok(Json(reply))
}
