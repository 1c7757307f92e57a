//! `/api/process` — session lifecycle and the improvement pipeline.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::Multipart;
use serde::Deserialize;

use flowmend_core::{AppState, ServiceError, WorkflowReply};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_process_analysis))
        .route("/{session_id}/status", get(get_process_status))
        .route("/{session_id}/clarify", post(provide_clarification))
        .route("/{session_id}/end", post(end_process_session))
}

/// POST /api/process/start — Start a new process-analysis session.
///
/// Multipart form: `user_id`, `query`, optional `input_file`
/// (PDF, DOCX, BPMN) for process context.
async fn start_process_analysis(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<WorkflowReply>, ServiceError> {
    let mut user_id: Option<String> = None;
    let mut query: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_id") => {
                user_id = Some(field.text().await.map_err(|e| {
                    ServiceError::BadRequest(format!("Invalid user_id field: {}", e))
                })?);
            }
            Some("query") => {
                query = Some(field.text().await.map_err(|e| {
                    ServiceError::BadRequest(format!("Invalid query field: {}", e))
                })?);
            }
            Some("input_file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ServiceError::BadRequest(format!("Could not read input_file: {}", e))
                })?;
                upload = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let user_id =
        user_id.ok_or_else(|| ServiceError::BadRequest("Missing user_id field".into()))?;
    let query = query.ok_or_else(|| ServiceError::BadRequest("Missing query field".into()))?;

    let (file_texts, file_type) = match upload {
        Some((filename, bytes)) => {
            let (text, kind) = state
                .extractor
                .extract(&filename, &bytes)
                .map_err(|e| ServiceError::BadRequest(format!("Could not parse file: {}", e)))?;
            (Some(text), Some(kind))
        }
        None => (None, None),
    };

    let session_id = state.orchestrator.start_new_session(&user_id).await;
    let reply = state
        .orchestrator
        .process_user_query(&session_id, &query, file_texts, file_type)
        .await?;

    Ok(Json(reply))
}

/// GET /api/process/{session_id}/status — Status and results of a session.
async fn get_process_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<WorkflowReply>, ServiceError> {
    let reply = state.orchestrator.get_session_status(&session_id).await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
struct ClarifyRequest {
    clarification_response: String,
}

/// POST /api/process/{session_id}/clarify — Resume a paused session.
async fn provide_clarification(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ClarifyRequest>,
) -> Result<Json<WorkflowReply>, ServiceError> {
    let reply = state
        .orchestrator
        .resume_session_with_clarification(&session_id, &body.clarification_response)
        .await?;
    Ok(Json(reply))
}

/// POST /api/process/{session_id}/end — End a session.
async fn end_process_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<WorkflowReply>, ServiceError> {
    let reply = state.orchestrator.end_session(&session_id).await?;
    Ok(Json(reply))
}
