//! WorkflowOrchestrator — the top-level pipeline state machine.
//!
//! Owns the session store and all five agents. Each inbound request is
//! routed through intent classification, then through a fixed sequence of
//! agent calls with clarification gates between them. Every step writes its
//! result into the session before the next step runs, so a concurrent
//! status probe sees real progress and later prompts can embed earlier
//! results.
//!
//! Failure policy: agent parse failures never abort a pipeline (each agent
//! substitutes a typed fallback); collaborator transport failures end the
//! run with an error reply but leave the session in place for retry;
//! unknown session ids and wrong-state operations surface as `Err` without
//! touching any session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::agents::{
    BottleneckAgent, ContextAgent, RetrievalAgent, SolutionAgent, VisualizationAgent,
};
use crate::bpmn;
use crate::classify::{ConversationKind, ConversationTypeClassifier, Intent, IntentClassifier};
use crate::error::ServiceError;
use crate::extract::FileKind;
use crate::language::{detect_language, language_instruction};
use crate::llm::CompletionClient;
use crate::models::{PipelineStep, ProcessDescription, Session, SessionStatus};
use crate::search::SearchClient;
use crate::store::SessionStore;

/// Outcome class of one orchestrator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Completed,
    ClarificationNeeded,
    Error,
    InProgress,
}

/// Structured reply returned by every orchestrator operation.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReply {
    pub status: ReplyStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WorkflowReply {
    pub fn completed(message: &str, session_id: Option<&str>, data: serde_json::Value) -> Self {
        Self {
            status: ReplyStatus::Completed,
            message: message.to_string(),
            session_id: session_id.map(str::to_string),
            data: Some(data),
        }
    }

    pub fn clarification(message: &str, session_id: &str, clarification_message: &str) -> Self {
        Self {
            status: ReplyStatus::ClarificationNeeded,
            message: message.to_string(),
            session_id: Some(session_id.to_string()),
            data: Some(serde_json::json!({
                "clarification_message": clarification_message,
            })),
        }
    }

    pub fn error(message: &str, session_id: Option<&str>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: message.to_string(),
            session_id: session_id.map(str::to_string),
            data: None,
        }
    }
}

pub struct WorkflowOrchestrator {
    sessions: SessionStore,
    intent_classifier: IntentClassifier,
    conversation_classifier: ConversationTypeClassifier,
    context_agent: ContextAgent,
    bottleneck_agent: BottleneckAgent,
    retrieval_agent: RetrievalAgent,
    solution_agent: SolutionAgent,
    visualization_agent: VisualizationAgent,
}

impl WorkflowOrchestrator {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        search: Option<Arc<dyn SearchClient>>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            intent_classifier: IntentClassifier::new(completion.clone()),
            conversation_classifier: ConversationTypeClassifier::new(completion.clone()),
            context_agent: ContextAgent::new(completion.clone()),
            bottleneck_agent: BottleneckAgent::new(completion.clone()),
            retrieval_agent: RetrievalAgent::new(completion.clone(), search),
            solution_agent: SolutionAgent::new(completion.clone()),
            visualization_agent: VisualizationAgent::new(completion),
        }
    }

    /// The session store (diagnostics, tests).
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn start_new_session(&self, user_id: &str) -> String {
        self.sessions.create(user_id).await
    }

    /// Main entry point: classify intent, then run the matching pipeline.
    pub async fn process_user_query(
        &self,
        session_id: &str,
        query: &str,
        file_texts: Option<String>,
        file_type: Option<FileKind>,
    ) -> Result<WorkflowReply, ServiceError> {
        let intent = self.intent_classifier.classify(query).await;
        tracing::info!("[{}] Determined user intent: {:?}", session_id, intent);

        match intent {
            Intent::Visualize => {
                self.visualize_process_only(session_id, query, file_texts, file_type)
                    .await
            }
            Intent::Conversation => {
                // Conversation routed through the main entry point runs
                // against whatever diagram/memory the session has so far.
                let (diagram, memory) = {
                    let handle = self
                        .sessions
                        .get(session_id)
                        .await
                        .ok_or_else(|| ServiceError::NotFound("Invalid session ID.".into()))?;
                    let session = handle.lock().await;
                    (
                        session
                            .diagram
                            .as_ref()
                            .map(|d| d.diagram_data.clone())
                            .unwrap_or_default(),
                        session.conversation_memory.clone(),
                    )
                };
                self.handle_conversation(session_id, query, &diagram, &memory)
                    .await
            }
            Intent::Improve | Intent::Analyze => {
                self.improvement_pipeline(session_id, query, file_texts, file_type)
                    .await
            }
        }
    }

    /// Visualize-only pipeline: context extraction → gate → diagram.
    pub async fn visualize_process_only(
        &self,
        session_id: &str,
        query: &str,
        file_texts: Option<String>,
        file_type: Option<FileKind>,
    ) -> Result<WorkflowReply, ServiceError> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| ServiceError::NotFound("Invalid session ID.".into()))?;
        let mut session = handle.lock().await;

        session.query = Some(query.to_string());
        session.original_file_texts = file_texts.clone();
        session.original_file_type = file_type;
        session.status = SessionStatus::ProcessingVisualization;
        session.last_step_completed = None;

        tracing::info!(
            "[{}] Processing visualization request: '{}'",
            session_id,
            truncate(query, 50)
        );

        // 1. Context extraction
        let process_desc = match self.context_agent.extract_from_query(query).await {
            Ok(desc) => desc,
            Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
        };
        session.process_desc = Some(process_desc.clone());
        session.mark_step(PipelineStep::ContextAnalysis);

        if process_desc.is_incomplete() {
            tracing::warn!("[{}] Context agent needs clarification for visualization.", session_id);
            return Ok(pause_for_clarification(
                &mut session,
                session_id,
                "More details needed to understand the process.",
                "Could not understand the process to visualize. Please provide more details about the process steps.",
            ));
        }

        // 2. Diagram generation
        let description = format!(
            "Goal: {}. Inputs: {}. Outputs: {}",
            process_desc.goal.as_deref().unwrap_or("Not specified"),
            process_desc.inputs.join(", "),
            process_desc.outputs.join(", ")
        );
        let viz = match self
            .visualization_agent
            .generate_diagram(
                &process_desc.name,
                &process_desc.steps,
                &description,
                file_texts.as_deref(),
                None,
            )
            .await
        {
            Ok(viz) => viz,
            Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
        };
        session.diagram = Some(viz.clone());

        session.run_memory = format!(
            "Visualization Session Memory:\n\
             - Process Name: {}\n\
             - Process Steps: {} steps\n\
             - Process Goal: {}\n\
             - Generated Diagram: {}\n\
             - Diagram Description: {}\n\
             - Number of Diagram Elements: {}\n\
             - Visualization Timestamp: {}",
            process_desc.name,
            process_desc.steps.len(),
            process_desc.goal.as_deref().unwrap_or("Not specified"),
            viz.diagram_name,
            viz.diagram_description,
            viz.detail_descriptions.len(),
            Utc::now().to_rfc3339(),
        );
        session.mark_step(PipelineStep::VisualizationComplete);
        session.status = SessionStatus::Completed;
        session.message = "Process visualization complete!".to_string();

        let data = serde_json::json!({
            "process_name": process_desc.name,
            "process_steps": process_desc.steps,
            "diagram_data": viz.diagram_data,
            "diagram_name": viz.diagram_name,
            "diagram_description": viz.diagram_description,
            "detail_descriptions": viz.detail_descriptions,
            "memory": session.run_memory,
        });
        Ok(WorkflowReply::completed(
            "Process visualization complete!",
            Some(session_id),
            data,
        ))
    }

    /// Full improvement pipeline with clarification gates.
    async fn improvement_pipeline(
        &self,
        session_id: &str,
        query: &str,
        file_texts: Option<String>,
        file_type: Option<FileKind>,
    ) -> Result<WorkflowReply, ServiceError> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| ServiceError::NotFound("Invalid session ID.".into()))?;
        let mut session = handle.lock().await;

        session.query = Some(query.to_string());
        session.original_file_texts = file_texts.clone();
        session.original_file_type = file_type;
        session.status = SessionStatus::ProcessingQuery;
        session.last_step_completed = None;

        tracing::info!(
            "[{}] Processing user query: '{}' with file_type: {:?}",
            session_id,
            truncate(query, 50),
            file_type
        );

        // 1. Context extraction
        let process_desc = match self.context_agent.extract_from_query(query).await {
            Ok(desc) => desc,
            Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
        };
        session.process_desc = Some(process_desc.clone());
        session.mark_step(PipelineStep::ContextAnalysis);
        tracing::info!("[{}] Context agent processed. Process: {}", session_id, process_desc.name);

        if process_desc.is_incomplete() {
            tracing::warn!("[{}] Context agent needs clarification.", session_id);
            return Ok(pause_for_clarification(
                &mut session,
                session_id,
                "More details needed to understand the process.",
                "Could not fully understand the process. Please provide more details about its steps, inputs, or outputs.",
            ));
        }

        // 2. Bottleneck identification
        let bottlenecks = match self
            .bottleneck_agent
            .identify(&process_desc, None, None)
            .await
        {
            Ok(bottlenecks) => bottlenecks,
            Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
        };
        session.bottlenecks = bottlenecks.clone();
        session.mark_step(PipelineStep::BottleneckHypotheses);
        tracing::info!(
            "[{}] Bottleneck agent identified initial hypotheses: {}",
            session_id,
            bottlenecks.len()
        );

        if bottlenecks.is_empty() {
            tracing::warn!("[{}] Bottleneck agent needs clarification.", session_id);
            return Ok(pause_for_clarification(
                &mut session,
                session_id,
                "No clear bottlenecks identified.",
                "Could not identify clear bottlenecks. Can you elaborate on the problems or specific areas of slowness/cost?",
            ));
        }

        // 3. Information retrieval for the first hypothesis only
        let mut retrieved = Vec::new();
        for info_need in &bottlenecks[0].info_needed {
            tracing::info!("[{}] Retrieving info for '{}'...", session_id, truncate(info_need, 60));
            let info = self.retrieval_agent.retrieve_and_verify(info_need).await;
            tracing::info!(
                "[{}] Retrieved info. Confidence: {}",
                session_id,
                info.confidence.as_str()
            );
            session.verified_info.push(info.clone());
            retrieved.push(info);
        }

        // 4. Refinement pass: a non-empty result replaces the earlier hypotheses
        if let Some(first) = retrieved.first() {
            let refined = match self
                .bottleneck_agent
                .identify(&process_desc, Some(first), None)
                .await
            {
                Ok(refined) => refined,
                Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
            };
            if !refined.is_empty() {
                session.bottlenecks = refined;
                tracing::info!("[{}] Bottleneck agent refined hypotheses using verified info.", session_id);
            }
        }
        session.mark_step(PipelineStep::BottleneckAnalysisComplete);

        // 5. Solution generation
        let improved = match self
            .solution_agent
            .generate(&process_desc, &session.bottlenecks, &session.verified_info, None)
            .await
        {
            Ok(improved) => improved,
            Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
        };
        session.improved_process = Some(improved.clone());
        session.mark_step(PipelineStep::SolutionGeneration);
        tracing::info!("[{}] Solution agent proposed improvements.", session_id);

        // 6. Diagram generation for the improved process
        let viz = match self
            .visualization_agent
            .generate_diagram(
                &improved.name,
                &improved.improved_steps,
                &format!("Improved process based on: {}", improved.summary_of_changes),
                file_texts.as_deref(),
                None,
            )
            .await
        {
            Ok(viz) => viz,
            Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
        };
        session.diagram = Some(viz.clone());

        session.run_memory = format!(
            "Process Improvement Session Memory:\n\
             - Original Process: {}\n\
             - Original Steps: {} steps\n\
             - Bottlenecks Identified: {}\n\
             - Verified Information Sources: {}\n\
             - Improvements Generated: {}\n\
             - Improved Process: {}\n\
             - Improved Steps: {} steps\n\
             - Summary of Changes: {}\n\
             - Generated Diagram: {}\n\
             - Analysis Timestamp: {}",
            process_desc.name,
            process_desc.steps.len(),
            session.bottlenecks.len(),
            session.verified_info.len(),
            improved.improvements.len(),
            improved.name,
            improved.improved_steps.len(),
            improved.summary_of_changes,
            viz.diagram_name,
            Utc::now().to_rfc3339(),
        );
        session.mark_step(PipelineStep::VisualizationComplete);
        session.status = SessionStatus::Completed;
        session.message = "Process analysis and improvement complete!".to_string();

        let data = serde_json::json!({
            "improved_process_summary": improved.summary_of_changes,
            "improved_process_steps": improved.improved_steps,
            "diagram_data": viz.diagram_data,
            "diagram_name": viz.diagram_name,
            "diagram_description": viz.diagram_description,
            "detail_descriptions": viz.detail_descriptions,
            "memory": session.run_memory,
        });
        Ok(WorkflowReply::completed(
            "Process analysis and improvement complete!",
            Some(session_id),
            data,
        ))
    }

    /// Conversation pipeline: classify the turn, then branch.
    pub async fn handle_conversation(
        &self,
        session_id: &str,
        query: &str,
        diagram_data: &str,
        memory: &str,
    ) -> Result<WorkflowReply, ServiceError> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| ServiceError::NotFound("Invalid session ID.".into()))?;
        let mut session = handle.lock().await;

        session.query = Some(query.to_string());
        session.status = SessionStatus::ProcessingConversation;
        session.last_step_completed = None;

        tracing::info!("[{}] Processing conversation: '{}'", session_id, truncate(query, 50));

        let kind = self.conversation_classifier.classify(query).await;
        tracing::info!("[{}] Conversation type: {:?}", session_id, kind);

        let language = detect_language(query);
        let diagram_description = session
            .diagram
            .as_ref()
            .map(|d| d.diagram_description.clone())
            .unwrap_or_default();

        match kind {
            ConversationKind::Question => {
                let answer = self
                    .context_agent
                    .answer_about_diagram(
                        query,
                        diagram_data,
                        memory,
                        &diagram_description,
                        language_instruction(language),
                    )
                    .await;
                session.conversation_memory = format!("{}\nQ: {}\nA: {}", memory, query, answer);
                session.status = SessionStatus::Completed;
                session.message = "Question answered successfully!".to_string();

                let data = serde_json::json!({
                    "action": "answer_question",
                    "diagram_data": diagram_data,
                    "detail_descriptions": {},
                    "answer": answer,
                    "memory": session.conversation_memory,
                });
                Ok(WorkflowReply::completed(
                    "Question answered successfully!",
                    Some(session_id),
                    data,
                ))
            }
            ConversationKind::Modification => {
                let modification = match self
                    .visualization_agent
                    .modify_diagram(query, diagram_data, memory, &diagram_description, language)
                    .await
                {
                    Ok(modification) => modification,
                    Err(e) => return Ok(fail_session(&mut session, session_id, &e)),
                };
                session.conversation_memory = format!(
                    "{}\nModification Request: {}\nApplied: {}",
                    memory, query, modification.summary
                );
                session.status = SessionStatus::Completed;
                session.message = "Diagram modified successfully!".to_string();

                let data = serde_json::json!({
                    "action": "modify_diagram",
                    "diagram_data": modification.diagram_data,
                    "detail_descriptions": modification.detail_descriptions,
                    "answer": modification.summary,
                    "memory": session.conversation_memory,
                });
                Ok(WorkflowReply::completed(
                    "Diagram modified successfully!",
                    Some(session_id),
                    data,
                ))
            }
            ConversationKind::Information => {
                // No model call: the statement is appended verbatim.
                session.conversation_memory = if memory.is_empty() {
                    format!("Additional Information: {}", query)
                } else {
                    format!("{}\nAdditional Information: {}", memory, query)
                };
                session.status = SessionStatus::Completed;
                session.message = "Information added to memory!".to_string();

                let data = serde_json::json!({
                    "action": "add_information",
                    "diagram_data": diagram_data,
                    "detail_descriptions": {},
                    "answer": "Information has been added to the conversation memory for future reference.",
                    "memory": session.conversation_memory,
                });
                Ok(WorkflowReply::completed(
                    "Information added to memory!",
                    Some(session_id),
                    data,
                ))
            }
        }
    }

    /// Optimization pipeline: sessionless rework of an existing diagram.
    pub async fn handle_optimization(
        &self,
        diagram_data: &str,
        memory: &str,
    ) -> Result<WorkflowReply, ServiceError> {
        tracing::info!("Starting optimization workflow...");
        let language = detect_language(&format!("{} {}", diagram_data, memory));
        let instruction = language_instruction(language);

        // 1. Understand the current process from the diagram
        let process_summary = match self
            .context_agent
            .summarize_diagram(diagram_data, memory, instruction)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Error during optimization handling: {}", e);
                return Ok(WorkflowReply::error(
                    &format!("An error occurred during optimization: {}", e),
                    None,
                ));
            }
        };
        let process_desc = ProcessDescription {
            name: "Process from Diagram".to_string(),
            goal: Some("Optimize existing process".to_string()),
            steps: vec![process_summary],
            ..Default::default()
        };

        // 2. Identify bottlenecks with diagram context
        let bottlenecks = match self
            .bottleneck_agent
            .identify(&process_desc, None, Some(diagram_data))
            .await
        {
            Ok(bottlenecks) => bottlenecks,
            Err(e) => {
                return Ok(WorkflowReply::error(
                    &format!("An error occurred during optimization: {}", e),
                    None,
                ))
            }
        };
        tracing::info!("Bottleneck agent identified {} bottlenecks", bottlenecks.len());

        // 3. Retrieve info for every hypothesis, plus one general query first
        let mut info_queries =
            vec![format!("best practices for optimizing {}", process_desc.name)];
        for bottleneck in &bottlenecks {
            info_queries.extend(bottleneck.info_needed.iter().cloned());
        }

        let mut verified_info = Vec::new();
        for (i, info_query) in info_queries.iter().enumerate() {
            tracing::info!("  Processing query {}: {}", i + 1, truncate(info_query, 60));
            let info = self.retrieval_agent.retrieve_and_verify(info_query).await;
            verified_info.push(info);
        }

        // 4. Generate solutions
        let improved = match self
            .solution_agent
            .generate(&process_desc, &bottlenecks, &verified_info, Some(diagram_data))
            .await
        {
            Ok(improved) => improved,
            Err(e) => {
                return Ok(WorkflowReply::error(
                    &format!("An error occurred during optimization: {}", e),
                    None,
                ))
            }
        };

        // 5. Visualize the reworked process
        let viz = match self
            .visualization_agent
            .generate_diagram(
                &improved.name,
                &improved.improved_steps,
                &improved.summary_of_changes,
                None,
                Some(diagram_data),
            )
            .await
        {
            Ok(viz) => viz,
            Err(e) => {
                return Ok(WorkflowReply::error(
                    &format!("An error occurred during optimization: {}", e),
                    None,
                ))
            }
        };

        // 6. Compose the response
        let answer = improved.summary_of_changes.clone();

        let optimization_detail: HashMap<String, String> = improved
            .improvements
            .iter()
            .map(|imp| {
                (
                    truncate_words(&imp.description, 8),
                    format!("{} (Expected Impact: {})", imp.description, imp.expected_impact),
                )
            })
            .collect();

        // Replace node-id keys with human-readable names where the new
        // diagram provides them.
        let detail_descriptions = match bpmn::scan_id_name_pairs(&viz.diagram_data) {
            Ok(id_to_name) => viz
                .detail_descriptions
                .iter()
                .map(|(k, v)| {
                    let key = id_to_name.get(k).cloned().unwrap_or_else(|| k.clone());
                    (key, v.clone())
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Could not scan generated diagram for node names: {}", e);
                viz.detail_descriptions.clone()
            }
        };

        let updated_memory = format!("{}\n\n[Optimization Summary]\n{}", memory, answer);
        tracing::info!("Optimization workflow completed successfully!");

        let data = serde_json::json!({
            "diagram_data": viz.diagram_data,
            "answer": answer,
            "detail_descriptions": detail_descriptions,
            "optimization_detail": optimization_detail,
            "memory": updated_memory,
        });
        Ok(WorkflowReply::completed(
            "Process optimized successfully!",
            None,
            data,
        ))
    }

    /// Resume a paused session: append the clarification to the stored query
    /// and replay the pipeline from the first step.
    pub async fn resume_session_with_clarification(
        &self,
        session_id: &str,
        clarification: &str,
    ) -> Result<WorkflowReply, ServiceError> {
        let (query, file_texts, file_type) = {
            let handle = self
                .sessions
                .get(session_id)
                .await
                .ok_or_else(|| ServiceError::NotFound("Invalid session ID.".into()))?;
            let mut session = handle.lock().await;

            if session.status != SessionStatus::ClarificationNeeded {
                tracing::warn!(
                    "[{}] Attempted to clarify a session not awaiting clarification (status: {}).",
                    session_id,
                    session.status.as_str()
                );
                return Err(ServiceError::Conflict(
                    "Session is not awaiting clarification.".into(),
                ));
            }

            let combined = format!(
                "{}\n\nUser Clarification: {}",
                session.query.as_deref().unwrap_or_default(),
                clarification
            );
            session.query = Some(combined.clone());
            (
                combined,
                session.original_file_texts.clone(),
                session.original_file_type,
            )
            // lock released here so the replay can re-acquire it
        };

        tracing::info!(
            "[{}] Resuming session with clarification: '{}'",
            session_id,
            truncate(clarification, 50)
        );
        self.process_user_query(session_id, &query, file_texts, file_type)
            .await
    }

    /// Report where a session currently stands, mid-pipeline included.
    pub async fn get_session_status(
        &self,
        session_id: &str,
    ) -> Result<WorkflowReply, ServiceError> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| ServiceError::NotFound("Session not found.".into()))?;
        let session = handle.lock().await;

        match session.status {
            SessionStatus::Completed => {
                Ok(WorkflowReply::completed(
                    &session.message,
                    Some(session_id),
                    completed_session_data(&session),
                ))
            }
            SessionStatus::ClarificationNeeded => {
                let message = session
                    .clarification_message
                    .clone()
                    .unwrap_or_else(|| "Clarification needed.".to_string());
                Ok(WorkflowReply::clarification(&message, session_id, &message))
            }
            SessionStatus::Error => Ok(WorkflowReply::error(&session.message, Some(session_id))),
            _ => Ok(WorkflowReply {
                status: ReplyStatus::InProgress,
                message: session.message.clone(),
                session_id: Some(session_id.to_string()),
                data: Some(serde_json::json!({
                    "session_status": session.status.as_str(),
                    "last_step": session.last_step_completed.map(|s| s.as_str()),
                })),
            }),
        }
    }

    pub async fn end_session(&self, session_id: &str) -> Result<WorkflowReply, ServiceError> {
        if self.sessions.remove(session_id).await {
            Ok(WorkflowReply::completed(
                "Session ended.",
                Some(session_id),
                serde_json::Value::Null,
            ))
        } else {
            Err(ServiceError::NotFound("Session not found.".into()))
        }
    }
}

/// Mark a session failed after a collaborator transport error and build the
/// matching reply. The session stays in the store for a later retry.
fn fail_session(session: &mut Session, session_id: &str, err: &ServiceError) -> WorkflowReply {
    let message = format!("An error occurred: {}", err);
    session.status = SessionStatus::Error;
    session.message = message.clone();
    session.updated_at = Utc::now();
    tracing::error!("[{}] Pipeline failed: {}", session_id, err);
    WorkflowReply::error(&message, Some(session_id))
}

/// Park a session in the clarification state and build the pause reply.
fn pause_for_clarification(
    session: &mut Session,
    session_id: &str,
    message: &str,
    clarification_message: &str,
) -> WorkflowReply {
    session.status = SessionStatus::ClarificationNeeded;
    session.clarification_message = Some(clarification_message.to_string());
    session.message = message.to_string();
    session.updated_at = Utc::now();
    WorkflowReply::clarification(message, session_id, clarification_message)
}

/// Assemble the status payload for a completed session from whichever
/// results the run produced (a visualize-only run has no improved process).
fn completed_session_data(session: &Session) -> serde_json::Value {
    let mut data = serde_json::Map::new();
    if let Some(improved) = &session.improved_process {
        data.insert(
            "improved_process_summary".into(),
            serde_json::json!(improved.summary_of_changes),
        );
        data.insert(
            "improved_process_steps".into(),
            serde_json::json!(improved.improved_steps),
        );
    }
    if let Some(diagram) = &session.diagram {
        data.insert("diagram_data".into(), serde_json::json!(diagram.diagram_data));
        data.insert("diagram_name".into(), serde_json::json!(diagram.diagram_name));
        data.insert(
            "diagram_description".into(),
            serde_json::json!(diagram.diagram_description),
        );
        data.insert(
            "detail_descriptions".into(),
            serde_json::json!(diagram.detail_descriptions),
        );
    }
    serde_json::Value::Object(data)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// First `max` words of a description, with an ellipsis when truncated.
fn truncate_words(s: &str, max: usize) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() > max {
        format!("{}...", words[..max].join(" "))
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("one two three", 8), "one two three");
        assert_eq!(
            truncate_words("a b c d e f g h i j", 8),
            "a b c d e f g h..."
        );
    }

    #[test]
    fn test_reply_serialization_uses_snake_case_status() {
        let reply = WorkflowReply::error("boom", None);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "error");

        let reply = WorkflowReply::clarification("need more", "s1", "what steps?");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "clarification_needed");
        assert_eq!(json["data"]["clarification_message"], "what steps?");
    }
}
