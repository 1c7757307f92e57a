//! End-to-end pipeline tests against a scripted completion stub.
//!
//! The stub matches each prompt to a canned response by a marker substring,
//! so every agent call in a pipeline can be controlled — and counted —
//! without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use flowmend_core::error::ServiceError;
use flowmend_core::llm::CompletionClient;
use flowmend_core::orchestration::{ReplyStatus, WorkflowOrchestrator};

// Markers identifying each agent's prompt.
const M_INTENT: &str = "determine their primary intent";
const M_CONV_TYPE: &str = "determine the conversation type";
const M_CONTEXT: &str = "Analyze the following user query about a business process";
const M_SUMMARIZE: &str = "Describe the business process the diagram represents";
const M_ANSWER: &str = "answer the user's question about the BPMN diagram";
const M_BOTTLENECK: &str = "Identify potential bottlenecks";
const M_SIMULATE: &str = "Simulate the results of a web search";
const M_VERIFY: &str = "verifying search results";
const M_SOLUTION: &str = "propose concrete, actionable solutions";
const M_GENERATE: &str = "Generate a BPMN (Business Process Model and Notation) 2.0 XML diagram";
const M_MODIFY: &str = "modify the BPMN diagram according to the user's request";

/// Per-marker response queues. When a queue is down to its last entry that
/// entry keeps being served, so repeated calls (e.g. the bottleneck
/// refinement pass) work without extra scripting.
struct ScriptedClient {
    scripts: Mutex<Vec<(&'static str, VecDeque<String>)>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn on(self, marker: &'static str, response: &str) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            if let Some((_, queue)) = scripts.iter_mut().find(|(m, _)| *m == marker) {
                queue.push_back(response.to_string());
            } else {
                scripts.push((marker, VecDeque::from([response.to_string()])));
            }
        }
        self
    }

    fn calls(&self, marker: &'static str) -> usize {
        *self.calls.lock().unwrap().get(marker).unwrap_or(&0)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, ServiceError> {
        let mut scripts = self.scripts.lock().unwrap();
        for (marker, queue) in scripts.iter_mut() {
            if prompt.contains(*marker) {
                *self.calls.lock().unwrap().entry(marker).or_insert(0) += 1;
                let response = if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().cloned().unwrap_or_default()
                };
                return Ok(response);
            }
        }
        Err(ServiceError::Upstream(format!(
            "no scripted response for prompt starting: {:.60}",
            prompt
        )))
    }
}

const CONTEXT_JSON: &str = r#"{"name": "Customer Support", "steps": ["intake", "triage", "resolve"], "inputs": ["ticket"], "outputs": ["resolution"], "pain_points": ["slow response times"], "metrics": {}, "goal": "faster responses"}"#;

const EMPTY_CONTEXT_JSON: &str = r#"{"name": "", "steps": []}"#;

const BOTTLENECK_JSON: &str = r#"[{"location": "triage", "reason_hypothesis": "manual routing", "info_needed": ["average triage time"]}]"#;

const HITS_JSON: &str = r#"[{"title": "Triage automation", "snippet": "Chatbots cut queue times", "url": "https://example.com/triage"}]"#;

const VERDICT_JSON: &str = r#"{"summary": "Chatbot triage reduces wait times by 30-50%.", "confidence": "High", "relevance": "Direct"}"#;

const SOLUTION_JSON: &str = r#"{
    "name": "Improved Customer Support",
    "original_process": {"name": "Customer Support", "steps": ["intake", "triage", "resolve"]},
    "improvements": [{"step_number": 2, "description": "Automate triage with a chatbot so tickets route instantly to the right team", "expected_impact": "50% faster routing", "tools_or_tech": ["Chatbot"], "actors_involved": ["Support"]}],
    "improved_steps": ["intake", "automated triage", "resolve"],
    "summary_of_changes": "Automated the triage step."
}"#;

const VIZ_JSON: &str = r#"{
    "diagram_data": "<bpmn:definitions xmlns:bpmn=\"http://www.omg.org/spec/BPMN/20100524/MODEL\"><bpmn:process id=\"Process_1\" name=\"Improved Customer Support\"><bpmn:startEvent id=\"StartEvent_1\" name=\"Start\"/><bpmn:task id=\"Task_1\" name=\"Automated Triage\"/><bpmn:endEvent id=\"EndEvent_1\" name=\"End\"/></bpmn:process></bpmn:definitions>",
    "diagram_name": "Improved Customer Support Diagram",
    "diagram_description": "BPMN diagram of the improved support flow",
    "detail_descriptions": {"Task_1": "Automated triage of incoming tickets"}
}"#;

fn full_improvement_stub() -> ScriptedClient {
    ScriptedClient::new()
        .on(M_INTENT, "improve")
        .on(M_CONTEXT, CONTEXT_JSON)
        .on(M_BOTTLENECK, BOTTLENECK_JSON)
        .on(M_SIMULATE, HITS_JSON)
        .on(M_VERIFY, VERDICT_JSON)
        .on(M_SOLUTION, SOLUTION_JSON)
        .on(M_GENERATE, VIZ_JSON)
}

#[tokio::test]
async fn test_full_improvement_pipeline_completes() {
    // Scenario A: a well-formed response at every step.
    let stub = Arc::new(full_improvement_stub());
    let orchestrator = WorkflowOrchestrator::new(stub.clone(), None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .process_user_query(
            &session_id,
            "I want to improve my customer support process; response times are too slow",
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Completed);
    let data = reply.data.unwrap();
    assert!(data["diagram_data"].as_str().unwrap().contains("<bpmn"));
    let steps = data["improved_process_steps"].as_array().unwrap();
    assert_eq!(steps[0], "intake");
    assert_eq!(steps[1], "automated triage");
    assert!(data["memory"].as_str().unwrap().contains("Process Improvement Session Memory"));

    // Refinement pass ran: bottleneck agent was invoked twice.
    assert_eq!(stub.calls(M_BOTTLENECK), 2);
    assert_eq!(stub.calls(M_SOLUTION), 1);

    // Status endpoint reflects the completed run.
    let status = orchestrator.get_session_status(&session_id).await.unwrap();
    assert_eq!(status.status, ReplyStatus::Completed);
    assert!(status.data.unwrap()["diagram_data"].as_str().unwrap().contains("<bpmn"));
}

#[tokio::test]
async fn test_incomplete_extraction_pauses_before_any_analysis() {
    // P2: empty name/steps → clarification, zero downstream calls.
    let stub = Arc::new(
        ScriptedClient::new()
            .on(M_INTENT, "improve")
            .on(M_CONTEXT, EMPTY_CONTEXT_JSON),
    );
    let orchestrator = WorkflowOrchestrator::new(stub.clone(), None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .process_user_query(&session_id, "improve my process", None, None)
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::ClarificationNeeded);
    assert_eq!(stub.calls(M_BOTTLENECK), 0);
    assert_eq!(stub.calls(M_SOLUTION), 0);
    assert_eq!(stub.calls(M_GENERATE), 0);
}

#[tokio::test]
async fn test_empty_bottlenecks_pause_before_retrieval() {
    // P3: empty hypothesis list → clarification before retrieval/solutions.
    let stub = Arc::new(
        ScriptedClient::new()
            .on(M_INTENT, "improve")
            .on(M_CONTEXT, CONTEXT_JSON)
            .on(M_BOTTLENECK, "[]"),
    );
    let orchestrator = WorkflowOrchestrator::new(stub.clone(), None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .process_user_query(&session_id, "improve my process", None, None)
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::ClarificationNeeded);
    assert_eq!(stub.calls(M_SIMULATE), 0);
    assert_eq!(stub.calls(M_VERIFY), 0);
    assert_eq!(stub.calls(M_SOLUTION), 0);
}

#[tokio::test]
async fn test_clarification_resume_replays_from_scratch() {
    // Scenario B: first pass pauses, the clarified re-run completes. The
    // context queue serves the empty extraction first, then the real one.
    let stub = Arc::new(
        ScriptedClient::new()
            .on(M_INTENT, "improve")
            .on(M_CONTEXT, EMPTY_CONTEXT_JSON)
            .on(M_CONTEXT, CONTEXT_JSON)
            .on(M_BOTTLENECK, BOTTLENECK_JSON)
            .on(M_SIMULATE, HITS_JSON)
            .on(M_VERIFY, VERDICT_JSON)
            .on(M_SOLUTION, SOLUTION_JSON)
            .on(M_GENERATE, VIZ_JSON),
    );
    let orchestrator = WorkflowOrchestrator::new(stub.clone(), None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .process_user_query(&session_id, "improve my support process", None, None)
        .await
        .unwrap();
    assert_eq!(reply.status, ReplyStatus::ClarificationNeeded);

    let reply = orchestrator
        .resume_session_with_clarification(&session_id, "Steps are: intake, triage, resolve")
        .await
        .unwrap();
    assert_eq!(reply.status, ReplyStatus::Completed);

    // The replay re-ran context extraction from the top.
    assert_eq!(stub.calls(M_CONTEXT), 2);
}

#[tokio::test]
async fn test_resume_requires_clarification_state() {
    let stub = Arc::new(full_improvement_stub());
    let orchestrator = WorkflowOrchestrator::new(stub, None);

    let session_id = orchestrator.start_new_session("u1").await;
    let err = orchestrator
        .resume_session_with_clarification(&session_id, "more details")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let stub = Arc::new(ScriptedClient::new().on(M_INTENT, "improve"));
    let orchestrator = WorkflowOrchestrator::new(stub, None);

    let err = orchestrator
        .process_user_query("nope", "improve things", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = orchestrator.get_session_status("nope").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = orchestrator.end_session("nope").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

const DIAGRAM_XML: &str = r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL"><bpmn:process id="Process_1" name="Orders"><bpmn:startEvent id="StartEvent_1" name="Start"/><bpmn:task id="Task_1" name="Check Order"/><bpmn:endEvent id="EndEvent_1" name="End"/></bpmn:process></bpmn:definitions>"#;

#[tokio::test]
async fn test_conversation_question_leaves_diagram_untouched() {
    // Scenario C / P6 (question half).
    let stub = Arc::new(
        ScriptedClient::new()
            .on(M_CONV_TYPE, "question")
            .on(M_ANSWER, "Task_1 checks the incoming order for completeness."),
    );
    let orchestrator = WorkflowOrchestrator::new(stub, None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .handle_conversation(&session_id, "What does Task_1 do?", DIAGRAM_XML, "")
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Completed);
    let data = reply.data.unwrap();
    assert_eq!(data["action"], "answer_question");
    assert_eq!(data["diagram_data"], DIAGRAM_XML);
    assert!(data["detail_descriptions"].as_object().unwrap().is_empty());
    assert!(data["answer"].as_str().unwrap().contains("completeness"));
    assert!(data["memory"].as_str().unwrap().contains("Q: What does Task_1 do?"));
}

#[tokio::test]
async fn test_conversation_modification_returns_new_diagram() {
    // P6 (modification half): rename Task_1 to "Validate Order".
    let stub = Arc::new(
        ScriptedClient::new()
            .on(M_CONV_TYPE, "modification")
            .on(
                M_MODIFY,
                r#"{
                    "diagram_data": "<bpmn:definitions xmlns:bpmn=\"http://www.omg.org/spec/BPMN/20100524/MODEL\"><bpmn:process id=\"Process_1\" name=\"Orders\"><bpmn:startEvent id=\"StartEvent_1\" name=\"Start\"/><bpmn:task id=\"Task_1\" name=\"Validate Order\"/><bpmn:endEvent id=\"EndEvent_1\" name=\"End\"/></bpmn:process></bpmn:definitions>",
                    "detail_descriptions": {"Task_1": "Validates the incoming order"},
                    "summary": "Renamed Task_1 to 'Validate Order'"
                }"#,
            ),
    );
    let orchestrator = WorkflowOrchestrator::new(stub, None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .handle_conversation(&session_id, "rename Task_1 to 'Validate Order'", DIAGRAM_XML, "")
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Completed);
    let data = reply.data.unwrap();
    assert_eq!(data["action"], "modify_diagram");
    assert_ne!(data["diagram_data"], DIAGRAM_XML);
    assert!(data["diagram_data"].as_str().unwrap().contains("Validate Order"));
    assert!(!data["detail_descriptions"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_conversation_information_makes_no_model_call_beyond_classification() {
    let stub = Arc::new(ScriptedClient::new().on(M_CONV_TYPE, "information"));
    let orchestrator = WorkflowOrchestrator::new(stub.clone(), None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .handle_conversation(&session_id, "We ship about 400 orders a day", DIAGRAM_XML, "")
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Completed);
    let data = reply.data.unwrap();
    assert_eq!(data["action"], "add_information");
    assert_eq!(data["diagram_data"], DIAGRAM_XML);
    assert!(data["memory"]
        .as_str()
        .unwrap()
        .contains("Additional Information: We ship about 400 orders a day"));
    assert_eq!(stub.calls(M_ANSWER), 0);
    assert_eq!(stub.calls(M_MODIFY), 0);
}

#[tokio::test]
async fn test_optimization_remaps_detail_keys_and_builds_detail_map() {
    let stub = Arc::new(
        ScriptedClient::new()
            .on(M_SUMMARIZE, "Orders are checked manually, then shipped.")
            .on(M_BOTTLENECK, BOTTLENECK_JSON)
            .on(M_SIMULATE, HITS_JSON)
            .on(M_VERIFY, VERDICT_JSON)
            .on(M_SOLUTION, SOLUTION_JSON)
            .on(M_GENERATE, VIZ_JSON),
    );
    let orchestrator = WorkflowOrchestrator::new(stub.clone(), None);

    let reply = orchestrator
        .handle_optimization(DIAGRAM_XML, "previous discussion")
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Completed);
    let data = reply.data.unwrap();

    // Node id replaced by its human-readable name from the new diagram.
    let details = data["detail_descriptions"].as_object().unwrap();
    assert!(details.contains_key("Automated Triage"));
    assert!(!details.contains_key("Task_1"));

    // Detail map keyed by the first 8 words of the improvement description.
    let detail = data["optimization_detail"].as_object().unwrap();
    let key = detail.keys().next().unwrap();
    assert!(key.starts_with("Automate triage with a chatbot so tickets route"));
    assert!(key.ends_with("..."));

    assert!(data["memory"].as_str().unwrap().contains("[Optimization Summary]"));

    // One best-practices query plus one per info_needed item.
    assert_eq!(stub.calls(M_VERIFY), 2);
}

#[tokio::test]
async fn test_visualize_only_pipeline() {
    let stub = Arc::new(
        ScriptedClient::new()
            .on(M_INTENT, "visualize")
            .on(M_CONTEXT, CONTEXT_JSON)
            .on(M_GENERATE, VIZ_JSON),
    );
    let orchestrator = WorkflowOrchestrator::new(stub.clone(), None);

    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .process_user_query(&session_id, "draw my support process", None, None)
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Completed);
    let data = reply.data.unwrap();
    assert_eq!(data["process_name"], "Customer Support");
    assert!(data["diagram_data"].as_str().unwrap().contains("<bpmn"));
    // No analysis agents ran.
    assert_eq!(stub.calls(M_BOTTLENECK), 0);
    assert_eq!(stub.calls(M_SOLUTION), 0);
}

#[tokio::test]
async fn test_completion_outage_surfaces_error_but_keeps_session() {
    struct DownClient;

    #[async_trait]
    impl CompletionClient for DownClient {
        async fn complete(
            &self,
            prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, ServiceError> {
            // Let classification fall back to its default; fail the rest.
            if prompt.contains(M_INTENT) {
                return Ok("improve".to_string());
            }
            Err(ServiceError::Upstream("completion service unreachable".into()))
        }
    }

    let orchestrator = WorkflowOrchestrator::new(Arc::new(DownClient), None);
    let session_id = orchestrator.start_new_session("u1").await;
    let reply = orchestrator
        .process_user_query(&session_id, "improve my process", None, None)
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Error);
    assert!(reply.message.contains("unreachable"));

    // The session survives for a retry.
    let status = orchestrator.get_session_status(&session_id).await.unwrap();
    assert_eq!(status.status, ReplyStatus::Error);
}
