//! `flowmend ask` / `flowmend visualize` — one-shot pipeline runs.

use flowmend_core::{AppStateInner, ReplyStatus, WorkflowReply};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowmend_core=warn,flowmend_cli=info".into()),
        )
        .init();
}

fn print_reply(reply: &WorkflowReply) {
    match serde_json::to_string_pretty(reply) {
        Ok(json) => println!("{}", json),
        Err(_) => println!("{}", reply.message),
    }
    if reply.status == ReplyStatus::ClarificationNeeded {
        println!(
            "\nThe pipeline paused for clarification. Re-run with more detail in the query."
        );
    }
}

/// Run the full improvement pipeline for a query and print the reply.
pub async fn run_ask(query: &str, user_id: &str) -> Result<(), String> {
    init_tracing();
    let state = AppStateInner::from_env();

    let session_id = state.orchestrator.start_new_session(user_id).await;
    let reply = state
        .orchestrator
        .process_user_query(&session_id, query, None, None)
        .await
        .map_err(|e| e.to_string())?;

    print_reply(&reply);
    Ok(())
}

/// Run the visualize-only pipeline for a query and print the reply.
pub async fn run_visualize(query: &str, user_id: &str) -> Result<(), String> {
    init_tracing();
    let state = AppStateInner::from_env();

    let session_id = state.orchestrator.start_new_session(user_id).await;
    let reply = state
        .orchestrator
        .visualize_process_only(&session_id, query, None, None)
        .await
        .map_err(|e| e.to_string())?;

    print_reply(&reply);
    Ok(())
}
