//! The five prompting agents and their shared call contract.
//!
//! Every agent follows the same sequence per invocation:
//!
//! 1. render one deterministic prompt embedding its typed inputs plus an
//!    explicit output-schema instruction
//! 2. invoke the completion collaborator exactly once (no internal retries),
//!    with a `(temperature, max_tokens)` pair tuned for that agent
//! 3. pass the raw text through [`crate::repair::repair`]
//! 4. validate into the agent's typed result, or substitute the agent's
//!    typed fallback value
//!
//! Fallbacks absorb parse/validation failures *and collaborator timeouts*
//! locally, so a downstream pipeline step always receives a well-formed (if
//! degraded) input. Only non-timeout transport failures surface as `Err`.

pub mod bottleneck;
pub mod context;
pub mod retrieval;
pub mod solution;
pub mod visualization;

pub use bottleneck::BottleneckAgent;
pub use context::ContextAgent;
pub use retrieval::RetrievalAgent;
pub use solution::SolutionAgent;
pub use visualization::VisualizationAgent;

use crate::error::ServiceError;
use crate::llm::CompletionClient;
use crate::repair::{repair, RepairFailure};

/// Per-agent completion tuning.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallSpec {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Outcome of one contract call after repair.
pub(crate) enum RepairedCall {
    Parsed(serde_json::Value),
    /// Parse failed or the collaborator timed out; `raw` is the text we
    /// could not use (empty on timeout).
    Unparseable { failure: RepairFailure, raw: String },
}

/// Shared steps 2–3 of the contract: one completion call, then repair.
pub(crate) async fn call_and_repair(
    completion: &dyn CompletionClient,
    prompt: &str,
    spec: CallSpec,
) -> Result<RepairedCall, ServiceError> {
    let raw = match completion
        .complete(prompt, spec.temperature, spec.max_tokens)
        .await
    {
        Ok(raw) => raw,
        Err(ServiceError::Timeout(msg)) => {
            tracing::warn!("Completion timed out, treating as unparseable: {}", msg);
            return Ok(RepairedCall::Unparseable {
                failure: RepairFailure { reason: msg },
                raw: String::new(),
            });
        }
        Err(e) => return Err(e),
    };

    match repair(&raw) {
        Ok(value) => Ok(RepairedCall::Parsed(value)),
        Err(failure) => Ok(RepairedCall::Unparseable { failure, raw }),
    }
}
