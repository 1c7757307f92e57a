//! Flowmend Core — transport-agnostic domain logic for the Flowmend platform.
//!
//! This crate contains the data model, the five prompting agents, the
//! session store, and the workflow orchestrator. It has **no HTTP framework
//! dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `flowmend-server`)
//! - CLI tools
//! - embedding in other applications
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServiceError` for use in axum
//!   handlers.

pub mod agents;
pub mod bpmn;
pub mod classify;
pub mod error;
pub mod extract;
pub mod language;
pub mod llm;
pub mod models;
pub mod orchestration;
pub mod repair;
pub mod search;
pub mod state;
pub mod store;

// Convenience re-exports
pub use error::ServiceError;
pub use orchestration::{ReplyStatus, WorkflowOrchestrator, WorkflowReply};
pub use state::{AppState, AppStateInner};
