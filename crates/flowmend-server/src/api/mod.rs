//! REST API routes, grouped by workflow.

pub mod conversation;
pub mod optimize;
pub mod process;
pub mod visualize;

use axum::routing::post;
use axum::Router;

use flowmend_core::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/process", process::router())
        .route("/api/conversation", post(conversation::conversation))
        .route("/api/optimize", post(optimize::optimize))
        .route("/api/visualize", post(visualize::visualize))
}
