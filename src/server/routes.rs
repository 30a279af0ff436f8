//! Route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers;
use super::state::AppState;
use crate::providers::{ChatCompletionRequest, ResponsesRequest};

/// OpenAI compatible routes
pub fn openai_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/chat/completions", post(handlers::chat::<ChatCompletionRequest>))
        .route("/chat/completions", post(handlers::chat::<ChatCompletionRequest>))
        .route("/v1/responses", post(handlers::chat::<ResponsesRequest>))
        .route("/responses", post(handlers::chat::<ResponsesRequest>))
        .route("/v1/embeddings", post(handlers::openai_embeddings))
}

/// Gemini routes; the `{model}:generateContent` segment is split by the handler
pub fn gemini_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/models/:target", post(handlers::gemini_generate_content))
        .route("/v1alpha/models/:target", post(handlers::gemini_generate_content))
        .route("/v1beta/models/:target", post(handlers::gemini_generate_content))
}

/// Runtime control of the emulator
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/_emulator/stats", get(handlers::get_stats))
        .route("/_emulator/stats/reset", post(handlers::reset_stats))
        .route("/_emulator/scenario", put(handlers::set_scenario))
        .route("/_emulator/scenario/reset", post(handlers::reset_scenario))
}

pub fn health_routes(metrics_path: &str) -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(metrics_path, get(handlers::metrics))
}
