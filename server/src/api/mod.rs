//! API Router and Application State
//!
//! The chat platform calls `/hooks/message` before committing a post and
//! forwards slash commands to `/commands`.

pub mod commands;
pub mod hooks;

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::{
    commands::CommandHandlers,
    config::{Config, KvBackend},
    gate::MessageGate,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Gate run on every inbound post
    pub gate: Arc<MessageGate>,
    /// `/stick` and `/settle` handlers
    pub commands: Arc<CommandHandlers>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(gate: MessageGate, commands: CommandHandlers, config: Config) -> Self {
        Self {
            gate: Arc::new(gate),
            commands: Arc::new(commands),
            config: Arc::new(config),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/hooks/message", post(hooks::message_will_be_posted))
        .route("/commands", post(commands::execute_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Backend holding channel state
    kv_backend: &'static str,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        kv_backend: match state.config.kv_backend {
            KvBackend::Redis => "redis",
            KvBackend::Memory => "memory",
        },
    })
}
