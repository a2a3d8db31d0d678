//! Slash Commands API
//!
//! Receives `/stick` and `/settle` invocations forwarded by the platform.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use super::AppState;
use crate::commands::{CommandContext, CommandReply};

/// A forwarded slash command.
#[derive(Debug, Deserialize)]
pub struct CommandInvocation {
    pub channel_id: String,
    pub user_id: String,
    /// Full command line, e.g. `/stick grant @telos`.
    pub command: String,
}

/// Execute a slash command.
///
/// POST /commands
#[instrument(skip_all)]
pub async fn execute_command(
    State(state): State<AppState>,
    Json(invocation): Json<CommandInvocation>,
) -> Result<Json<CommandReply>, (StatusCode, String)> {
    if invocation.channel_id.is_empty() || invocation.user_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "channel_id and user_id are required".to_string(),
        ));
    }

    let ctx = CommandContext {
        channel_id: invocation.channel_id,
        user_id: invocation.user_id,
    };
    Ok(Json(state.commands.execute(&ctx, &invocation.command).await))
}
