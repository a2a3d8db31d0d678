//! Pre-commit message hook.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::AppState;
use crate::gate::{HookOutcome, InboundMessage};

/// Hook verdict returned to the platform.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookResponse {
    /// Whether the post may be committed.
    pub admit: bool,
    /// Notice shown only to the poster when the post is dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

impl From<HookOutcome> for HookResponse {
    fn from(outcome: HookOutcome) -> Self {
        match outcome {
            HookOutcome::Admit => Self {
                admit: true,
                rejection: None,
            },
            HookOutcome::Reject { reason } => Self {
                admit: false,
                rejection: reason,
            },
        }
    }
}

/// Evaluate a post before it is committed.
///
/// POST /hooks/message
#[instrument(skip_all)]
pub async fn message_will_be_posted(
    State(state): State<AppState>,
    Json(post): Json<InboundMessage>,
) -> Json<HookResponse> {
    Json(state.gate.message_will_be_posted(&post).await.into())
}
