//! Command invocation and reply types.

use serde::{Deserialize, Serialize};

/// Who issued a command, and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandContext {
    pub channel_id: String,
    pub user_id: String,
}

/// Visibility of a command reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Only the caller sees it.
    Ephemeral,
    /// Posted to the channel.
    InChannel,
}

/// Human-readable reply to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub response_type: ResponseType,
    pub text: String,
}

impl CommandReply {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text: text.into(),
        }
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::InChannel,
            text: text.into(),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.response_type == ResponseType::Ephemeral
    }
}
