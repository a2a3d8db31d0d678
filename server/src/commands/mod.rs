//! Slash command surface.
//!
//! `/stick` manages speakers, question slots and channel modes; `/settle`
//! drives the circuit breaker. Handlers never fail: every outcome, including
//! collaborator failures, becomes a [`CommandReply`].

mod handlers;
pub mod help;
pub mod types;

use std::sync::Arc;

pub use types::{CommandContext, CommandReply, ResponseType};

use crate::permissions::{Directory, PermissionResolver};
use crate::settle::SettleController;
use crate::stick::ChannelStateStore;

/// Executes `/stick` and `/settle` command lines.
#[derive(Clone)]
pub struct CommandHandlers {
    store: ChannelStateStore,
    settle: SettleController,
    resolver: PermissionResolver,
    directory: Arc<dyn Directory>,
}

impl CommandHandlers {
    pub fn new(
        store: ChannelStateStore,
        settle: SettleController,
        resolver: PermissionResolver,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            store,
            settle,
            resolver,
            directory,
        }
    }

    /// Execute a raw command line such as `/stick grant @telos`.
    #[tracing::instrument(skip(self), fields(channel_id = %ctx.channel_id, user_id = %ctx.user_id))]
    pub async fn execute(&self, ctx: &CommandContext, command: &str) -> CommandReply {
        let split: Vec<&str> = command.split_whitespace().collect();
        let Some(first) = split.first() else {
            return help::stick_help();
        };

        if first.trim_start_matches('/') == "settle" {
            return match split.get(1).copied() {
                Some("status") => self.settle_status(ctx).await,
                Some("help") => help::settle_help(),
                _ => self.settle(ctx, &split[1..]).await,
            };
        }

        let Some(sub) = split.get(1).copied() else {
            return help::stick_help();
        };
        let params = &split[2..];

        match sub {
            "grant" => self.grant(ctx, params).await,
            "revoke" => self.revoke(ctx, params).await,
            "list" => self.list(ctx).await,
            "mode" => self.mode(ctx, params).await,
            "qa-grant" => self.qa_grant(ctx, params).await,
            _ => help::stick_help(),
        }
    }
}
