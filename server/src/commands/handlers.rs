//! `/stick` and `/settle` subcommand handlers.

use tracing::{error, info, warn};

use super::types::{CommandContext, CommandReply};
use super::CommandHandlers;
use crate::permissions::UserRecord;
use crate::settle::{parse_settle_args, SettleStatus};
use crate::stick::ChannelMode;
use crate::util::join_mentions;

const MODE_OPTIONS: &str = "Invalid mode. Options: open, speakers, qa, locked";
const STATE_FAILURE: &str = "Failed to get channel state.";

/// Why a `@username` argument could not be resolved.
enum Lookup {
    NotFound(String),
    Failed,
}

impl Lookup {
    fn into_reply(self) -> CommandReply {
        match self {
            Self::NotFound(name) => CommandReply::ephemeral(format!("User @{name} not found.")),
            Self::Failed => CommandReply::ephemeral("Failed to look up user."),
        }
    }
}

impl CommandHandlers {
    async fn resolve_username(&self, token: &str) -> Result<UserRecord, Lookup> {
        let username = token.trim_start_matches('@');
        match self.directory.get_user_by_username(username).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(Lookup::NotFound(username.to_string())),
            Err(e) => {
                error!(username, error = %e, "Failed to look up user");
                Err(Lookup::Failed)
            }
        }
    }

    /// Display name for an identity ID, or `None` if it no longer resolves.
    async fn display_name(&self, user_id: &str) -> Option<String> {
        match self.directory.get_user(user_id).await {
            Ok(Some(user)) => Some(user.username),
            Ok(None) => {
                warn!(user_id, "User no longer exists, skipping");
                None
            }
            Err(e) => {
                warn!(user_id, error = %e, "Failed to resolve user, skipping");
                None
            }
        }
    }

    pub(super) async fn grant(&self, ctx: &CommandContext, params: &[&str]) -> CommandReply {
        let Some(token) = params.first() else {
            return CommandReply::ephemeral("Usage: `/stick grant @username`");
        };
        let user = match self.resolve_username(token).await {
            Ok(user) => user,
            Err(lookup) => return lookup.into_reply(),
        };

        if let Err(e) = self
            .store
            .update(&ctx.channel_id, |state| state.grant_speaker(&user.id))
            .await
        {
            error!(error = %e, "Failed to grant speaker");
            return CommandReply::ephemeral("Failed to grant speaking privileges.");
        }

        info!(speaker = %user.id, "Speaker granted");
        CommandReply::in_channel(format!(
            "@{} has been granted speaking privileges.",
            user.username
        ))
    }

    pub(super) async fn revoke(&self, ctx: &CommandContext, params: &[&str]) -> CommandReply {
        let Some(token) = params.first() else {
            return CommandReply::ephemeral("Usage: `/stick revoke @username`");
        };
        let user = match self.resolve_username(token).await {
            Ok(user) => user,
            Err(lookup) => return lookup.into_reply(),
        };

        // Only write when something was actually held.
        if let Err(e) = self
            .store
            .update_if(&ctx.channel_id, |state| state.revoke(&user.id).then_some(()))
            .await
        {
            error!(error = %e, "Failed to revoke speaker");
            return CommandReply::ephemeral("Failed to revoke speaking privileges.");
        }

        info!(speaker = %user.id, "Speaker revoked");
        CommandReply::in_channel(format!(
            "@{} has had their speaking privileges revoked.",
            user.username
        ))
    }

    pub(super) async fn list(&self, ctx: &CommandContext) -> CommandReply {
        let state = match self.store.load(&ctx.channel_id).await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Failed to load channel state");
                return CommandReply::ephemeral(STATE_FAILURE);
            }
        };

        let mut speakers = Vec::with_capacity(state.speakers.len());
        for user_id in &state.speakers {
            if let Some(name) = self.display_name(user_id).await {
                speakers.push(name);
            }
        }
        speakers.sort();

        let mut participants = Vec::new();
        for (user_id, slots) in state.qa_slots.iter().filter(|(_, n)| **n > 0) {
            if let Some(name) = self.display_name(user_id).await {
                participants.push((name, *slots));
            }
        }
        participants.sort();

        let mut text = format!("### Talking Stick Status\n\n**Mode:** {}\n\n", state.mode);
        if speakers.is_empty() {
            text.push_str("**Speakers:** None\n\n");
        } else {
            text.push_str(&format!("**Speakers:** {}\n\n", join_mentions(&speakers)));
        }

        if !participants.is_empty() {
            let rendered: Vec<String> = participants
                .iter()
                .map(|(name, slots)| format!("@{name} ({slots} slots)"))
                .collect();
            text.push_str(&format!("**Q&A Participants:** {}", rendered.join(", ")));
        }

        CommandReply::ephemeral(text)
    }

    pub(super) async fn mode(&self, ctx: &CommandContext, params: &[&str]) -> CommandReply {
        let Some(token) = params.first() else {
            return CommandReply::ephemeral("Usage: `/stick mode [open|speakers|qa|locked]`");
        };
        let Some(mode) = ChannelMode::parse_known(token) else {
            return CommandReply::ephemeral(MODE_OPTIONS);
        };

        // An explicit mode wins over a running whole-channel settle.
        if let Err(e) = self.settle.set_mode(&ctx.channel_id, mode.clone()).await {
            error!(error = %e, "Failed to set channel mode");
            return CommandReply::ephemeral("Failed to set channel mode.");
        }

        info!(mode = %mode, "Channel mode changed");
        CommandReply::in_channel(format!(
            "Channel mode set to **{mode}** ({}).",
            mode.description()
        ))
    }

    pub(super) async fn qa_grant(&self, ctx: &CommandContext, params: &[&str]) -> CommandReply {
        let Some(token) = params.first() else {
            return CommandReply::ephemeral("Usage: `/stick qa-grant @username [count]`");
        };
        let user = match self.resolve_username(token).await {
            Ok(user) => user,
            Err(lookup) => return lookup.into_reply(),
        };

        let slots = match params.get(1) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return CommandReply::ephemeral("Invalid slot count. Must be a positive number.")
                }
            },
        };

        if let Err(e) = self
            .store
            .update(&ctx.channel_id, |state| state.set_slots(&user.id, slots))
            .await
        {
            error!(error = %e, "Failed to grant question slots");
            return CommandReply::ephemeral("Failed to grant Q&A slots.");
        }

        info!(participant = %user.id, slots, "Question slots granted");
        let noun = if slots == 1 { "slot" } else { "slots" };
        CommandReply::in_channel(format!(
            "@{} has been granted {slots} Q&A {noun}.",
            user.username
        ))
    }

    pub(super) async fn settle(&self, ctx: &CommandContext, params: &[&str]) -> CommandReply {
        if !self.resolver.can_bypass(&ctx.user_id, &ctx.channel_id).await {
            return CommandReply::ephemeral("Only administrators can use the settle command.");
        }

        let request = parse_settle_args(params);
        let activation = match self
            .settle
            .activate(&ctx.channel_id, request.seconds, request.targets)
            .await
        {
            Ok(activation) => activation,
            Err(e) => {
                error!(error = %e, "Failed to activate settle");
                return CommandReply::ephemeral("Failed to set settle state.");
            }
        };

        let issuer = self
            .display_name(&ctx.user_id)
            .await
            .unwrap_or_else(|| "Someone".to_string());

        let text = if activation.is_whole_channel() {
            format!(
                "{issuer} has settled the channel for {} seconds",
                activation.seconds
            )
        } else {
            format!(
                "{issuer} has settled {} for {} seconds",
                join_mentions(&activation.targets),
                activation.seconds
            )
        };
        CommandReply::in_channel(text)
    }

    pub(super) async fn settle_status(&self, ctx: &CommandContext) -> CommandReply {
        let text = match self.settle.status(&ctx.channel_id).await {
            Ok(SettleStatus::Inactive) => "Channel is not currently settled.".to_string(),
            Ok(SettleStatus::All { remaining_secs }) => {
                format!("Channel settled for {remaining_secs} more seconds (all agents)")
            }
            Ok(SettleStatus::Targets {
                usernames,
                remaining_secs,
            }) => format!(
                "{} settled for {remaining_secs} more seconds",
                join_mentions(&usernames)
            ),
            Err(e) => {
                error!(error = %e, "Failed to load settle status");
                STATE_FAILURE.to_string()
            }
        };
        CommandReply::ephemeral(text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::ResponseType;
    use crate::permissions::{BypassConfig, MemoryDirectory, PermissionResolver};
    use crate::settle::SettleController;
    use crate::stick::{ChannelState, ChannelStateStore, MemoryKv, SETTLE_ALL};

    struct Fixture {
        store: ChannelStateStore,
        settle: SettleController,
        commands: CommandHandlers,
    }

    fn fixture() -> Fixture {
        let dir = MemoryDirectory::new();
        dir.add_channel("c1", "t1");
        dir.add_user(UserRecord::new("admin", "boss").with_roles("system_user system_admin"));
        dir.add_user(UserRecord::new("a", "alice"));
        dir.add_user(UserRecord::new("b", "bob"));
        dir.add_user(UserRecord::new("t", "telos").bot());
        let dir = Arc::new(dir);

        let store = ChannelStateStore::new(Arc::new(MemoryKv::new()));
        let settle = SettleController::new(store.clone());
        let commands = CommandHandlers::new(
            store.clone(),
            settle.clone(),
            PermissionResolver::new(dir.clone(), BypassConfig::default()),
            dir,
        );
        Fixture {
            store,
            settle,
            commands,
        }
    }

    fn as_user(user_id: &str) -> CommandContext {
        CommandContext {
            channel_id: "c1".into(),
            user_id: user_id.into(),
        }
    }

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let f = fixture();

        let reply = f.commands.execute(&as_user("a"), "/stick grant @bob").await;
        assert_eq!(reply.response_type, ResponseType::InChannel);
        assert_eq!(reply.text, "@bob has been granted speaking privileges.");
        assert!(f.store.load("c1").await.unwrap().is_speaker("b"));

        f.store.update("c1", |s| s.set_slots("b", 2)).await.unwrap();
        let reply = f.commands.execute(&as_user("a"), "/stick revoke bob").await;
        assert_eq!(reply.text, "@bob has had their speaking privileges revoked.");

        let state = f.store.load("c1").await.unwrap();
        assert!(!state.is_speaker("b"));
        assert_eq!(state.slots_for("b"), 0);
    }

    #[tokio::test]
    async fn test_revoke_of_non_speaker_changes_nothing() {
        let f = fixture();
        f.store.update("c1", |s| s.grant_speaker("a")).await.unwrap();
        let before = f.store.load("c1").await.unwrap();

        let reply = f.commands.execute(&as_user("a"), "/stick revoke @bob").await;
        assert_eq!(reply.response_type, ResponseType::InChannel);
        assert_eq!(f.store.load("c1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_unknown_user_and_usage_errors_are_ephemeral() {
        let f = fixture();

        let reply = f.commands.execute(&as_user("a"), "/stick grant @ghost").await;
        assert!(reply.is_ephemeral());
        assert_eq!(reply.text, "User @ghost not found.");

        let reply = f.commands.execute(&as_user("a"), "/stick grant").await;
        assert_eq!(reply.text, "Usage: `/stick grant @username`");

        let reply = f.commands.execute(&as_user("a"), "/stick qa-grant").await;
        assert_eq!(reply.text, "Usage: `/stick qa-grant @username [count]`");

        assert_eq!(f.store.load("c1").await.unwrap(), ChannelState::default());
    }

    #[tokio::test]
    async fn test_mode_validation() {
        let f = fixture();

        let reply = f.commands.execute(&as_user("a"), "/stick mode speakers").await;
        assert_eq!(
            reply.text,
            "Channel mode set to **speakers** (only granted speakers can post)."
        );
        assert_eq!(f.store.load("c1").await.unwrap().mode, ChannelMode::SpeakersOnly);

        let reply = f.commands.execute(&as_user("a"), "/stick mode chaos").await;
        assert!(reply.is_ephemeral());
        assert_eq!(reply.text, MODE_OPTIONS);
        assert_eq!(f.store.load("c1").await.unwrap().mode, ChannelMode::SpeakersOnly);

        let reply = f.commands.execute(&as_user("a"), "/stick mode").await;
        assert_eq!(reply.text, "Usage: `/stick mode [open|speakers|qa|locked]`");
    }

    #[tokio::test]
    async fn test_qa_grant_counts() {
        let f = fixture();

        let reply = f.commands.execute(&as_user("a"), "/stick qa-grant @bob").await;
        assert_eq!(reply.text, "@bob has been granted 1 Q&A slot.");
        assert_eq!(f.store.load("c1").await.unwrap().slots_for("b"), 1);

        // The count replaces, it does not add.
        let reply = f.commands.execute(&as_user("a"), "/stick qa-grant @bob 3").await;
        assert_eq!(reply.text, "@bob has been granted 3 Q&A slots.");
        assert_eq!(f.store.load("c1").await.unwrap().slots_for("b"), 3);
    }

    #[tokio::test]
    async fn test_qa_grant_rejects_non_positive_counts() {
        let f = fixture();

        for bad in ["0", "-1", "two", "1.5"] {
            let reply = f
                .commands
                .execute(&as_user("a"), &format!("/stick qa-grant @bob {bad}"))
                .await;
            assert!(reply.is_ephemeral());
            assert_eq!(reply.text, "Invalid slot count. Must be a positive number.");
        }
        assert!(f.store.load("c1").await.unwrap().qa_slots.is_empty());
    }

    #[tokio::test]
    async fn test_list_renders_names_and_skips_missing_users() {
        let f = fixture();
        f.store
            .update("c1", |s| {
                s.mode = ChannelMode::Qa;
                s.grant_speaker("b");
                s.grant_speaker("a");
                s.grant_speaker("gone");
                s.set_slots("t", 2);
                s.set_slots("b", 0);
            })
            .await
            .unwrap();

        let reply = f.commands.execute(&as_user("a"), "/stick list").await;
        assert!(reply.is_ephemeral());
        assert_eq!(
            reply.text,
            "### Talking Stick Status\n\n**Mode:** qa\n\n**Speakers:** @alice, @bob\n\n**Q&A Participants:** @telos (2 slots)"
        );
    }

    #[tokio::test]
    async fn test_list_of_fresh_channel() {
        let f = fixture();
        let reply = f.commands.execute(&as_user("a"), "/stick list").await;
        assert_eq!(
            reply.text,
            "### Talking Stick Status\n\n**Mode:** open\n\n**Speakers:** None\n\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_subcommand_shows_help() {
        let f = fixture();
        for line in ["/stick", "/stick dance", "/stick help", ""] {
            let reply = f.commands.execute(&as_user("a"), line).await;
            assert!(reply.is_ephemeral());
            assert!(reply.text.starts_with("### Talking Stick Commands"));
        }
    }

    #[tokio::test]
    async fn test_settle_requires_bypass() {
        let f = fixture();
        let reply = f.commands.execute(&as_user("a"), "/settle 30").await;
        assert!(reply.is_ephemeral());
        assert_eq!(reply.text, "Only administrators can use the settle command.");
        assert_eq!(f.store.load("c1").await.unwrap().settle_until, 0);
    }

    #[tokio::test]
    async fn test_settle_all_announces_and_locks() {
        let f = fixture();
        let reply = f.commands.execute(&as_user("admin"), "/settle 45").await;
        assert_eq!(reply.response_type, ResponseType::InChannel);
        assert_eq!(reply.text, "boss has settled the channel for 45 seconds");

        let state = f.store.load("c1").await.unwrap();
        assert_eq!(state.mode, ChannelMode::Locked);
        assert_eq!(state.settle_agents, vec![SETTLE_ALL]);
        assert_eq!(f.settle.pending_restores(), 1);
    }

    #[tokio::test]
    async fn test_settle_targets_and_clamping() {
        let f = fixture();
        let reply = f
            .commands
            .execute(&as_user("admin"), "/settle 9999 @telos @aurora")
            .await;
        assert_eq!(reply.text, "boss has settled @telos, @aurora for 300 seconds");

        let reply = f.commands.execute(&as_user("admin"), "/settle -5 abc @telos").await;
        assert_eq!(reply.text, "boss has settled @telos for 20 seconds");
    }

    #[tokio::test]
    async fn test_bot_issuer_can_settle() {
        let f = fixture();
        let reply = f.commands.execute(&as_user("t"), "/settle @bob").await;
        assert_eq!(reply.text, "telos has settled @bob for 20 seconds");
        assert_eq!(f.settle.pending_restores(), 0);
    }

    #[tokio::test]
    async fn test_settle_status_and_help() {
        let f = fixture();

        let reply = f.commands.execute(&as_user("a"), "/settle status").await;
        assert_eq!(reply.text, "Channel is not currently settled.");

        f.commands.execute(&as_user("admin"), "/settle 60").await;
        let reply = f.commands.execute(&as_user("a"), "/settle status").await;
        assert!(reply.is_ephemeral());
        assert!(reply.text.starts_with("Channel settled for "));
        assert!(reply.text.ends_with(" more seconds (all agents)"));

        f.commands.execute(&as_user("admin"), "/settle 60 @telos").await;
        let reply = f.commands.execute(&as_user("a"), "/settle status").await;
        assert!(reply.text.starts_with("@telos settled for "));

        let reply = f.commands.execute(&as_user("a"), "/settle help").await;
        assert!(reply.text.starts_with("### Settle Command"));
    }

    #[tokio::test]
    async fn test_mode_change_cancels_settle_all() {
        let f = fixture();
        f.commands.execute(&as_user("admin"), "/stick mode qa").await;
        f.commands.execute(&as_user("admin"), "/settle 60").await;
        assert_eq!(f.settle.pending_restores(), 1);

        f.commands.execute(&as_user("admin"), "/stick mode speakers").await;

        let state = f.store.load("c1").await.unwrap();
        assert_eq!(state.mode, ChannelMode::SpeakersOnly);
        assert_eq!(state.settle_until, 0);
        assert!(state.settle_agents.is_empty());
        assert_eq!(f.settle.pending_restores(), 0);
    }
}
