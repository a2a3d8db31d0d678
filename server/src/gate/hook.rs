//! Message delivery hook.
//!
//! Runs before a post is committed and returns either the post (admit) or a
//! suppression with an optional reason shown only to the poster. Faults
//! inside evaluation never reach the transport: they are logged and
//! resolved by the configured [`FaultPolicy`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::evaluate::{evaluate, Decision, DenyReason, Poster};
use super::filter::PhraseFilter;
use super::FaultPolicy;
use crate::permissions::{Directory, PermissionResolver, UserRecord};
use crate::stick::{ChannelStateStore, StoreError};
use crate::util::now_millis;

/// A post about to be committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub message: String,
    /// Post type; system posts start with `system_`.
    #[serde(default)]
    pub post_type: String,
}

impl InboundMessage {
    pub fn is_system_message(&self) -> bool {
        self.post_type.starts_with("system_")
    }
}

/// What the transport should do with the post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Admit,
    /// Drop the post. `reason` is shown to the poster when present.
    Reject { reason: Option<String> },
}

impl HookOutcome {
    const fn silent_reject() -> Self {
        Self::Reject { reason: None }
    }

    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Gate applied to every inbound post.
pub struct MessageGate {
    store: ChannelStateStore,
    resolver: PermissionResolver,
    directory: Arc<dyn Directory>,
    filter: PhraseFilter,
    fault_policy: FaultPolicy,
}

impl MessageGate {
    pub fn new(
        store: ChannelStateStore,
        resolver: PermissionResolver,
        directory: Arc<dyn Directory>,
        filter: PhraseFilter,
        fault_policy: FaultPolicy,
    ) -> Self {
        Self {
            store,
            resolver,
            directory,
            filter,
            fault_policy,
        }
    }

    /// Decide the fate of one post.
    #[tracing::instrument(skip(self, post), fields(channel_id = %post.channel_id, user_id = %post.user_id))]
    pub async fn message_will_be_posted(&self, post: &InboundMessage) -> HookOutcome {
        if post.is_system_message() {
            return HookOutcome::Admit;
        }

        if let Some(phrase) = self.filter.matched_phrase(&post.message) {
            warn!(phrase, "Suppressing message containing configured phrase");
            return HookOutcome::silent_reject();
        }

        match AssertUnwindSafe(self.evaluate_post(post)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, policy = ?self.fault_policy, "Failed to evaluate post");
                self.fault_outcome()
            }
            Err(panic) => {
                error!(
                    panic = %panic_message(panic.as_ref()),
                    policy = ?self.fault_policy,
                    "Panic while evaluating post"
                );
                self.fault_outcome()
            }
        }
    }

    const fn fault_outcome(&self) -> HookOutcome {
        match self.fault_policy {
            FaultPolicy::FailOpen => HookOutcome::Admit,
            FaultPolicy::FailClosed => HookOutcome::silent_reject(),
        }
    }

    async fn evaluate_post(&self, post: &InboundMessage) -> Result<HookOutcome, StoreError> {
        let state = self.store.load(&post.channel_id).await?;
        let now = now_millis();

        let poster_record = self.lookup_poster(&post.user_id).await;
        let bypass = match &poster_record {
            Some(user) => self.resolver.can_bypass_user(user, &post.channel_id).await,
            None => false,
        };
        let poster = Poster {
            id: &post.user_id,
            username: poster_record.as_ref().map_or("", |u| u.username.as_str()),
        };

        let outcome = match evaluate(&state, &poster, bypass, now) {
            Decision::Allow => HookOutcome::Admit,
            Decision::AllowAndConsumeSlot => self.consume_slot(post).await,
            Decision::Deny(reason) => reject(reason),
        };
        Ok(outcome)
    }

    async fn lookup_poster(&self, user_id: &str) -> Option<UserRecord> {
        match self.directory.get_user(user_id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                warn!(user_id, "Poster not found in directory");
                None
            }
            Err(e) => {
                warn!(user_id, error = %e, "Failed to look up poster");
                None
            }
        }
    }

    /// Spend one question slot under the channel lock. A slot already spent
    /// by a concurrent post denies this one; a failed save still admits.
    async fn consume_slot(&self, post: &InboundMessage) -> HookOutcome {
        let spent = self
            .store
            .update_if(&post.channel_id, |state| {
                state.consume_slot(&post.user_id).then(|| state.slots_for(&post.user_id))
            })
            .await;

        match spent {
            Ok(Some(remaining)) => {
                debug!(remaining, "Question slot consumed");
                HookOutcome::Admit
            }
            Ok(None) => reject(DenyReason::NoQuestionSlot),
            Err(e) => {
                error!(error = %e, "Failed to update Q&A slots");
                HookOutcome::Admit
            }
        }
    }
}

fn reject(reason: DenyReason) -> HookOutcome {
    debug!(reason = reason.as_str(), "Post denied");
    HookOutcome::Reject {
        reason: reason.message().map(str::to_string),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
