//! Settle activation, status and scheduled restore.
//!
//! A whole-channel settle forces `Locked` and schedules a restore of the
//! displaced mode. A targeted settle only records the usernames; the gate
//! stops applying it once it is stale, and nothing clears it actively.
//!
//! Restores are stamped with the channel's `settle_generation` at
//! activation. A restore whose stamp is no longer current does nothing.
//! Job bookkeeping runs after the channel lock is released, so it is
//! ordered by generation as well: each channel keeps the highest generation
//! it has seen, and a job or cancellation carrying a lower one loses.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::stick::{ChannelMode, ChannelState, ChannelStateStore, SettleScope, StoreError, SETTLE_ALL};
use crate::util::now_millis;

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleActivation {
    pub seconds: u32,
    pub targets: Vec<String>,
    pub until_ms: i64,
    pub generation: u64,
}

impl SettleActivation {
    pub fn is_whole_channel(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Settle state as reported to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleStatus {
    Inactive,
    All { remaining_secs: i64 },
    Targets { usernames: Vec<String>, remaining_secs: i64 },
}

impl SettleStatus {
    pub fn from_state(state: &ChannelState, now_ms: i64) -> Self {
        let remaining_secs = (state.settle_until - now_ms).max(0) / 1000;
        match state.settle_scope(now_ms) {
            SettleScope::Inactive => Self::Inactive,
            SettleScope::All => Self::All { remaining_secs },
            SettleScope::Targets(usernames) => Self::Targets {
                usernames: usernames.to_vec(),
                remaining_secs,
            },
        }
    }
}

/// Highest settle generation seen for a channel, and the restore job
/// scheduled for it, if one is still waiting. Entries without a job mark a
/// cancellation and are bounded by the number of channels.
struct PendingRestore {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Manages the time-bounded settle override.
#[derive(Clone)]
pub struct SettleController {
    store: ChannelStateStore,
    pending: Arc<DashMap<String, PendingRestore>>,
}

impl SettleController {
    pub fn new(store: ChannelStateStore) -> Self {
        Self {
            store,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Activate a settle for `seconds`. No targets settles the whole channel.
    #[tracing::instrument(skip(self))]
    pub async fn activate(
        &self,
        channel_id: &str,
        seconds: u32,
        targets: Vec<String>,
    ) -> Result<SettleActivation, StoreError> {
        let now = now_millis();
        let until_ms = now + i64::from(seconds) * 1000;
        let whole_channel = targets.is_empty();

        let generation = self
            .store
            .update(channel_id, |state| {
                // A new settle replaces the old one, so the mode it
                // displaced is the one worth remembering.
                state.end_settle();
                state.previous_mode = state.mode.clone();

                if whole_channel {
                    state.mode = ChannelMode::Locked;
                    state.settle_agents = vec![SETTLE_ALL.to_string()];
                } else {
                    state.settle_agents = targets.clone();
                }
                state.settle_until = until_ms;
                state.settle_generation = state.settle_generation.wrapping_add(1);
                state.settle_generation
            })
            .await?;

        if whole_channel {
            self.schedule_restore(channel_id, generation, Duration::from_secs(u64::from(seconds)));
        } else {
            self.cancel_restore(channel_id, generation);
        }

        info!(seconds, ?targets, generation, "Settle activated");

        Ok(SettleActivation {
            seconds,
            targets,
            until_ms,
            generation,
        })
    }

    /// Current settle state of a channel.
    pub async fn status(&self, channel_id: &str) -> Result<SettleStatus, StoreError> {
        let state = self.store.load(channel_id).await?;
        Ok(SettleStatus::from_state(&state, now_millis()))
    }

    /// Restore the displaced mode if `generation` is still the current
    /// settle. Returns whether anything changed.
    #[tracing::instrument(skip(self))]
    pub async fn expire(&self, channel_id: &str, generation: u64) -> Result<bool, StoreError> {
        restore_if_current(&self.store, channel_id, generation).await
    }

    /// Set the channel mode, ending a running whole-channel settle.
    /// Returns whether a settle was cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn set_mode(&self, channel_id: &str, mode: ChannelMode) -> Result<bool, StoreError> {
        let cancelled = self
            .store
            .update(channel_id, move |state| {
                let cancelled = state.cancel_settle_all();
                state.mode = mode;
                cancelled.then_some(state.settle_generation)
            })
            .await?;

        if let Some(generation) = cancelled {
            self.cancel_restore(channel_id, generation);
            info!(generation, "Active settle cancelled by mode change");
        }
        Ok(cancelled.is_some())
    }

    /// Abort restore jobs for settles older than `generation`.
    ///
    /// A job for a newer settle is left alone, and a job for an older
    /// settle scheduled after this call is dropped on arrival.
    pub fn cancel_restore(&self, channel_id: &str, generation: u64) {
        match self.pending.entry(channel_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().generation >= generation {
                    return;
                }
                let superseded = entry.insert(PendingRestore {
                    generation,
                    handle: None,
                });
                if let Some(handle) = superseded.handle {
                    handle.abort();
                    debug!(channel_id, generation = superseded.generation, "Pending restore cancelled");
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingRestore {
                    generation,
                    handle: None,
                });
            }
        }
    }

    /// Number of restore jobs not yet fired.
    pub fn pending_restores(&self) -> usize {
        self.pending.iter().filter(|p| p.handle.is_some()).count()
    }

    /// Generation of the restore job waiting for a channel.
    pub fn scheduled_generation(&self, channel_id: &str) -> Option<u64> {
        self.pending
            .get(channel_id)
            .filter(|p| p.handle.is_some())
            .map(|p| p.generation)
    }

    fn schedule_restore(&self, channel_id: &str, generation: u64, delay: Duration) {
        let store = self.store.clone();
        let pending = Arc::clone(&self.pending);
        let channel = channel_id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match restore_if_current(&store, &channel, generation).await {
                Ok(true) => info!(channel_id = %channel, generation, "Settle expired, previous mode restored"),
                Ok(false) => debug!(channel_id = %channel, generation, "Settle superseded, restore skipped"),
                Err(e) => error!(channel_id = %channel, generation, error = %e, "Failed to restore mode after settle"),
            }

            pending.remove_if(&channel, |_, p| p.generation == generation);
        });

        match self.pending.entry(channel_id.to_string()) {
            Entry::Occupied(entry) if entry.get().generation > generation => {
                handle.abort();
                debug!(channel_id, generation, "Restore superseded before scheduling");
            }
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(PendingRestore {
                    generation,
                    handle: Some(handle),
                });
                if let Some(previous) = previous.handle {
                    previous.abort();
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingRestore {
                    generation,
                    handle: Some(handle),
                });
            }
        }
    }
}

async fn restore_if_current(
    store: &ChannelStateStore,
    channel_id: &str,
    generation: u64,
) -> Result<bool, StoreError> {
    let restored = store
        .update_if(channel_id, |state| {
            let current = state.settle_generation == generation
                && state.settle_until > 0
                && state.is_settle_all();
            if !current {
                return None;
            }
            state.mode = state.previous_mode.clone();
            state.clear_settle();
            Some(())
        })
        .await?;
    Ok(restored.is_some())
}
