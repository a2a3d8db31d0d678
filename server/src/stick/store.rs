//! Channel state persistence.
//!
//! All state for one channel lives under a single key, so single-key
//! read-modify-write is the unit of consistency. Mutations made through
//! this store are serialized per channel with an async mutex; the backend
//! itself offers no locking.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::StoreError;
use super::kv::KvStore;
use super::types::ChannelState;

/// Storage key for a channel's state.
pub fn channel_key(channel_id: &str) -> String {
    format!("channel_{channel_id}")
}

/// Loads and saves `ChannelState` records.
#[derive(Clone)]
pub struct ChannelStateStore {
    kv: Arc<dyn KvStore>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ChannelStateStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Get or create the mutation lock for a channel.
    fn channel_lock(&self, channel_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load a channel's state. A missing key yields the default state.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, channel_id: &str) -> Result<ChannelState, StoreError> {
        let Some(bytes) = self.kv.get(&channel_key(channel_id)).await? else {
            debug!("No stored state, using defaults");
            return Ok(ChannelState::default());
        };

        serde_json::from_slice(&bytes).map_err(StoreError::Decode)
    }

    /// Overwrite a channel's state.
    #[tracing::instrument(skip(self, state))]
    pub async fn save(&self, channel_id: &str, state: &ChannelState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state).map_err(StoreError::Encode)?;
        self.kv.set(&channel_key(channel_id), bytes).await?;
        Ok(())
    }

    /// Load, mutate and save a channel's state while holding its lock.
    pub async fn update<T>(
        &self,
        channel_id: &str,
        mutate: impl FnOnce(&mut ChannelState) -> T,
    ) -> Result<T, StoreError> {
        self.locked(channel_id, |state| (mutate(state), true)).await
    }

    /// Like [`update`](Self::update), but only saves when `mutate` returns
    /// `Some`.
    pub async fn update_if<T>(
        &self,
        channel_id: &str,
        mutate: impl FnOnce(&mut ChannelState) -> Option<T>,
    ) -> Result<Option<T>, StoreError> {
        self.locked(channel_id, |state| {
            let out = mutate(state);
            let save = out.is_some();
            (out, save)
        })
        .await
    }

    /// Number of channel locks currently tracked.
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    async fn locked<T>(
        &self,
        channel_id: &str,
        mutate: impl FnOnce(&mut ChannelState) -> (T, bool),
    ) -> Result<T, StoreError> {
        let lock = self.channel_lock(channel_id);
        let result = {
            let _guard = lock.lock().await;
            self.mutate_and_save(channel_id, mutate).await
        };

        // Drop our handle first so an idle lock is held only by the map.
        drop(lock);
        self.locks
            .remove_if(channel_id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn mutate_and_save<T>(
        &self,
        channel_id: &str,
        mutate: impl FnOnce(&mut ChannelState) -> (T, bool),
    ) -> Result<T, StoreError> {
        let mut state = self.load(channel_id).await?;
        let (out, save) = mutate(&mut state);
        if save {
            self.save(channel_id, &state).await?;
        }
        Ok(out)
    }
}
