//! Per-channel access-control state.
//!
//! - `types`: the persisted `ChannelState` record and channel modes
//! - `kv`: byte-oriented key-value backends (Redis, in-memory)
//! - `store`: load/save with default repair and per-channel serialization

pub mod error;
pub mod kv;
pub mod store;
pub mod types;

pub use error::{KvError, StoreError};
pub use kv::{KvStore, MemoryKv, RedisKv};
pub use store::{channel_key, ChannelStateStore};
pub use types::{ChannelMode, ChannelState, SettleScope, SETTLE_ALL};
