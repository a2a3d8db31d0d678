//! Channel state storage errors.

/// Failure of the underlying key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),
}

/// Errors from loading or saving a `ChannelState`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Key-value backend error: {0}")]
    Backend(#[from] KvError),

    #[error("Malformed channel state: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode channel state: {0}")]
    Encode(#[source] serde_json::Error),
}
