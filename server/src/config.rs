//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{bail, Result};
use std::env;

use crate::gate::FaultPolicy;
use crate::permissions::BypassConfig;

/// Backing store for channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvBackend {
    /// Redis (production).
    Redis,
    /// In-process map (local development, tests).
    Memory,
}

impl KvBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => bail!("KV_BACKEND must be 'redis' or 'memory', got '{other}'"),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Redis connection URL
    pub redis_url: String,

    /// Which key-value backend holds channel state
    pub kv_backend: KvBackend,

    /// Namespace prepended to every Redis key (e.g., "stick")
    pub kv_namespace: String,

    /// JSON file of identities for the in-memory directory
    pub memory_directory_file: Option<String>,

    /// Which roles may bypass channel restrictions
    pub bypass: BypassConfig,

    /// Phrases that cause a message to be dropped silently
    pub suppression_phrases: Vec<String>,

    /// What the message gate does when evaluation itself fails
    pub fault_policy: FaultPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let kv_backend = match env::var("KV_BACKEND") {
            Ok(v) => KvBackend::parse(&v)?,
            Err(_) => KvBackend::Redis,
        };

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
            kv_backend,
            kv_namespace: env::var("KV_NAMESPACE").unwrap_or_else(|_| "stick".into()),
            memory_directory_file: env::var("MEMORY_DIRECTORY_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            bypass: BypassConfig {
                allow_system_admins: env_flag("STICK_ALLOW_SYSTEM_ADMINS", true),
                allow_team_admins: env_flag("STICK_ALLOW_TEAM_ADMINS", true),
                allow_channel_admins: env_flag("STICK_ALLOW_CHANNEL_ADMINS", true),
                allow_bots: env_flag("STICK_ALLOW_BOTS", true),
            },
            suppression_phrases: env::var("STICK_SUPPRESSION_PHRASES")
                .map(|v| parse_phrases(&v))
                .unwrap_or_default(),
            fault_policy: if env_flag("GATE_FAIL_OPEN", true) {
                FaultPolicy::FailOpen
            } else {
                FaultPolicy::FailClosed
            },
        })
    }

    /// Create a default configuration for testing.
    ///
    /// Uses the in-memory backend so no Redis instance is required.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            redis_url: "redis://localhost:6380".into(),
            kv_backend: KvBackend::Memory,
            kv_namespace: "test:stick".into(),
            memory_directory_file: None,
            bypass: BypassConfig::default(),
            suppression_phrases: Vec::new(),
            fault_policy: FaultPolicy::FailOpen,
        }
    }
}

/// Reads a boolean flag, falling back to `default` when unset or unparseable.
fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Splits a phrase list on newlines or `|`, dropping blanks.
fn parse_phrases(raw: &str) -> Vec<String> {
    raw.split(['\n', '|'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
