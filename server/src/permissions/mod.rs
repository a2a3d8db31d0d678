//! Permission system types and utilities.
//!
//! Bypass model: bots and administrators (system, channel, team) may be
//! exempt from every channel restriction, each behind its own toggle.

pub mod directory;
pub mod models;
pub mod resolver;

pub use directory::{Directory, DirectoryError, DirectorySeed, MemoryDirectory, RedisDirectory};
pub use models::*;
pub use resolver::{BypassConfig, PermissionResolver};
