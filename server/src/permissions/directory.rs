//! Identity and membership lookups.
//!
//! The directory is an external collaborator; this module only defines the
//! lookups the gate needs plus two adapters. `RedisDirectory` reads JSON
//! records mirrored into Redis by the identity service:
//!
//! - `user:{id}` → `UserRecord`
//! - `username:{name}` → user ID
//! - `channel:{id}` → `ChannelRecord`
//! - `channel_member:{channel}:{user}` → `MemberRecord`
//! - `team_member:{team}:{user}` → `MemberRecord`

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use fred::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::models::{ChannelRecord, MemberRecord, UserRecord};

/// Directory lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Directory backend error: {0}")]
    Backend(String),

    #[error("Malformed directory record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<fred::error::Error> for DirectoryError {
    fn from(err: fred::error::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Read access to identities, channels and memberships.
///
/// `Ok(None)` means the record does not exist.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError>;

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>, DirectoryError>;

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRecord>, DirectoryError>;

    async fn get_team_member(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRecord>, DirectoryError>;
}

/// Identities and memberships loaded into a [`MemoryDirectory`].
///
/// ```json
/// {
///   "users": [{"id": "u1", "username": "boss", "roles": "system_user system_admin"}],
///   "channels": [{"id": "town-square", "team_id": "t1", "members": ["u1"], "admins": []}],
///   "teams": [{"id": "t1", "members": ["u1"], "admins": ["u1"]}]
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub channels: Vec<SeedChannel>,
    #[serde(default)]
    pub teams: Vec<SeedTeam>,
}

#[derive(Debug, Deserialize)]
pub struct SeedChannel {
    pub id: String,
    pub team_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedTeam {
    pub id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
}

/// In-process directory for tests and local development.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<String, UserRecord>,
    channels: DashMap<String, ChannelRecord>,
    channel_members: DashMap<(String, String), MemberRecord>,
    team_members: DashMap<(String, String), MemberRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a JSON [`DirectorySeed`].
    pub fn from_json(raw: &str) -> Result<Self, DirectoryError> {
        let seed: DirectorySeed = serde_json::from_str(raw)?;
        Ok(Self::from_seed(seed))
    }

    /// Build a directory from a JSON [`DirectorySeed`] file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read directory seed {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Invalid directory seed {}", path.display()))
    }

    /// Build a directory holding the seeded records. Admins are members
    /// too, and need not be listed twice.
    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for user in seed.users {
            directory.add_user(user);
        }
        for channel in seed.channels {
            directory.add_channel(&channel.id, &channel.team_id);
            for user_id in &channel.members {
                directory.add_channel_member(&channel.id, user_id, false);
            }
            for user_id in &channel.admins {
                directory.add_channel_member(&channel.id, user_id, true);
            }
        }
        for team in seed.teams {
            for user_id in &team.members {
                directory.add_team_member(&team.id, user_id, false);
            }
            for user_id in &team.admins {
                directory.add_team_member(&team.id, user_id, true);
            }
        }
        directory
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn add_user(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn remove_user(&self, user_id: &str) {
        self.users.remove(user_id);
    }

    pub fn add_channel(&self, channel_id: &str, team_id: &str) {
        self.channels.insert(
            channel_id.to_string(),
            ChannelRecord {
                id: channel_id.to_string(),
                team_id: team_id.to_string(),
            },
        );
    }

    pub fn add_channel_member(&self, channel_id: &str, user_id: &str, scheme_admin: bool) {
        self.channel_members.insert(
            (channel_id.to_string(), user_id.to_string()),
            MemberRecord { scheme_admin },
        );
    }

    pub fn add_team_member(&self, team_id: &str, user_id: &str, scheme_admin: bool) {
        self.team_members.insert(
            (team_id.to_string(), user_id.to_string()),
            MemberRecord { scheme_admin },
        );
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .map(|u| u.value().clone()))
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>, DirectoryError> {
        Ok(self.channels.get(channel_id).map(|c| c.value().clone()))
    }

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRecord>, DirectoryError> {
        let key = (channel_id.to_string(), user_id.to_string());
        Ok(self.channel_members.get(&key).map(|m| *m.value()))
    }

    async fn get_team_member(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRecord>, DirectoryError> {
        let key = (team_id.to_string(), user_id.to_string());
        Ok(self.team_members.get(&key).map(|m| *m.value()))
    }
}

/// Directory backed by records mirrored into Redis.
#[derive(Clone)]
pub struct RedisDirectory {
    redis: Client,
}

impl RedisDirectory {
    pub const fn new(redis: Client) -> Self {
        Self { redis }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: String) -> Result<Option<T>, DirectoryError> {
        let raw: Option<String> = self.redis.get(key).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(DirectoryError::from)
    }
}

#[async_trait]
impl Directory for RedisDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        self.get_json(format!("user:{user_id}")).await
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let key = format!("username:{}", username.to_ascii_lowercase());
        let user_id: Option<String> = self.redis.get(key).await?;
        match user_id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>, DirectoryError> {
        self.get_json(format!("channel:{channel_id}")).await
    }

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRecord>, DirectoryError> {
        self.get_json(format!("channel_member:{channel_id}:{user_id}"))
            .await
    }

    async fn get_team_member(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Option<MemberRecord>, DirectoryError> {
        self.get_json(format!("team_member:{team_id}:{user_id}"))
            .await
    }
}
