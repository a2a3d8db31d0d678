//! Bypass resolution.
//!
//! Decides whether an identity is exempt from every channel restriction.
//! Resolution order:
//! 1. Bots (when `allow_bots`)
//! 2. System administrators (when `allow_system_admins`)
//! 3. Channel administrators (when `allow_channel_admins`)
//! 4. Administrators of the channel's team (when `allow_team_admins`)
//!
//! Lookup failures resolve to "no bypass" and are logged, never returned.

use std::fmt::Display;
use std::sync::Arc;

use tracing::warn;

use super::directory::{Directory, DirectoryError};
use super::models::UserRecord;

/// Which roles may bypass channel restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BypassConfig {
    pub allow_system_admins: bool,
    pub allow_team_admins: bool,
    pub allow_channel_admins: bool,
    pub allow_bots: bool,
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            allow_system_admins: true,
            allow_team_admins: true,
            allow_channel_admins: true,
            allow_bots: true,
        }
    }
}

/// Answers "can this identity bypass channel restrictions?".
#[derive(Clone)]
pub struct PermissionResolver {
    directory: Arc<dyn Directory>,
    config: BypassConfig,
}

impl PermissionResolver {
    pub fn new(directory: Arc<dyn Directory>, config: BypassConfig) -> Self {
        Self { directory, config }
    }

    /// Resolve bypass for a user ID.
    #[tracing::instrument(skip(self))]
    pub async fn can_bypass(&self, user_id: &str, channel_id: &str) -> bool {
        let lookup = self.directory.get_user(user_id).await;
        match found(lookup, "user", user_id) {
            Some(user) => self.can_bypass_user(&user, channel_id).await,
            None => false,
        }
    }

    /// Resolve bypass for an already fetched identity.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn can_bypass_user(&self, user: &UserRecord, channel_id: &str) -> bool {
        let config = &self.config;

        if config.allow_bots && user.is_bot {
            return true;
        }

        if config.allow_system_admins && user.is_system_admin() {
            return true;
        }

        if !config.allow_channel_admins && !config.allow_team_admins {
            return false;
        }

        let lookup = self.directory.get_channel_member(channel_id, &user.id).await;
        let Some(member) = found(lookup, "channel member", channel_id) else {
            return false;
        };

        if config.allow_channel_admins && member.scheme_admin {
            return true;
        }

        if !config.allow_team_admins {
            return false;
        }

        let lookup = self.directory.get_channel(channel_id).await;
        let Some(channel) = found(lookup, "channel", channel_id) else {
            return false;
        };

        let lookup = self.directory.get_team_member(&channel.team_id, &user.id).await;
        found(lookup, "team member", &channel.team_id).is_some_and(|m| m.scheme_admin)
    }
}

/// Flattens a lookup to `Option`, logging both errors and missing records.
fn found<T>(
    lookup: Result<Option<T>, DirectoryError>,
    what: &str,
    key: impl Display,
) -> Option<T> {
    match lookup {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            warn!(%key, "Bypass check: {what} not found");
            None
        }
        Err(e) => {
            warn!(%key, error = %e, "Bypass check: failed to get {what}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::permissions::directory::MemoryDirectory;
    use crate::permissions::models::{ChannelRecord, MemberRecord};

    fn directory() -> Arc<MemoryDirectory> {
        let dir = MemoryDirectory::new();
        dir.add_channel("c1", "t1");
        dir.add_user(UserRecord::new("bot", "telos").bot());
        dir.add_user(UserRecord::new("root", "root").with_roles("system_user system_admin"));
        dir.add_user(UserRecord::new("chan", "chanadmin"));
        dir.add_user(UserRecord::new("team", "teamadmin"));
        dir.add_user(UserRecord::new("plain", "plain"));
        dir.add_channel_member("c1", "chan", true);
        dir.add_channel_member("c1", "team", false);
        dir.add_channel_member("c1", "plain", false);
        dir.add_team_member("t1", "team", true);
        dir.add_team_member("t1", "plain", false);
        Arc::new(dir)
    }

    fn resolver(config: BypassConfig) -> PermissionResolver {
        PermissionResolver::new(directory(), config)
    }

    #[tokio::test]
    async fn test_all_roles_bypass_by_default() {
        let r = resolver(BypassConfig::default());

        assert!(r.can_bypass("bot", "c1").await);
        assert!(r.can_bypass("root", "c1").await);
        assert!(r.can_bypass("chan", "c1").await);
        assert!(r.can_bypass("team", "c1").await);
        assert!(!r.can_bypass("plain", "c1").await);
    }

    #[tokio::test]
    async fn test_toggles_disable_each_role() {
        let r = resolver(BypassConfig {
            allow_system_admins: false,
            allow_team_admins: false,
            allow_channel_admins: false,
            allow_bots: false,
        });

        for user in ["bot", "root", "chan", "team"] {
            assert!(!r.can_bypass(user, "c1").await, "{user} should not bypass");
        }
    }

    #[tokio::test]
    async fn test_team_admin_only_toggle() {
        let r = resolver(BypassConfig {
            allow_channel_admins: false,
            ..BypassConfig::default()
        });

        assert!(!r.can_bypass("chan", "c1").await);
        assert!(r.can_bypass("team", "c1").await);
    }

    #[tokio::test]
    async fn test_unknown_user_or_non_member_fails_closed() {
        let r = resolver(BypassConfig::default());

        assert!(!r.can_bypass("ghost", "c1").await);
        // Team admin who is not a member of this channel.
        assert!(!r.can_bypass("team", "other-channel").await);
    }

    struct BrokenDirectory;

    #[async_trait]
    impl Directory for BrokenDirectory {
        async fn get_user(&self, _: &str) -> Result<Option<UserRecord>, DirectoryError> {
            Ok(Some(UserRecord::new("u1", "u1")))
        }
        async fn get_user_by_username(&self, _: &str) -> Result<Option<UserRecord>, DirectoryError> {
            Err(DirectoryError::Backend("down".into()))
        }
        async fn get_channel(&self, _: &str) -> Result<Option<ChannelRecord>, DirectoryError> {
            Err(DirectoryError::Backend("down".into()))
        }
        async fn get_channel_member(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<MemberRecord>, DirectoryError> {
            Err(DirectoryError::Backend("down".into()))
        }
        async fn get_team_member(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<MemberRecord>, DirectoryError> {
            Err(DirectoryError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn test_backend_failure_fails_closed() {
        let r = PermissionResolver::new(Arc::new(BrokenDirectory), BypassConfig::default());
        assert!(!r.can_bypass("u1", "c1").await);
    }
}
