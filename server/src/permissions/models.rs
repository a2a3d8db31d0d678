//! Identity and membership records supplied by the directory service.

use serde::{Deserialize, Serialize};

/// Role token that marks a platform-wide administrator.
pub const SYSTEM_ADMIN_ROLE: &str = "system_admin";

/// An identity known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    /// Space-separated role tokens (e.g. `"system_user system_admin"`).
    #[serde(default)]
    pub roles: String,
    /// Automated participant.
    #[serde(default)]
    pub is_bot: bool,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            roles: String::new(),
            is_bot: false,
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: impl Into<String>) -> Self {
        self.roles = roles.into();
        self
    }

    #[must_use]
    pub const fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    /// Whether the role list contains `role` as a whole token.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.split_whitespace().any(|r| r == role)
    }

    pub fn is_system_admin(&self) -> bool {
        self.has_role(SYSTEM_ADMIN_ROLE)
    }
}

/// A channel and the team it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub team_id: String,
}

/// Membership of an identity in a channel or team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Administrator of that channel or team.
    #[serde(default)]
    pub scheme_admin: bool,
}
