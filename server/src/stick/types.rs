//! Channel state types.
//!
//! One `ChannelState` record is persisted per channel. The JSON layout is
//! shared with older deployments, so field names and the map-shaped
//! `speakers` encoding must not change.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel stored in `settle_agents` for a whole-channel settle.
pub const SETTLE_ALL: &str = "all";

/// Channel-wide default posting policy.
///
/// Unknown values read from storage are preserved verbatim so that a newer
/// writer's mode survives a round trip through this version.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChannelMode {
    /// Everyone can post.
    #[default]
    Open,
    /// Only granted speakers can post.
    SpeakersOnly,
    /// Speakers plus holders of a question slot.
    Qa,
    /// Only identities that bypass restrictions can post.
    Locked,
    /// A mode this version does not understand.
    Unrecognized(String),
}

impl ChannelMode {
    /// Parses a mode token as typed in a command. Returns `None` for anything
    /// other than the four known modes.
    pub fn parse_known(token: &str) -> Option<Self> {
        match token {
            "open" => Some(Self::Open),
            "speakers" => Some(Self::SpeakersOnly),
            "qa" => Some(Self::Qa),
            "locked" => Some(Self::Locked),
            _ => None,
        }
    }

    /// Wire name of the mode.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::SpeakersOnly => "speakers",
            Self::Qa => "qa",
            Self::Locked => "locked",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Who can post under this mode, for command replies.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Open => "everyone can post",
            Self::SpeakersOnly => "only granted speakers can post",
            Self::Qa => "speakers and Q&A participants can post",
            Self::Locked => "only administrators can post",
            Self::Unrecognized(_) => "unrecognized mode, everyone can post",
        }
    }
}

impl From<String> for ChannelMode {
    fn from(value: String) -> Self {
        if value.is_empty() {
            return Self::Open;
        }
        Self::parse_known(&value).unwrap_or(Self::Unrecognized(value))
    }
}

impl From<ChannelMode> for String {
    fn from(mode: ChannelMode) -> Self {
        match mode {
            ChannelMode::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which settle override applies at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleScope<'a> {
    /// No settle, or the last one has expired.
    Inactive,
    /// Whole channel is settled (mode forced to `Locked`).
    All,
    /// Only the listed usernames are settled.
    Targets(&'a [String]),
}

/// Persisted access-control state of one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: ChannelMode,

    /// Identity IDs with unconditional posting rights.
    #[serde(default, with = "speaker_set")]
    pub speakers: BTreeSet<String>,

    /// Remaining question slots per identity ID.
    #[serde(default, deserialize_with = "null_as_default")]
    pub qa_slots: BTreeMap<String, u32>,

    /// Settle expiry in milliseconds since the epoch; `0` when inactive.
    #[serde(default, deserialize_with = "null_as_default")]
    pub settle_until: i64,

    /// `["all"]` or the usernames being settled.
    #[serde(default, deserialize_with = "null_as_default")]
    pub settle_agents: Vec<String>,

    /// Mode restored when a whole-channel settle ends.
    #[serde(default, deserialize_with = "null_as_default")]
    pub previous_mode: ChannelMode,

    /// Bumped on every settle activation; a scheduled restore only acts
    /// while the stamp it captured is still current.
    #[serde(default, deserialize_with = "null_as_default")]
    pub settle_generation: u64,
}

impl ChannelState {
    /// Whether the stored agents denote a whole-channel settle.
    pub fn is_settle_all(&self) -> bool {
        self.settle_agents.len() == 1 && self.settle_agents[0] == SETTLE_ALL
    }

    /// Settle scope at `now_ms`. Expired settles read as inactive even if
    /// nothing has cleared them yet.
    pub fn settle_scope(&self, now_ms: i64) -> SettleScope<'_> {
        if self.settle_until <= 0 || now_ms >= self.settle_until {
            SettleScope::Inactive
        } else if self.is_settle_all() {
            SettleScope::All
        } else {
            SettleScope::Targets(&self.settle_agents)
        }
    }

    /// Mode that governs posting at `now_ms`.
    ///
    /// A whole-channel settle whose restore never ran (lost timer, restart)
    /// is evaluated under the mode it displaced.
    pub fn effective_mode(&self, now_ms: i64) -> &ChannelMode {
        if self.is_settle_all() && self.settle_until > 0 && now_ms >= self.settle_until {
            &self.previous_mode
        } else {
            &self.mode
        }
    }

    /// Whether `username` is silenced by a targeted settle at `now_ms`.
    pub fn is_settle_target(&self, username: &str, now_ms: i64) -> bool {
        let username = username.trim_start_matches('@');
        match self.settle_scope(now_ms) {
            SettleScope::Targets(targets) => targets
                .iter()
                .any(|t| t.trim_start_matches('@').eq_ignore_ascii_case(username)),
            SettleScope::All | SettleScope::Inactive => false,
        }
    }

    pub fn is_speaker(&self, user_id: &str) -> bool {
        self.speakers.contains(user_id)
    }

    /// Remaining question slots; absent entries count as zero.
    pub fn slots_for(&self, user_id: &str) -> u32 {
        self.qa_slots.get(user_id).copied().unwrap_or(0)
    }

    pub fn grant_speaker(&mut self, user_id: &str) {
        self.speakers.insert(user_id.to_string());
    }

    /// Removes speaking rights and any question slots. Returns whether
    /// anything was removed.
    pub fn revoke(&mut self, user_id: &str) -> bool {
        let was_speaker = self.speakers.remove(user_id);
        let had_slots = self.qa_slots.remove(user_id).is_some();
        was_speaker || had_slots
    }

    pub fn set_slots(&mut self, user_id: &str, count: u32) {
        self.qa_slots.insert(user_id.to_string(), count);
    }

    /// Spends one question slot. The zero entry is kept once exhausted.
    pub fn consume_slot(&mut self, user_id: &str) -> bool {
        match self.qa_slots.get_mut(user_id) {
            Some(slots) if *slots > 0 => {
                *slots -= 1;
                true
            }
            _ => false,
        }
    }

    /// Ends any settle without touching `mode`.
    pub fn clear_settle(&mut self) {
        self.settle_until = 0;
        self.settle_agents.clear();
    }

    /// Ends any recorded settle, restoring the displaced mode if it was a
    /// whole-channel settle (active or stale).
    pub fn end_settle(&mut self) {
        if self.is_settle_all() && self.settle_until > 0 {
            self.mode = self.previous_mode.clone();
        }
        self.clear_settle();
    }

    /// Drops a whole-channel settle without restoring the mode and
    /// invalidates its scheduled restore. Returns whether one was recorded.
    pub fn cancel_settle_all(&mut self) -> bool {
        if !self.is_settle_all() {
            return false;
        }
        self.clear_settle();
        self.settle_generation = self.settle_generation.wrapping_add(1);
        true
    }
}

/// Treats an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `speakers` is stored as `{"<id>": true}`.
mod speaker_set {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(set.iter().map(|id| (id, true)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
        let raw = Option::<BTreeMap<String, bool>>::deserialize(deserializer)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(id, granted)| granted.then_some(id))
            .collect())
    }
}
