//! Pure posting decision.
//!
//! Decision order:
//! 1. Bypass always allows
//! 2. A targeted settle silently denies the listed usernames
//! 3. The channel's effective mode decides
//! 4. Unrecognized modes allow

use crate::stick::{ChannelMode, ChannelState};

/// Who is posting.
#[derive(Debug, Clone, Copy)]
pub struct Poster<'a> {
    pub id: &'a str,
    /// Empty when the directory could not resolve the poster.
    pub username: &'a str,
}

/// Why a post was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotSpeaker,
    NoQuestionSlot,
    Locked,
    Settled,
}

impl DenyReason {
    /// Text shown to the poster, if any. Settled posts vanish silently.
    pub const fn message(self) -> Option<&'static str> {
        match self {
            Self::NotSpeaker => Some(
                "This channel is in speakers-only mode. You do not have speaking privileges.",
            ),
            Self::NoQuestionSlot => {
                Some("This channel is in Q&A mode. You do not have a question slot.")
            }
            Self::Locked => Some("This channel is locked. Only administrators can post."),
            Self::Settled => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSpeaker => "not_speaker",
            Self::NoQuestionSlot => "no_question_slot",
            Self::Locked => "locked",
            Self::Settled => "settled",
        }
    }
}

/// Outcome of evaluating one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
    /// Allowed by spending one question slot; the caller persists the
    /// decrement before admitting the post.
    AllowAndConsumeSlot,
}

/// Decide whether `poster` may post in a channel with `state` at `now_ms`.
pub fn evaluate(state: &ChannelState, poster: &Poster<'_>, bypass: bool, now_ms: i64) -> Decision {
    if bypass {
        return Decision::Allow;
    }

    if !poster.username.is_empty() && state.is_settle_target(poster.username, now_ms) {
        return Decision::Deny(DenyReason::Settled);
    }

    match state.effective_mode(now_ms) {
        ChannelMode::Open => Decision::Allow,
        ChannelMode::SpeakersOnly => {
            if state.is_speaker(poster.id) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::NotSpeaker)
            }
        }
        ChannelMode::Qa => {
            if state.is_speaker(poster.id) {
                Decision::Allow
            } else if state.slots_for(poster.id) > 0 {
                Decision::AllowAndConsumeSlot
            } else {
                Decision::Deny(DenyReason::NoQuestionSlot)
            }
        }
        ChannelMode::Locked => Decision::Deny(DenyReason::Locked),
        ChannelMode::Unrecognized(_) => Decision::Allow,
    }
}
