//! Message gate.
//!
//! `evaluate` is the pure decision table; `hook` wraps it with state
//! loading, bypass resolution, slot accounting and fault containment.

pub mod evaluate;
pub mod filter;
pub mod hook;

pub use evaluate::{evaluate, Decision, DenyReason, Poster};
pub use filter::PhraseFilter;
pub use hook::{HookOutcome, InboundMessage, MessageGate};

/// What the gate does with a post when evaluation itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Admit the post; a bug never blackholes a channel.
    #[default]
    FailOpen,
    /// Drop the post silently.
    FailClosed,
}
