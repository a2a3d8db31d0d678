//! Settle: a temporary circuit breaker for agent feedback loops.

pub mod controller;
pub mod parse;

pub use controller::{SettleActivation, SettleController, SettleStatus};
pub use parse::{parse_settle_args, SettleRequest, DEFAULT_SETTLE_SECS, MAX_SETTLE_SECS};
