//! Talking Stick Server
//!
//! Per-channel posting control for chat channels shared by people and
//! automated agents: channel modes, granted speakers, consumable question
//! slots and a time-bounded "settle" circuit breaker for agent doom loops.

pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod gate;
pub mod permissions;
pub mod settle;
pub mod stick;
pub mod util;
