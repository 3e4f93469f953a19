//! Core of the drill bot: callback routing, per-user sessions and the
//! multi-step debt flows.
//!
//! This crate is framework-agnostic. Telegram lives behind ports (traits)
//! implemented in the adapter crate.

pub mod codec;
pub mod config;
pub mod consumer;
pub mod deadline;
pub mod domain;
pub mod errors;
pub mod events;
pub mod flows;
pub mod keyboard;
pub mod listing;
pub mod logging;
pub mod messages;
pub mod messaging;
pub mod ports;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
