//! Outbound messaging port and its throttling decorator.

pub mod port;
pub mod throttled;
pub mod types;
