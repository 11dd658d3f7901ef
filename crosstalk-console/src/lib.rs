//! # Crosstalk Console Transport
//!
//! A bridge that turns the local terminal into a chat transport: bus
//! traffic is rendered to stdout, and a dedicated reader thread turns
//! operator input lines into command and message events. Useful as an
//! administrative surface and as the reference implementation of the
//! bridge contract.
//!
//! ## Operator commands
//!
//! - `bridge <name> <command> [args…]` — send a command to the named bridge
//! - `manager <command> [args…]` — shorthand for `bridge manager …`
//! - `shutdown` — shorthand for `manager shutdown`
//! - `say <channel> <text…>` — speak into a channel as the operator user

pub mod config;

mod bridge;
mod worker;

pub use bridge::ConsoleBridge;
