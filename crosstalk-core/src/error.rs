//! Error taxonomy for the bus.
//!
//! Three tiers with different blast radii:
//!
//! - [`UserError`] — malformed input from an external actor. Answered with a
//!   `message` event back to the source; never interrupts the loop.
//! - [`StateError`] — an invariant violation the core can recover from.
//!   Returned to callers of the public API; the same conditions arriving
//!   through the event loop are downgraded to user errors.
//! - [`BusError`] — loop-level failures: an unroutable target, or a fatal
//!   condition reported through an `exception` event that terminates the
//!   dispatcher.

use thiserror::Error;

use crate::event::EntityId;

/// Malformed input from an external actor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("unmatched quote")]
    UnmatchedQuote,

    #[error("empty command")]
    EmptyCommand,

    #[error("'{0}' no such bridge")]
    NoSuchBridge(String),

    #[error("'{0}' unknown command")]
    UnknownCommand(String),
}

/// A recoverable invariant violation raised at the public API boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("bridge '{0}' is already attached")]
    AlreadyAttached(String),

    #[error("bridge '{0}' is not attached")]
    NotAttached(String),

    #[error("'{0}' is a reserved bridge name")]
    Reserved(String),

    #[error("bridge is already registered")]
    AlreadyRegistered,

    #[error("bridge is not registered")]
    NotRegistered,

    #[error("no channel named '{0}'")]
    UnknownChannel(String),

    #[error("bridge {0} already participates in '{1}'")]
    AlreadyJoined(EntityId, String),

    #[error("bridge {0} does not participate in '{1}'")]
    NotJoined(EntityId, String),

    #[error("user {0} is already present in '{1}'")]
    UserPresent(EntityId, String),

    #[error("user {0} is not present in '{1}'")]
    UserAbsent(EntityId, String),
}

/// A failure that escapes the event loop.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("invalid target {0}")]
    InvalidTarget(EntityId),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    State(#[from] StateError),
}
