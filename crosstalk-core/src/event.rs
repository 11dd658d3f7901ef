//! # Identity Tokens and Events
//!
//! Every addressable entity on the bus — the manager, each attached bridge,
//! each channel, each user — is named by an [`EntityId`]: an opaque token
//! that is unique and stable for the entity's lifetime. Tokens are the only
//! way one component refers to another on the wire; handles are never passed
//! around.
//!
//! An [`Event`] is the sole unit of inter-component communication. Its
//! payload is a tagged variant per well-known event name, so components
//! match on structure instead of parsing a dynamic argument list.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ids below this value are reserved for the broadcast target constants.
const FIRST_DYNAMIC_ID: u64 = 8;

static NEXT_ID: AtomicU64 = AtomicU64::new(FIRST_DYNAMIC_ID);

/// An opaque, process-unique identity token.
///
/// Tokens are allocated from a single monotonic counter, so they never
/// collide across entity kinds: a channel id can be told apart from a bridge
/// id only by asking the component that owns the entity, which is exactly
/// the property the routing table relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocates a fresh token. Safe to call from any thread.
    pub fn allocate() -> Self {
        EntityId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) const fn from_raw(raw: u64) -> Self {
        EntityId(raw)
    }

    pub(crate) const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this token is one of the reserved broadcast targets.
    pub fn is_broadcast(self) -> bool {
        self.0 < FIRST_DYNAMIC_ID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::target::name(*self) {
            Some(name) => f.write_str(name),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// A user's id and display name as carried in a `channel_add` snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub user_id: EntityId,
    pub name: String,
}

/// The payload of a bus event, tagged by wire name.
///
/// The `channel_join`/`channel_leave`/`user_join`/`user_change`/`user_leave`
/// family is manager-bound bookkeeping sent by transports; the
/// `channel_add`/`channel_remove`/`user_add`/`user_update`/`user_remove`
/// family is the mirror-maintenance traffic the manager sends back out.
/// `user_add`, `user_update` and `user_remove` are addressed at a channel
/// token, which is how recipients know which mirror entry to touch.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    ChannelJoin { name: String },
    ChannelLeave { name: String },
    ChannelAdd { channel_id: EntityId, name: String, users: Vec<UserSnapshot> },
    ChannelRemove { channel_id: EntityId },
    UserJoin { channel_id: EntityId, user_id: EntityId, name: String },
    UserChange { channel_id: EntityId, user_id: EntityId, name: String },
    UserLeave { channel_id: EntityId, user_id: EntityId },
    UserAdd { user_id: EntityId, name: String },
    UserUpdate { user_id: EntityId, name: String },
    UserRemove { user_id: EntityId },
    Message { content: String },
    Action { content: String },
    Command { words: Vec<String>, authority: String },
    Shutdown,
    Detach,
    Exception { message: String },
}

impl EventPayload {
    /// The wire name of this payload, for tracing and eavesdropping.
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::ChannelJoin { .. } => "channel_join",
            EventPayload::ChannelLeave { .. } => "channel_leave",
            EventPayload::ChannelAdd { .. } => "channel_add",
            EventPayload::ChannelRemove { .. } => "channel_remove",
            EventPayload::UserJoin { .. } => "user_join",
            EventPayload::UserChange { .. } => "user_change",
            EventPayload::UserLeave { .. } => "user_leave",
            EventPayload::UserAdd { .. } => "user_add",
            EventPayload::UserUpdate { .. } => "user_update",
            EventPayload::UserRemove { .. } => "user_remove",
            EventPayload::Message { .. } => "message",
            EventPayload::Action { .. } => "action",
            EventPayload::Command { .. } => "command",
            EventPayload::Shutdown => "shutdown",
            EventPayload::Detach => "detach",
            EventPayload::Exception { .. } => "exception",
        }
    }
}

/// A single bus event: who sent it, where it is going, and what it carries.
///
/// The target is either a concrete entity token or one of the broadcast
/// constants in [`crate::target`]; broadcast expansion happens at dispatch
/// time, never at enqueue time.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub source: EntityId,
    pub target: EntityId,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: EntityId, target: EntityId, payload: EventPayload) -> Self {
        Self { source, target, payload }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.source, self.target, self.payload.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target;

    #[test]
    fn allocated_ids_are_unique_and_dynamic() {
        let a = EntityId::allocate();
        let b = EntityId::allocate();
        assert_ne!(a, b);
        assert!(!a.is_broadcast());
        assert!(!b.is_broadcast());
    }

    #[test]
    fn broadcast_ids_stay_below_the_allocator_floor() {
        let fresh = EntityId::allocate();
        for id in [
            target::EVERYTHING,
            target::MANAGER,
            target::ALL_BRIDGES,
            target::ALL_CHANNELS,
            target::ALL_USERS,
        ] {
            assert!(id.is_broadcast());
            assert!(id < fresh);
        }
    }

    #[test]
    fn events_compare_by_token_payload_and_route() {
        let source = EntityId::allocate();
        let target = EntityId::allocate();
        let a = Event::new(source, target, EventPayload::Shutdown);
        let b = Event::new(source, target, EventPayload::Shutdown);
        assert_eq!(a, b);
        assert_eq!(a.payload.name(), "shutdown");
    }
}
