//! Well-known broadcast addresses.
//!
//! The five constants are process-wide singleton tokens with fixed reserved
//! ids. A constant equals its own token and nothing else; what set of
//! bridges it expands to is decided by the manager's routing table when the
//! event is dispatched, so bridges attached after an event is enqueued but
//! before it is dispatched still receive broadcasts.

use crate::event::EntityId;

/// Every attached bridge, the manager included.
pub const EVERYTHING: EntityId = EntityId::from_raw(0);
/// The manager only.
pub const MANAGER: EntityId = EntityId::from_raw(1);
/// Every attached bridge except the manager.
pub const ALL_BRIDGES: EntityId = EntityId::from_raw(2);
/// Every bridge participating in at least one channel.
pub const ALL_CHANNELS: EntityId = EntityId::from_raw(3);
/// Every bridge that originated at least one currently-present user.
pub const ALL_USERS: EntityId = EntityId::from_raw(4);

/// The textual name of a broadcast constant, if `id` is one.
pub fn name(id: EntityId) -> Option<&'static str> {
    match id.raw() {
        0 => Some("Everything"),
        1 => Some("Manager"),
        2 => Some("AllBridges"),
        3 => Some("AllChannels"),
        4 => Some("AllUsers"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_distinct() {
        let all = [EVERYTHING, MANAGER, ALL_BRIDGES, ALL_CHANNELS, ALL_USERS];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn constants_have_names() {
        assert_eq!(name(MANAGER), Some("Manager"));
        assert_eq!(name(ALL_USERS), Some("AllUsers"));
        assert_eq!(name(EntityId::allocate()), None);
    }
}
