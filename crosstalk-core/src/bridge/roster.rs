//! Puppet-user bookkeeping for transports.
//!
//! A transport sees remote users under native identifiers (an IRC nick, a
//! numeric chat id) and represents each one on the bus as a puppet with its
//! own entity token. The roster owns that mapping: first sighting allocates
//! a token, later sightings in new channels extend the membership set, and
//! the record is discarded the moment its last channel membership goes.
//!
//! The roster also answers the echo question: an inbound `message` whose
//! source is one of our own puppets originated here and must not be sent
//! back out.

use std::collections::{HashMap, HashSet};

use crate::event::EntityId;

/// One remote user known to a transport.
#[derive(Debug)]
pub struct RemoteUser {
    id: EntityId,
    native: String,
    name: String,
    channels: HashSet<EntityId>,
}

impl RemoteUser {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The transport-native identifier this user is known by.
    pub fn native(&self) -> &str {
        &self.native
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.channels.iter().copied()
    }
}

/// The native-id → puppet mapping a transport maintains.
#[derive(Debug, Default)]
pub struct RemoteRoster {
    users: HashMap<EntityId, RemoteUser>,
    by_native: HashMap<String, EntityId>,
}

impl RemoteRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sighting of `native` in `channel`.
    ///
    /// Returns the user's token and whether this sighting is a new channel
    /// membership — the caller emits a `user_join` exactly when it is.
    pub fn sight(&mut self, native: &str, name: &str, channel: EntityId) -> (EntityId, bool) {
        match self.by_native.get(native) {
            Some(&id) => {
                let user = self.users.get_mut(&id).expect("roster maps stay in sync");
                let joined = user.channels.insert(channel);
                (id, joined)
            }
            None => {
                let id = EntityId::allocate();
                let mut channels = HashSet::new();
                channels.insert(channel);
                self.users.insert(
                    id,
                    RemoteUser {
                        id,
                        native: native.to_string(),
                        name: name.to_string(),
                        channels,
                    },
                );
                self.by_native.insert(native.to_string(), id);
                (id, true)
            }
        }
    }

    /// Renames a known user, returning its token and the channels a
    /// `user_change` should be emitted for. `None` if the user is unknown.
    pub fn rename(&mut self, native: &str, name: &str) -> Option<(EntityId, Vec<EntityId>)> {
        let id = *self.by_native.get(native)?;
        let user = self.users.get_mut(&id)?;
        user.name = name.to_string();
        Some((id, user.channels.iter().copied().collect()))
    }

    /// Records that `native` left `channel`. Returns the user's token if the
    /// membership existed; the record is dropped when it was the last one.
    pub fn depart(&mut self, native: &str, channel: EntityId) -> Option<EntityId> {
        let id = *self.by_native.get(native)?;
        let user = self.users.get_mut(&id)?;
        if !user.channels.remove(&channel) {
            return None;
        }
        if user.channels.is_empty() {
            self.users.remove(&id);
            self.by_native.remove(native);
        }
        Some(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&RemoteUser> {
        self.users.get(&id)
    }

    pub fn by_native(&self, native: &str) -> Option<EntityId> {
        self.by_native.get(native).copied()
    }

    /// Whether `id` is one of this transport's own puppets.
    pub fn contains(&self, id: EntityId) -> bool {
        self.users.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_allocates_later_sightings_reuse() {
        let mut roster = RemoteRoster::new();
        let lobby = EntityId::allocate();
        let dev = EntityId::allocate();

        let (id, joined) = roster.sight("alice", "Alice", lobby);
        assert!(joined);

        let (again, joined) = roster.sight("alice", "Alice", lobby);
        assert_eq!(id, again);
        assert!(!joined);

        let (still, joined) = roster.sight("alice", "Alice", dev);
        assert_eq!(id, still);
        assert!(joined);

        assert_eq!(roster.len(), 1);
        assert!(roster.contains(id));
    }

    #[test]
    fn rename_reports_every_channel() {
        let mut roster = RemoteRoster::new();
        let lobby = EntityId::allocate();
        let dev = EntityId::allocate();
        let (id, _) = roster.sight("alice", "Alice", lobby);
        roster.sight("alice", "Alice", dev);

        let (renamed, mut channels) = roster.rename("alice", "Alicia").unwrap();
        assert_eq!(renamed, id);
        channels.sort();
        let mut expected = vec![lobby, dev];
        expected.sort();
        assert_eq!(channels, expected);
        assert_eq!(roster.get(id).unwrap().name(), "Alicia");

        assert!(roster.rename("nobody", "x").is_none());
    }

    #[test]
    fn last_departure_discards_the_record() {
        let mut roster = RemoteRoster::new();
        let lobby = EntityId::allocate();
        let dev = EntityId::allocate();
        let (id, _) = roster.sight("alice", "Alice", lobby);
        roster.sight("alice", "Alice", dev);

        assert_eq!(roster.depart("alice", lobby), Some(id));
        assert!(roster.contains(id));

        // Departing a channel the user is not in changes nothing.
        assert_eq!(roster.depart("alice", lobby), None);

        assert_eq!(roster.depart("alice", dev), Some(id));
        assert!(roster.is_empty());
        assert_eq!(roster.by_native("alice"), None);
    }
}
