//! # Authoritative Channel State
//!
//! A [`Channel`] is a logical room spanning one or more bridges. The manager
//! owns the channel table and is the only component that calls the mutating
//! operations here; bridges observe channels exclusively through the mirror
//! events the manager emits. The one place a channel itself initiates events
//! is the bookkeeping cascade of [`Channel::bridge_leave`], which enqueues a
//! `user_leave` for every user the leaving bridge originated.

use std::collections::HashMap;

use crate::error::StateError;
use crate::event::{EntityId, EventPayload, UserSnapshot};
use crate::manager::ManagerHandle;

/// A user present in a channel, with the bridge that originated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUser {
    name: String,
    origin: EntityId,
}

impl ChannelUser {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bridge this user entered the bus through.
    pub fn origin(&self) -> EntityId {
        self.origin
    }
}

/// A named room and its membership state.
#[derive(Debug)]
pub struct Channel {
    id: EntityId,
    name: String,
    participants: Vec<EntityId>,
    users: HashMap<EntityId, ChannelUser>,
}

impl Channel {
    pub(crate) fn new(name: String) -> Self {
        Self {
            id: EntityId::allocate(),
            name,
            participants: Vec::new(),
            users: HashMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bridges participating in this channel, in join order.
    pub fn participants(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.participants.iter().copied()
    }

    pub fn participates(&self, bridge: EntityId) -> bool {
        self.participants.contains(&bridge)
    }

    /// A channel with no participating bridges must not exist; the manager
    /// destroys it as soon as this returns true.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn users(&self) -> impl Iterator<Item = (EntityId, &ChannelUser)> + '_ {
        self.users.iter().map(|(id, user)| (*id, user))
    }

    pub fn user(&self, user_id: EntityId) -> Option<&ChannelUser> {
        self.users.get(&user_id)
    }

    /// The current user set as carried by a `channel_add` event.
    pub fn snapshot(&self) -> Vec<UserSnapshot> {
        self.users
            .iter()
            .map(|(id, user)| UserSnapshot { user_id: *id, name: user.name.clone() })
            .collect()
    }

    pub(crate) fn bridge_join(&mut self, bridge: EntityId) -> Result<(), StateError> {
        if self.participates(bridge) {
            return Err(StateError::AlreadyJoined(bridge, self.name.clone()));
        }
        self.participants.push(bridge);
        Ok(())
    }

    /// Removes `bridge` from the participant set, enqueuing a `user_leave`
    /// at this channel for every user it originated. The users stay in the
    /// table until those events are processed, which keeps the departure
    /// path identical whether a transport reported it or a detach forced it.
    pub(crate) fn bridge_leave(
        &mut self,
        bridge: EntityId,
        events: &ManagerHandle,
    ) -> Result<(), StateError> {
        if !self.participates(bridge) {
            return Err(StateError::NotJoined(bridge, self.name.clone()));
        }

        for (user_id, user) in &self.users {
            if user.origin == bridge {
                events.send(
                    bridge,
                    self.id,
                    EventPayload::UserLeave { channel_id: self.id, user_id: *user_id },
                );
            }
        }
        self.participants.retain(|p| *p != bridge);
        Ok(())
    }

    pub(crate) fn user_join(
        &mut self,
        user_id: EntityId,
        name: String,
        origin: EntityId,
    ) -> Result<(), StateError> {
        if self.users.contains_key(&user_id) {
            return Err(StateError::UserPresent(user_id, self.name.clone()));
        }
        if !self.participates(origin) {
            return Err(StateError::NotJoined(origin, self.name.clone()));
        }
        self.users.insert(user_id, ChannelUser { name, origin });
        Ok(())
    }

    pub(crate) fn user_update(&mut self, user_id: EntityId, name: String) -> Result<(), StateError> {
        match self.users.get_mut(&user_id) {
            Some(user) => {
                user.name = name;
                Ok(())
            }
            None => Err(StateError::UserAbsent(user_id, self.name.clone())),
        }
    }

    pub(crate) fn user_leave(&mut self, user_id: EntityId) -> Result<ChannelUser, StateError> {
        self.users
            .remove(&user_id)
            .ok_or_else(|| StateError::UserAbsent(user_id, self.name.clone()))
    }
}
