//! # The Bridge Contract
//!
//! A bridge speaks one chat protocol and exchanges events with the manager
//! on behalf of its remote users. This module defines the trait the manager
//! drives and the plumbing every implementation embeds:
//!
//! - [`BridgeCore`] — the per-bridge token, the registration slot holding a
//!   [`ManagerHandle`], and the local channel mirror.
//! - [`Bridge`] — lifecycle hooks, the provided dispatch that keeps the
//!   mirror current, and the command/observation hooks a transport overrides.
//! - [`RemoteRoster`](roster::RemoteRoster) — puppet-user bookkeeping shared
//!   by transports.
//! - [`LeaveDebouncer`](debounce::LeaveDebouncer) — debounced departures for
//!   flaky transports.
//!
//! The mirror is the bridge's own view of the channels it was told about; it
//! shares no storage with the manager's authoritative table. All mirror
//! updates happen inside [`Bridge::dispatch`], which the manager invokes on
//! its single dispatcher task, so implementations need no locking for
//! mirror state. Anything a transport's own worker tasks touch is the
//! transport's concern to guard.

pub mod debounce;
pub mod roster;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{StateError, UserError};
use crate::event::{EntityId, Event, EventPayload, UserSnapshot};
use crate::manager::ManagerHandle;

/// A user as mirrored by a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorUser {
    pub id: EntityId,
    pub name: String,
}

/// A channel as mirrored by a bridge: its token, name, and user set.
#[derive(Debug, Clone)]
pub struct MirrorChannel {
    id: EntityId,
    name: String,
    users: HashMap<EntityId, MirrorUser>,
}

impl MirrorChannel {
    fn new(id: EntityId, name: String, users: &[UserSnapshot]) -> Self {
        let users = users
            .iter()
            .map(|u| (u.user_id, MirrorUser { id: u.user_id, name: u.name.clone() }))
            .collect();
        Self { id, name, users }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn users(&self) -> impl Iterator<Item = &MirrorUser> + '_ {
        self.users.values()
    }

    pub fn user(&self, user_id: EntityId) -> Option<&MirrorUser> {
        self.users.get(&user_id)
    }
}

/// Per-bridge plumbing embedded by every [`Bridge`] implementation.
pub struct BridgeCore {
    id: EntityId,
    manager: Option<ManagerHandle>,
    channels: HashMap<EntityId, MirrorChannel>,
}

impl BridgeCore {
    pub fn new() -> Self {
        Self {
            id: EntityId::allocate(),
            manager: None,
            channels: HashMap::new(),
        }
    }

    /// This bridge's identity token.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_registered(&self) -> bool {
        self.manager.is_some()
    }

    /// The handle to the manager's event queue. Worker tasks clone this to
    /// enqueue from off-dispatcher threads.
    pub fn manager(&self) -> Result<&ManagerHandle, StateError> {
        self.manager.as_ref().ok_or(StateError::NotRegistered)
    }

    fn bind(&mut self, manager: ManagerHandle) -> Result<(), StateError> {
        if self.manager.is_some() {
            return Err(StateError::AlreadyRegistered);
        }
        self.manager = Some(manager);
        Ok(())
    }

    /// Enqueues an event with an explicit source, which is how a transport
    /// speaks on behalf of one of its puppet users.
    pub fn send_event(
        &self,
        source: EntityId,
        target: EntityId,
        payload: EventPayload,
    ) -> Result<(), StateError> {
        self.manager()?.send(source, target, payload);
        Ok(())
    }

    /// Enqueues an event sourced from the bridge itself.
    pub fn send(&self, target: EntityId, payload: EventPayload) -> Result<(), StateError> {
        self.send_event(self.id, target, payload)
    }

    /// Announces departure to the manager and forgets the registration.
    pub fn detach(&mut self) -> Result<(), StateError> {
        self.send(crate::target::MANAGER, EventPayload::Detach)?;
        self.manager = None;
        Ok(())
    }

    pub fn channels(&self) -> impl Iterator<Item = &MirrorChannel> + '_ {
        self.channels.values()
    }

    pub fn channel(&self, channel_id: EntityId) -> Option<&MirrorChannel> {
        self.channels.get(&channel_id)
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&MirrorChannel> {
        self.channels.values().find(|c| c.name == name)
    }
}

impl Default for BridgeCore {
    fn default() -> Self {
        Self::new()
    }
}

/// The abstract collaborator the manager drives.
///
/// Implementations embed a [`BridgeCore`] and expose it through
/// `core`/`core_mut`; everything else has a default. The provided
/// [`dispatch`](Bridge::dispatch) runs on the manager's dispatcher task and
/// must complete without blocking on external I/O — transports hand slow
/// work to their own workers and let those workers enqueue follow-up events.
#[async_trait]
pub trait Bridge: Send {
    fn core(&self) -> &BridgeCore;
    fn core_mut(&mut self) -> &mut BridgeCore;

    /// Called once the bridge is attached and bound to the manager. This is
    /// where a transport starts its I/O workers and requests its channels.
    fn on_register(&mut self) {}

    /// Called when the manager asks the bridge to leave, before the detach
    /// event is sent.
    fn on_deregister(&mut self) {}

    /// Called during manager teardown. May run without a preceding detach
    /// and must tolerate being the only signal the bridge ever gets.
    fn on_terminate(&mut self) {}

    /// Observes every event delivered to this bridge, before any handling.
    fn on_event(&mut self, _event: &Event) {}

    fn on_channel_add(&mut self, _channel: &MirrorChannel) {}
    fn on_channel_remove(&mut self, _channel: &MirrorChannel) {}
    fn on_user_add(&mut self, _channel_id: EntityId, _user: &MirrorUser) {}
    fn on_user_update(&mut self, _channel_id: EntityId, _before: &MirrorUser, _after: &MirrorUser) {}
    fn on_user_remove(&mut self, _channel_id: EntityId, _user: &MirrorUser) {}

    /// Handles events the provided dispatch does not consume: `message`,
    /// `action`, and anything the transport cares to observe.
    async fn handle_event(&mut self, _event: &Event) {}

    /// Executes a command addressed at this bridge. The default knows no
    /// commands; transports back this with a
    /// [`CommandSet`](crate::command::CommandSet).
    async fn on_command(
        &mut self,
        words: &[String],
        _authority: &str,
    ) -> Result<Option<String>, UserError> {
        match words.first() {
            Some(name) => Err(UserError::UnknownCommand(name.clone())),
            None => Err(UserError::EmptyCommand),
        }
    }

    /// Binds the bridge to the manager's queue and runs [`on_register`].
    /// Invoked by the manager during attach; not for direct use.
    fn register(&mut self, manager: ManagerHandle) -> Result<(), StateError> {
        self.core_mut().bind(manager)?;
        self.on_register();
        Ok(())
    }

    /// Runs [`on_deregister`] and announces departure. Invoked by the
    /// manager during detach; the bridge stays in the table until the
    /// detach event is processed.
    fn deregister(&mut self) -> Result<(), StateError> {
        if !self.core().is_registered() {
            return Err(StateError::NotRegistered);
        }
        self.on_deregister();
        self.core_mut().detach()
    }

    /// Delivers one event to this bridge: observation hook first, then
    /// mirror maintenance, shutdown handling and command routing; whatever
    /// is left goes to [`handle_event`](Bridge::handle_event).
    async fn dispatch(&mut self, event: &Event) {
        self.on_event(event);

        match &event.payload {
            EventPayload::ChannelAdd { channel_id, name, users } => {
                let channel = MirrorChannel::new(*channel_id, name.clone(), users);
                self.core_mut().channels.insert(*channel_id, channel.clone());
                self.on_channel_add(&channel);
            }
            EventPayload::ChannelRemove { channel_id } => {
                if let Some(channel) = self.core_mut().channels.remove(channel_id) {
                    self.on_channel_remove(&channel);
                }
            }
            EventPayload::UserAdd { user_id, name } => {
                let added = self.core_mut().channels.get_mut(&event.target).map(|channel| {
                    let user = MirrorUser { id: *user_id, name: name.clone() };
                    channel.users.insert(*user_id, user.clone());
                    user
                });
                match added {
                    Some(user) => self.on_user_add(event.target, &user),
                    None => tracing::debug!(channel = %event.target, "user_add for unmirrored channel"),
                }
            }
            EventPayload::UserUpdate { user_id, name } => {
                let updated = self
                    .core_mut()
                    .channels
                    .get_mut(&event.target)
                    .and_then(|channel| channel.users.get_mut(user_id))
                    .map(|user| {
                        let before = user.clone();
                        user.name = name.clone();
                        (before, user.clone())
                    });
                if let Some((before, after)) = updated {
                    self.on_user_update(event.target, &before, &after);
                }
            }
            EventPayload::UserRemove { user_id } => {
                let removed = self
                    .core_mut()
                    .channels
                    .get_mut(&event.target)
                    .and_then(|channel| channel.users.remove(user_id));
                if let Some(user) = removed {
                    self.on_user_remove(event.target, &user);
                }
            }
            EventPayload::Shutdown => {
                if let Err(e) = self.core_mut().detach() {
                    tracing::warn!("shutdown reached an unregistered bridge: {}", e);
                }
            }
            EventPayload::Command { words, authority } => {
                let reply = match self.on_command(words, authority).await {
                    Ok(response) => response,
                    Err(e) => Some(format!("error: {}", e)),
                };
                if let Some(content) = reply {
                    if let Err(e) = self
                        .core()
                        .send_event(self.core().id(), event.source, EventPayload::Message { content })
                    {
                        tracing::warn!("dropping command reply: {}", e);
                    }
                }
            }
            _ => self.handle_event(event).await,
        }
    }
}
