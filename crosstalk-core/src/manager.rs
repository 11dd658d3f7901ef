//! # The Bridge Manager
//!
//! The manager owns the event bus: a single unbounded FIFO that every
//! attached bridge enqueues into, and a dispatcher loop that pulls one event
//! at a time, translates it, applies the manager's own bookkeeping, expands
//! the target into a concrete recipient set and delivers to each recipient.
//!
//! ## Core Components
//!
//! - [`BridgeManager`]: the runner. It is consumed by [`run()`](BridgeManager::run),
//!   which loops until only the manager remains and then terminates every
//!   surviving bridge.
//! - [`ManagerHandle`]: a clonable, thread-safe handle onto the event queue.
//!   It is the only object bridges and their worker tasks hold; sending is
//!   safe from any thread and never blocks.
//!
//! All manager state — the bridge table, the channel table — is owned by
//! the dispatcher task alone. Handlers run on that task and must not block;
//! follow-up events they produce are appended to the queue and delivered
//! after everything already enqueued, never inline.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;

use crate::bridge::Bridge;
use crate::channel::Channel;
use crate::command::CommandSet;
use crate::error::{BusError, StateError, UserError};
use crate::event::{EntityId, Event, EventPayload};
use crate::target;

/// The reserved name under which the manager appears in its own table.
pub const MANAGER_NAME: &str = "manager";

/// A clonable handle onto the manager's event queue.
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl ManagerHandle {
    pub(crate) fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self { events }
    }

    /// Enqueues an event. A send after the manager has gone away is logged
    /// and dropped; worker tasks race teardown and that is not an error.
    pub fn send(&self, source: EntityId, target: EntityId, payload: EventPayload) {
        self.send_event(Event::new(source, target, payload));
    }

    pub fn send_event(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::warn!("event queue closed, dropping event");
        }
    }

    /// Resolves once the manager's queue is gone; workers select on this to
    /// learn about teardown.
    pub async fn closed(&self) {
        self.events.closed().await
    }
}

struct BridgeRecord {
    id: EntityId,
    /// `None` for the manager's own record.
    handle: Option<Box<dyn Bridge>>,
}

/// Whether a processed event is still delivered to its recipients.
enum Flow {
    Deliver,
    Drop,
}

/// The event bus and its bookkeeping.
pub struct BridgeManager {
    id: EntityId,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    bridges: HashMap<String, BridgeRecord>,
    channels: HashMap<String, Channel>,
    commands: CommandSet<BridgeManager>,
    eavesdropper: Option<Box<dyn Fn(&Event) + Send>>,
    running: bool,
}

impl BridgeManager {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let id = EntityId::allocate();

        let mut bridges = HashMap::new();
        bridges.insert(MANAGER_NAME.to_string(), BridgeRecord { id, handle: None });

        let mut commands = CommandSet::new();
        commands.register("shutdown", Self::cmd_shutdown);

        Self {
            id,
            events_tx,
            events_rx,
            bridges,
            channels: HashMap::new(),
            commands,
            eavesdropper: None,
            running: false,
        }
    }

    /// The manager's own identity token.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle::new(self.events_tx.clone())
    }

    /// Installs a tracing tap called with every event after translation.
    /// The eavesdropper observes only: it must not mutate state or enqueue.
    pub fn set_eavesdropper<F>(&mut self, eavesdropper: F)
    where
        F: Fn(&Event) + Send + 'static,
    {
        self.eavesdropper = Some(Box::new(eavesdropper));
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.bridges.contains_key(name)
    }

    pub fn bridge_id(&self, name: &str) -> Option<EntityId> {
        self.bridges.get(name).map(|record| record.id)
    }

    pub fn bridge_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.bridges.keys().map(String::as_str)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.values()
    }

    /// Inserts `bridge` under `name` and registers it, which typically kicks
    /// off the bridge's I/O and its initial `channel_join` requests.
    pub fn attach(&mut self, name: &str, bridge: Box<dyn Bridge>) -> Result<(), StateError> {
        if self.bridges.contains_key(name) {
            return Err(StateError::AlreadyAttached(name.to_string()));
        }

        let handle = self.handle();
        let id = bridge.core().id();
        self.bridges.insert(name.to_string(), BridgeRecord { id, handle: Some(bridge) });

        let record = self.bridges.get_mut(name).expect("just inserted");
        if let Err(e) = record.handle.as_mut().expect("not the manager").register(handle) {
            self.bridges.remove(name);
            return Err(e);
        }

        tracing::info!(bridge = name, id = %id, "bridge attached");
        Ok(())
    }

    /// Asks the named bridge to leave. The bridge sends its detach event and
    /// stays in the table until that event is processed.
    pub fn detach(&mut self, name: &str) -> Result<(), StateError> {
        if name == MANAGER_NAME {
            return Err(StateError::Reserved(name.to_string()));
        }
        let record = self
            .bridges
            .get_mut(name)
            .ok_or_else(|| StateError::NotAttached(name.to_string()))?;
        record.handle.as_mut().expect("not the manager").deregister()
    }

    /// Runs the dispatcher until only the manager remains or a fatal error
    /// surfaces, then terminates every surviving bridge.
    pub async fn run(mut self) -> Result<(), BusError> {
        tracing::info!(id = %self.id, "bridge manager running");
        self.running = true;
        let result = loop {
            if !self.running {
                break Ok(());
            }
            if let Err(e) = self.once().await {
                tracing::error!("dispatcher failed: {}", e);
                break Err(e);
            }
        };
        self.terminate();
        result
    }

    /// Processes a single event, waiting for one if the queue is empty.
    pub async fn once(&mut self) -> Result<(), BusError> {
        let event = match self.events_rx.recv().await {
            Some(event) => event,
            // Unreachable while `self` holds a sender, but not worth a panic.
            None => return Ok(()),
        };

        let event = match self.translate(event) {
            Some(event) => event,
            None => return Ok(()),
        };

        if let Some(tap) = &self.eavesdropper {
            tap(&event);
        }
        tracing::trace!(event = %event, "dispatching");

        if let Flow::Drop = self.apply_update(&event)? {
            return Ok(());
        }

        let recipients = match self.resolve(event.target) {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::warn!(event = %event, "dropping event: {}", e);
                return Ok(());
            }
        };

        for name in recipients {
            if name == MANAGER_NAME {
                // The manager's share of a delivery is the update pass above.
                continue;
            }
            if let Some(record) = self.bridges.get_mut(&name) {
                if let Some(bridge) = record.handle.as_mut() {
                    bridge.dispatch(&event).await;
                }
            }
        }
        Ok(())
    }

    /// Processes events until the queue is momentarily empty.
    pub async fn drain(&mut self) -> Result<(), BusError> {
        while !self.events_rx.is_empty() {
            self.once().await?;
        }
        Ok(())
    }

    /// Drains the bridge table, invoking `on_terminate` on every bridge.
    pub fn terminate(&mut self) {
        self.running = false;
        for (name, record) in self.bridges.drain() {
            if let Some(mut bridge) = record.handle {
                tracing::info!(bridge = %name, "terminating bridge");
                bridge.on_terminate();
            }
        }
    }

    fn send(&self, target: EntityId, payload: EventPayload) {
        if self.events_tx.send(Event::new(self.id, target, payload)).is_err() {
            tracing::warn!("event queue closed, dropping event");
        }
    }

    /// Answers a misbehaving source with `error: <reason>`.
    fn reply_error(&self, target: EntityId, reason: &dyn fmt::Display) {
        self.send(target, EventPayload::Message { content: format!("error: {}", reason) });
    }

    /// The translation phase. Only `command` events addressed at the Manager
    /// target are rewritten: the first word must name an attached bridge,
    /// and the event is re-aimed at that bridge's token with the remaining
    /// words. Failures are answered to the source and swallow the event.
    fn translate(&mut self, event: Event) -> Option<Event> {
        let source = event.source;
        match event.payload {
            EventPayload::Command { words, authority } if event.target == target::MANAGER => {
                let Some((bridge_name, rest)) = words.split_first() else {
                    self.reply_error(source, &UserError::EmptyCommand);
                    return None;
                };
                match self.bridges.get(bridge_name.as_str()) {
                    Some(record) => Some(Event::new(
                        source,
                        record.id,
                        EventPayload::Command { words: rest.to_vec(), authority },
                    )),
                    None => {
                        self.reply_error(source, &UserError::NoSuchBridge(bridge_name.clone()));
                        None
                    }
                }
            }
            payload => Some(Event::new(source, event.target, payload)),
        }
    }

    /// The manager's own state-update pass, applied to every dequeued event.
    fn apply_update(&mut self, event: &Event) -> Result<Flow, BusError> {
        match &event.payload {
            EventPayload::ChannelJoin { name } => Ok(self.on_channel_join(event.source, name)),
            EventPayload::ChannelLeave { name } => Ok(self.on_channel_leave(event.source, name)),
            EventPayload::UserJoin { channel_id, user_id, name } => {
                Ok(self.on_user_join(event.source, *channel_id, *user_id, name))
            }
            EventPayload::UserChange { channel_id, user_id, name } => {
                Ok(self.on_user_change(event.source, *channel_id, *user_id, name))
            }
            EventPayload::UserLeave { channel_id, user_id } => {
                Ok(self.on_user_leave(*channel_id, *user_id))
            }
            EventPayload::Detach => Ok(self.on_detach(event.source)),
            EventPayload::Command { words, authority } if event.target == self.id => {
                Ok(self.on_command(event.source, words, authority))
            }
            EventPayload::Exception { message } => Err(BusError::Fatal(message.clone())),
            _ => Ok(Flow::Deliver),
        }
    }

    /// Creates the channel on first join, answers the source with a
    /// `channel_add` carrying the current user snapshot, then records the
    /// source as participating.
    fn on_channel_join(&mut self, source: EntityId, name: &str) -> Flow {
        if let Some(channel) = self.channels.get(name) {
            if channel.participates(source) {
                self.reply_error(source, &StateError::AlreadyJoined(source, name.to_string()));
                return Flow::Drop;
            }
        }

        let channel = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(channel = name, "channel created");
                Channel::new(name.to_string())
            });
        let channel_id = channel.id();
        let users = channel.snapshot();

        self.send(source, EventPayload::ChannelAdd { channel_id, name: name.to_string(), users });

        let channel = self.channels.get_mut(name).expect("just inserted");
        channel.bridge_join(source).expect("participation checked above");
        Flow::Deliver
    }

    /// Runs the leave cascade, answers the source with `channel_remove`, and
    /// destroys the channel once its participant set empties.
    fn on_channel_leave(&mut self, source: EntityId, name: &str) -> Flow {
        let handle = self.handle();
        let Some(channel) = self.channels.get_mut(name) else {
            self.reply_error(source, &StateError::UnknownChannel(name.to_string()));
            return Flow::Drop;
        };

        if let Err(e) = channel.bridge_leave(source, &handle) {
            self.reply_error(source, &e);
            return Flow::Drop;
        }
        let channel_id = channel.id();
        let emptied = channel.is_empty();

        self.send(source, EventPayload::ChannelRemove { channel_id });

        if emptied {
            self.channels.remove(name);
            tracing::info!(channel = name, "channel destroyed");
        }
        Flow::Deliver
    }

    /// Broadcasts `user_add` at the channel, then inserts the user with the
    /// event source as its origin.
    fn on_user_join(&mut self, source: EntityId, channel_id: EntityId, user_id: EntityId, name: &str) -> Flow {
        let Some(channel) = self.channels.values_mut().find(|c| c.id() == channel_id) else {
            tracing::debug!(channel = %channel_id, "user_join for unknown channel, dropping");
            return Flow::Drop;
        };

        // Validate before announcing so a rejected join never reaches the mirrors.
        if channel.user(user_id).is_some() {
            let err = StateError::UserPresent(user_id, channel.name().to_string());
            self.reply_error(source, &err);
            return Flow::Drop;
        }
        if !channel.participates(source) {
            let err = StateError::NotJoined(source, channel.name().to_string());
            self.reply_error(source, &err);
            return Flow::Drop;
        }

        let target = channel.id();
        channel.user_join(user_id, name.to_string(), source).expect("validated above");
        let payload = EventPayload::UserAdd { user_id, name: name.to_string() };
        self.send(target, payload);
        Flow::Deliver
    }

    /// Broadcasts `user_update` at the channel, then renames.
    fn on_user_change(&mut self, source: EntityId, channel_id: EntityId, user_id: EntityId, name: &str) -> Flow {
        let Some(channel) = self.channels.values_mut().find(|c| c.id() == channel_id) else {
            tracing::debug!(channel = %channel_id, "user_change for unknown channel, dropping");
            return Flow::Drop;
        };

        if let Err(e) = channel.user_update(user_id, name.to_string()) {
            self.reply_error(source, &e);
            return Flow::Drop;
        }
        let target = channel.id();
        self.send(target, EventPayload::UserUpdate { user_id, name: name.to_string() });
        Flow::Deliver
    }

    /// Removes the user, then broadcasts `user_remove` at the channel.
    ///
    /// Leave events legitimately outlive their channel: a teardown cascade
    /// enqueues them before a sole-participant channel is destroyed. Those
    /// are dropped as stale rather than treated as errors.
    fn on_user_leave(&mut self, channel_id: EntityId, user_id: EntityId) -> Flow {
        let Some(channel) = self.channels.values_mut().find(|c| c.id() == channel_id) else {
            tracing::debug!(channel = %channel_id, "user_leave for a destroyed channel, dropping");
            return Flow::Drop;
        };

        if channel.user_leave(user_id).is_err() {
            tracing::debug!(user = %user_id, channel = %channel_id, "user_leave for an absent user, dropping");
            return Flow::Drop;
        }
        let target = channel.id();
        self.send(target, EventPayload::UserRemove { user_id });
        Flow::Deliver
    }

    /// The detach cascade: every channel the bridge participated in runs its
    /// leave bookkeeping, emptied channels are destroyed, the bridge leaves
    /// the table, and the loop stops once only the manager remains.
    fn on_detach(&mut self, source: EntityId) -> Flow {
        let Some(name) = self.bridge_name(source) else {
            tracing::debug!(bridge = %source, "detach from an unknown bridge, dropping");
            return Flow::Drop;
        };

        let handle = self.handle();
        let mut emptied = Vec::new();
        for channel in self.channels.values_mut() {
            if channel.participates(source) {
                channel.bridge_leave(source, &handle).expect("participation checked");
                if channel.is_empty() {
                    emptied.push(channel.name().to_string());
                }
            }
        }
        for channel_name in emptied {
            self.channels.remove(&channel_name);
            tracing::info!(channel = %channel_name, "channel destroyed");
        }

        self.bridges.remove(&name);
        tracing::info!(bridge = %name, "bridge detached");

        if self.bridges.len() == 1 {
            tracing::info!("last bridge detached, stopping");
            self.running = false;
        }
        Flow::Deliver
    }

    /// Executes a command that reached the manager itself: resolve through
    /// the registry, answer the return value as a `message`, and surface
    /// failures as `error: <reason>` instead of letting them near the loop.
    fn on_command(&mut self, source: EntityId, words: &[String], authority: &str) -> Flow {
        let commands = self.commands.clone();
        match commands.invoke(self, words, authority) {
            Ok(Some(response)) => self.send(source, EventPayload::Message { content: response }),
            Ok(None) => {}
            Err(e) => self.reply_error(source, &e),
        }
        Flow::Deliver
    }

    fn cmd_shutdown(manager: &mut BridgeManager, _args: &[String], _authority: &str) -> Result<Option<String>, UserError> {
        tracing::info!("shutdown requested");
        manager.send(target::ALL_BRIDGES, EventPayload::Shutdown);
        Ok(None)
    }

    fn bridge_name(&self, id: EntityId) -> Option<String> {
        self.bridges
            .iter()
            .find(|(_, record)| record.id == id)
            .map(|(name, _)| name.clone())
    }

    /// Expands a target into the set of recipient bridge names, trying each
    /// routing clause in order: the broadcast constants, then a bridge
    /// token, a channel token, and a user token.
    fn resolve(&self, target: EntityId) -> Result<Vec<String>, BusError> {
        if target == target::EVERYTHING {
            return Ok(self.bridges.keys().cloned().collect());
        }
        if target == target::MANAGER {
            return Ok(vec![MANAGER_NAME.to_string()]);
        }
        if target == target::ALL_BRIDGES {
            return Ok(self
                .bridges
                .keys()
                .filter(|name| name.as_str() != MANAGER_NAME)
                .cloned()
                .collect());
        }
        if target == target::ALL_CHANNELS {
            return Ok(self
                .bridges
                .iter()
                .filter(|(_, record)| {
                    self.channels.values().any(|c| c.participates(record.id))
                })
                .map(|(name, _)| name.clone())
                .collect());
        }
        if target == target::ALL_USERS {
            return Ok(self
                .bridges
                .iter()
                .filter(|(_, record)| {
                    self.channels
                        .values()
                        .any(|c| c.users().any(|(_, user)| user.origin() == record.id))
                })
                .map(|(name, _)| name.clone())
                .collect());
        }

        if let Some(name) = self.bridge_name(target) {
            return Ok(vec![name]);
        }

        if let Some(channel) = self.channels.values().find(|c| c.id() == target) {
            return Ok(channel
                .participants()
                .filter_map(|id| self.bridge_name(id))
                .collect());
        }

        for channel in self.channels.values() {
            if let Some(user) = channel.user(target) {
                return Ok(self.bridge_name(user.origin()).into_iter().collect());
            }
        }

        Err(BusError::InvalidTarget(target))
    }
}

impl Default for BridgeManager {
    fn default() -> Self {
        Self::new()
    }
}
