//! The console bridge: dispatcher-side rendering and mirror bookkeeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crosstalk_core::bridge::roster::RemoteRoster;
use crosstalk_core::bridge::{Bridge, BridgeCore, MirrorChannel, MirrorUser};
use crosstalk_core::command::CommandSet;
use crosstalk_core::error::UserError;
use crosstalk_core::event::{EntityId, Event, EventPayload};
use crosstalk_core::mention;
use crosstalk_core::target;

use crate::config::ConsoleConfig;
use crate::worker::Worker;

/// The table shared between the dispatcher side and the input thread.
#[derive(Default)]
pub(crate) struct ConsoleState {
    /// Mirrored channel names, for `say` lookups.
    pub(crate) channels: HashMap<String, EntityId>,
    /// Display names of every user this console has seen.
    pub(crate) names: HashMap<EntityId, String>,
    /// The operator's puppet token, once one exists.
    pub(crate) operator: Option<EntityId>,
}

pub(crate) type SharedState = Arc<Mutex<ConsoleState>>;

/// A bridge rendering the bus to the local terminal.
pub struct ConsoleBridge {
    core: BridgeCore,
    config: ConsoleConfig,
    commands: CommandSet<ConsoleBridge>,
    roster: RemoteRoster,
    state: SharedState,
}

impl ConsoleBridge {
    pub fn new(config: ConsoleConfig) -> Self {
        let mut commands = CommandSet::new();
        commands.register("channels", Self::cmd_channels);
        commands.register("users", Self::cmd_users);

        Self {
            core: BridgeCore::new(),
            config,
            commands,
            roster: RemoteRoster::new(),
            state: Arc::new(Mutex::new(ConsoleState::default())),
        }
    }

    fn cmd_channels(bridge: &mut ConsoleBridge, _args: &[String], _authority: &str) -> Result<Option<String>, UserError> {
        let mut names: Vec<_> = bridge.core.channels().map(|c| c.name().to_string()).collect();
        if names.is_empty() {
            return Ok(Some("no channels joined".to_string()));
        }
        names.sort();
        Ok(Some(names.join(", ")))
    }

    fn cmd_users(bridge: &mut ConsoleBridge, args: &[String], _authority: &str) -> Result<Option<String>, UserError> {
        let Some(channel_name) = args.first() else {
            return Ok(Some("usage: users <channel>".to_string()));
        };
        let Some(channel) = bridge.core.channel_by_name(channel_name) else {
            return Ok(Some(format!("no channel named '{}'", channel_name)));
        };
        let mut names: Vec<_> = channel.users().map(|u| u.name.clone()).collect();
        if names.is_empty() {
            return Ok(Some(format!("'{}' is empty", channel_name)));
        }
        names.sort();
        Ok(Some(names.join(", ")))
    }

    fn display_name(&self, id: EntityId) -> String {
        if let Some(name) = self.state.lock().unwrap().names.get(&id) {
            return name.clone();
        }
        if let Some(channel) = self.core.channel(id) {
            return format!("'{}'", channel.name());
        }
        // Broadcast constants render through their Display names.
        id.to_string()
    }

    /// Rewrites mention sigils to `@name` where the user is known.
    fn render(&self, content: &str) -> String {
        let state = self.state.lock().unwrap();
        mention::rewrite(content, |id| state.names.get(&id).map(|name| format!("@{}", name)))
    }
}

#[async_trait]
impl Bridge for ConsoleBridge {
    fn core(&self) -> &BridgeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BridgeCore {
        &mut self.core
    }

    fn on_register(&mut self) {
        let manager = match self.core.manager() {
            Ok(handle) => handle.clone(),
            Err(e) => {
                tracing::error!("console registered without a manager handle: {}", e);
                return;
            }
        };

        for name in &self.config.channels {
            manager.send(
                self.core.id(),
                target::MANAGER,
                EventPayload::ChannelJoin { name: name.clone() },
            );
        }

        Worker {
            manager,
            state: self.state.clone(),
            bridge: self.core.id(),
            authority: self.config.authority.clone(),
        }
        .spawn();
    }

    fn on_terminate(&mut self) {
        tracing::info!("console terminated");
    }

    fn on_channel_add(&mut self, channel: &MirrorChannel) {
        {
            let mut state = self.state.lock().unwrap();
            state.channels.insert(channel.name().to_string(), channel.id());
            for user in channel.users() {
                state.names.insert(user.id, user.name.clone());
            }
        }
        println!("* joined channel '{}'", channel.name());

        if let Some(user_name) = self.config.user_name.clone() {
            let (user_id, joined) = self.roster.sight(&user_name, &user_name, channel.id());
            if joined {
                {
                    let mut state = self.state.lock().unwrap();
                    state.operator = Some(user_id);
                    state.names.insert(user_id, user_name.clone());
                }
                let join = EventPayload::UserJoin {
                    channel_id: channel.id(),
                    user_id,
                    name: user_name,
                };
                if let Err(e) = self.core.send(target::MANAGER, join) {
                    tracing::warn!("could not puppet the operator: {}", e);
                }
            }
        }
    }

    fn on_channel_remove(&mut self, channel: &MirrorChannel) {
        self.state.lock().unwrap().channels.remove(channel.name());
        if let Some(user_name) = &self.config.user_name {
            self.roster.depart(user_name, channel.id());
        }
        println!("* left channel '{}'", channel.name());
    }

    fn on_user_add(&mut self, channel_id: EntityId, user: &MirrorUser) {
        self.state.lock().unwrap().names.insert(user.id, user.name.clone());
        println!("{}: user '{}' joined", self.display_name(channel_id), user.name);
    }

    fn on_user_update(&mut self, channel_id: EntityId, before: &MirrorUser, after: &MirrorUser) {
        self.state.lock().unwrap().names.insert(after.id, after.name.clone());
        println!(
            "{}: user '{}' is now '{}'",
            self.display_name(channel_id),
            before.name,
            after.name,
        );
    }

    fn on_user_remove(&mut self, channel_id: EntityId, user: &MirrorUser) {
        println!("{}: user '{}' left", self.display_name(channel_id), user.name);
        let still_known = self.core.channels().any(|c| c.user(user.id).is_some());
        if !still_known {
            self.state.lock().unwrap().names.remove(&user.id);
        }
    }

    async fn handle_event(&mut self, event: &Event) {
        match &event.payload {
            EventPayload::Message { content } => {
                // Our own puppet speaking; echoing it back would loop.
                if self.roster.contains(event.source) {
                    return;
                }
                println!("{}: {}", self.display_name(event.source), self.render(content));
            }
            EventPayload::Action { content } => {
                if self.roster.contains(event.source) {
                    return;
                }
                println!("* {} {}", self.display_name(event.source), self.render(content));
            }
            other => {
                tracing::debug!(name = other.name(), "unhandled console event");
            }
        }
    }

    async fn on_command(&mut self, words: &[String], authority: &str) -> Result<Option<String>, UserError> {
        let commands = self.commands.clone();
        commands.invoke(self, words, authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosstalk_core::event::UserSnapshot;

    fn words(split: &[&str]) -> Vec<String> {
        split.iter().map(|s| s.to_string()).collect()
    }

    async fn mirror_channel(bridge: &mut ConsoleBridge, name: &str, users: Vec<UserSnapshot>) -> EntityId {
        let channel_id = EntityId::allocate();
        let event = Event::new(
            EntityId::allocate(),
            bridge.core().id(),
            EventPayload::ChannelAdd { channel_id, name: name.into(), users },
        );
        bridge.dispatch(&event).await;
        channel_id
    }

    #[tokio::test]
    async fn channels_command_lists_the_mirror() {
        let mut bridge = ConsoleBridge::new(ConsoleConfig::default());
        let out = bridge.on_command(&words(&["channels"]), "test").await.unwrap();
        assert_eq!(out.as_deref(), Some("no channels joined"));

        mirror_channel(&mut bridge, "lobby", vec![]).await;
        mirror_channel(&mut bridge, "dev", vec![]).await;
        let out = bridge.on_command(&words(&["channels"]), "test").await.unwrap();
        assert_eq!(out.as_deref(), Some("dev, lobby"));
    }

    #[tokio::test]
    async fn users_command_lists_a_channel() {
        let mut bridge = ConsoleBridge::new(ConsoleConfig::default());
        let alice = UserSnapshot { user_id: EntityId::allocate(), name: "alice".into() };
        let bob = UserSnapshot { user_id: EntityId::allocate(), name: "bob".into() };
        mirror_channel(&mut bridge, "lobby", vec![bob, alice]).await;

        let out = bridge.on_command(&words(&["users", "lobby"]), "test").await.unwrap();
        assert_eq!(out.as_deref(), Some("alice, bob"));

        let out = bridge.on_command(&words(&["users", "ghost"]), "test").await.unwrap();
        assert_eq!(out.as_deref(), Some("no channel named 'ghost'"));

        let err = bridge.on_command(&words(&["frobnicate"]), "test").await.unwrap_err();
        assert_eq!(err, UserError::UnknownCommand("frobnicate".into()));
    }

    #[tokio::test]
    async fn mirrored_names_drive_mention_rendering() {
        let mut bridge = ConsoleBridge::new(ConsoleConfig::default());
        let alice = UserSnapshot { user_id: EntityId::allocate(), name: "alice".into() };
        let alice_id = alice.user_id;
        mirror_channel(&mut bridge, "lobby", vec![alice]).await;

        let rendered = bridge.render(&format!("hi {}", mention::encode(alice_id)));
        assert_eq!(rendered, "hi @alice");
        assert_eq!(bridge.display_name(alice_id), "alice");
    }
}
