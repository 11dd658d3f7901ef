//! The console input worker.
//!
//! Reading the terminal is blocking I/O, so it runs on a plain dedicated
//! thread. The thread never touches the bridge itself: its only ways out
//! are the manager's queue handle (thread-safe by contract) and the small
//! mutex-guarded table it shares with the dispatcher side.

use std::io::BufRead;

use crosstalk_core::command::split;
use crosstalk_core::error::UserError;
use crosstalk_core::event::{EntityId, EventPayload};
use crosstalk_core::manager::ManagerHandle;
use crosstalk_core::target;

use crate::bridge::SharedState;

/// What a single input line asks for.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Directive {
    /// Send a command event: the words already start with the target bridge.
    Command { words: Vec<String> },
    /// Speak into a channel as the operator user.
    Say { channel: String, text: String },
    /// Print an error line to the operator.
    Error(String),
    Empty,
}

/// Parses one input line into a [`Directive`].
pub(crate) fn interpret(line: &str) -> Directive {
    let words = match split(line) {
        Ok(words) => words,
        Err(e) => return Directive::Error(format!("error: {}", e)),
    };
    let Some(first) = words.first() else {
        return Directive::Empty;
    };

    match first.as_str() {
        "bridge" => {
            if words.len() < 2 {
                Directive::Error(format!("error: {}", UserError::EmptyCommand))
            } else {
                Directive::Command { words: words[1..].to_vec() }
            }
        }
        "manager" => Directive::Command { words },
        "shutdown" => Directive::Command { words: vec!["manager".into(), "shutdown".into()] },
        "say" => {
            if words.len() < 3 {
                Directive::Error("error: usage: say <channel> <text>".into())
            } else {
                Directive::Say { channel: words[1].clone(), text: words[2..].join(" ") }
            }
        }
        unknown => Directive::Error(format!("error: '{}' unknown command", unknown)),
    }
}

pub(crate) struct Worker {
    pub(crate) manager: ManagerHandle,
    pub(crate) state: SharedState,
    pub(crate) bridge: EntityId,
    pub(crate) authority: String,
}

impl Worker {
    pub(crate) fn spawn(self) {
        let spawned = std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || self.run());
        if let Err(e) = spawned {
            tracing::error!("could not start the console reader: {}", e);
        }
    }

    fn run(self) {
        tracing::info!("console ready");
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => self.handle_line(&line),
                Err(e) => {
                    self.manager.send(
                        self.bridge,
                        target::MANAGER,
                        EventPayload::Exception { message: format!("console input failed: {}", e) },
                    );
                    return;
                }
            }
        }
        tracing::info!("console input closed");
    }

    fn handle_line(&self, line: &str) {
        match interpret(line) {
            Directive::Command { words } => {
                self.manager.send(
                    self.bridge,
                    target::MANAGER,
                    EventPayload::Command { words, authority: self.authority.clone() },
                );
            }
            Directive::Say { channel, text } => {
                let state = self.state.lock().unwrap();
                match (state.operator, state.channels.get(&channel)) {
                    (Some(operator), Some(&channel_id)) => {
                        self.manager.send(operator, channel_id, EventPayload::Message { content: text });
                    }
                    (None, _) => println!("error: no operator user is configured"),
                    (_, None) => println!("error: not in channel '{}'", channel),
                }
            }
            Directive::Error(message) => println!("{}", message),
            Directive::Empty => {}
        }
    }
}
