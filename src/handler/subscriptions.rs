//! Command subscriptions - persistent callbacks keyed by command name.
//!
//! Used for push-style messages from the module (e.g. `sceneupdate`) that
//! are not awaited as a specific request. A subscription stays installed
//! until removed with [`CommandSubscriptions::unsubscribe`].

use std::collections::HashMap;

use crate::protocol::LogicalMessage;

/// Persistent callback for one command.
pub type CommandCallback = Box<dyn FnMut(LogicalMessage) + Send + 'static>;

/// Command name → persistent callback.
#[derive(Default)]
pub struct CommandSubscriptions {
    callbacks: HashMap<String, CommandCallback>,
}

impl CommandSubscriptions {
    /// Create an empty subscription table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback for `cmd`, returning `true` if one was replaced.
    pub fn subscribe(&mut self, cmd: &str, callback: CommandCallback) -> bool {
        let replaced = self.callbacks.insert(cmd.to_string(), callback).is_some();
        if replaced {
            tracing::debug!(cmd, "Replacing command subscription");
        }
        replaced
    }

    /// Remove the callback for `cmd`.
    pub fn unsubscribe(&mut self, cmd: &str) -> bool {
        self.callbacks.remove(cmd).is_some()
    }

    /// Deliver a message to the subscription for its command.
    ///
    /// Returns the message back if nothing is subscribed.
    pub fn deliver(&mut self, message: LogicalMessage) -> Result<(), LogicalMessage> {
        match self.callbacks.get_mut(message.cmd()) {
            Some(callback) => {
                callback(message);
                Ok(())
            }
            None => Err(message),
        }
    }

    pub fn is_subscribed(&self, cmd: &str) -> bool {
        self.callbacks.contains_key(cmd)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
