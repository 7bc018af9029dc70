//! Typed command registry: `ActionId` → handler

use crate::actions::ActionId;
use crate::mapping::MappedAction;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Context handed to a command handler
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub device: String,
    pub control_id: i32,
    /// Normalized control value (0.0..=1.0)
    pub value: f32,
    pub mapping: MappedAction,
}

impl CommandContext {
    pub fn is_pressed(&self, threshold: f32) -> bool {
        self.value > threshold
    }
}

/// Command handler callback
pub type CommandHandler = Arc<dyn Fn(&CommandContext) + Send + Sync>;

#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<ActionId, CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one
    pub fn register(&mut self, action: ActionId, handler: CommandHandler) {
        if self.handlers.insert(action, handler).is_some() {
            debug!(action = %action, "Command handler replaced");
        }
    }

    pub fn unregister(&mut self, action: ActionId) -> bool {
        self.handlers.remove(&action).is_some()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn is_registered(&self, action: ActionId) -> bool {
        self.handlers.contains_key(&action)
    }

    /// Registered actions, sorted
    pub fn registered(&self) -> Vec<ActionId> {
        let mut actions: Vec<ActionId> = self.handlers.keys().copied().collect();
        actions.sort();
        actions
    }

    /// Run the handler for `action`; `false` when none is registered
    pub fn dispatch(&self, action: ActionId, ctx: &CommandContext) -> bool {
        match self.handlers.get(&action) {
            Some(handler) => {
                handler(ctx);
                true
            }
            None => false,
        }
    }
}
