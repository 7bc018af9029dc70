//! Router module - routes control events to learn mode or mapped actions
//!
//! The router owns:
//! - the mapping store (per-device control → action bindings)
//! - the learn session (binds the next control to an armed action)
//! - the command registry (typed action handlers)
//!
//! It starts unbound and only accepts events after `on_host_ready()`.

mod commands;
mod learn;

pub use commands::{CommandContext, CommandHandler, CommandRegistry};
pub use learn::{LearnCapture, LearnSession, LearnTarget};

#[cfg(test)]
mod tests;

use crate::actions::ActionId;
use crate::error::MapperError;
use crate::event::ControlEvent;
use crate::mapping::MappingStore;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Callback notified with each learn capture
pub type LearnObserver = Arc<dyn Fn(&LearnCapture) + Send + Sync>;

/// What happened to a routed event
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Router unbound or control id not parseable
    Ignored,
    /// Event consumed by learn mode and bound to the armed target
    Learned { control_id: i32, target: LearnTarget },
    /// Mapped action executed
    Dispatched(ActionId),
    /// Mapping found but the action is unknown or has no handler
    Unhandled,
    /// No mapping for this control
    Unmapped,
}

/// Routes control events to learn mode or the command registry
pub struct EventRouter {
    store: MappingStore,
    learn: LearnSession,
    registry: CommandRegistry,
    learn_observers: Vec<LearnObserver>,
    bound: bool,
}

impl EventRouter {
    /// Create an unbound router; call `on_host_ready()` once the host is up
    pub fn new(store: MappingStore) -> Self {
        Self {
            store,
            learn: LearnSession::new(),
            registry: CommandRegistry::new(),
            learn_observers: Vec::new(),
            bound: false,
        }
    }

    /// Bind to the input stream; `true` only on the first call
    pub fn on_host_ready(&mut self) -> bool {
        if self.bound {
            debug!("Router already bound");
            return false;
        }
        self.bound = true;
        info!("Router bound to control events");
        true
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Route one control event
    pub fn on_control_event(&mut self, event: &ControlEvent) -> RouteOutcome {
        if !self.bound {
            debug!(id = %event.id, "Router not bound yet, dropping event");
            return RouteOutcome::Ignored;
        }

        let Some(control_id) = event.control_id() else {
            warn!("{}, dropping event", MapperError::InvalidControlId(event.id.clone()));
            return RouteOutcome::Ignored;
        };

        if let Some(capture) = self.learn.capture(&event.device, control_id) {
            return self.bind_capture(capture);
        }

        let Some(mapping) = self.store.get(&event.device, control_id).cloned() else {
            debug!(device = %event.device, control_id, "No mapping");
            return RouteOutcome::Unmapped;
        };

        let action = match mapping.action() {
            Ok(action) => action,
            Err(e) => {
                warn!(device = %event.device, control_id, "{}", e);
                return RouteOutcome::Unhandled;
            }
        };

        let ctx = CommandContext {
            device: event.device.clone(),
            control_id,
            value: event.value,
            mapping,
        };

        trace!(
            device = %event.device,
            control_id,
            action = %action,
            value = event.value,
            "Dispatch"
        );
        if self.registry.dispatch(action, &ctx) {
            RouteOutcome::Dispatched(action)
        } else {
            warn!(action = %action, "No handler registered");
            RouteOutcome::Unhandled
        }
    }

    fn bind_capture(&mut self, capture: LearnCapture) -> RouteOutcome {
        info!(
            device = %capture.device,
            control_id = capture.control_id,
            action = %capture.target.action.action_name,
            "Learned control"
        );

        if !self.store.is_active(&capture.device) {
            self.store.initialize(&capture.device, "");
        }
        if let Err(e) = self.store.set(
            &capture.device,
            capture.control_id,
            capture.target.action.clone(),
        ) {
            warn!(device = %capture.device, "Failed to save learned mapping: {}", e);
        }

        for observer in &self.learn_observers {
            observer(&capture);
        }

        RouteOutcome::Learned {
            control_id: capture.control_id,
            target: capture.target,
        }
    }

    /// Arm learn mode; a previously armed target is superseded
    pub fn arm_learn(&mut self, target: LearnTarget) {
        self.learn.arm(target);
    }

    pub fn cancel_learn(&mut self) -> Option<LearnTarget> {
        self.learn.cancel()
    }

    pub fn is_learning(&self) -> bool {
        self.learn.is_learning()
    }

    pub fn learn_target(&self) -> Option<&LearnTarget> {
        self.learn.target()
    }

    pub fn on_learn(&mut self, observer: LearnObserver) {
        self.learn_observers.push(observer);
    }

    /// Remove a binding; `false` when nothing was bound or the write failed
    pub fn unbind(&mut self, device: &str, control_id: i32) -> bool {
        match self.store.remove(device, control_id) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(device, control_id, "Failed to save after unbind: {}", e);
                false
            }
        }
    }

    pub fn device_connected(&mut self, device: &str, rig: &str) {
        info!(device, rig, "Device connected");
        self.store.initialize(device, rig);
    }

    pub fn device_disconnected(&mut self, device: &str) {
        info!(device, "Device disconnected");
        if let Err(e) = self.store.deactivate_device(device) {
            warn!(device, "Failed to save mappings on disconnect: {}", e);
        }
    }

    /// Move an active device onto another rig's mapping file
    ///
    /// Flushes and evicts the current mappings, then loads `<device>_<rig>`.
    /// Returns `false` when the device is inactive or already on `rig`.
    pub fn rescope_device(&mut self, device: &str, rig: &str) -> bool {
        match self.store.rig_for(device) {
            Some(current) if current != rig => {
                info!(device, from = current, to = rig, "Switching mapping rig");
            }
            _ => return false,
        }
        if let Err(e) = self.store.deactivate_device(device) {
            warn!(device, "Failed to save mappings before rig switch: {}", e);
        }
        self.store.initialize(device, rig);
        true
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MappingStore {
        &mut self.store
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }
}
