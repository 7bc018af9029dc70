//! Command handlers binding catalog actions to the session and sequencer control

use crate::actions::{ActionId, ActionKind};
use crate::error::Result;
use crate::router::{CommandContext, CommandHandler, CommandRegistry};
use crate::sequencer::SequencerControl;
use crate::session::EditingSession;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared state the handlers act on
#[derive(Clone)]
pub struct HandlerContext {
    pub control: Arc<Mutex<SequencerControl>>,
    pub session: Arc<Mutex<EditingSession>>,
}

fn report<T: Debug>(action: ActionId, result: Result<T>) {
    match result {
        Ok(value) => debug!(action = %action, "→ {:?}", value),
        Err(e) => warn!(action = %action, "{}", e),
    }
}

impl HandlerContext {
    fn rig(&self) -> String {
        self.session.lock().rig().to_string()
    }

    /// Trigger actions only fire above the trigger threshold
    fn pressed(&self, ctx: &CommandContext) -> bool {
        let threshold = self.control.lock().config().trigger_threshold;
        ctx.is_pressed(threshold)
    }

    fn run(&self, action: ActionId, ctx: &CommandContext) {
        if action.kind() == ActionKind::Trigger && !self.pressed(ctx) {
            return;
        }

        match action {
            ActionId::QueueLoadNext => {
                let index = self.session.lock().load_next();
                debug!(action = %action, "→ {:?}", index);
            }
            ActionId::QueueBakeSave => {
                let path = self.session.lock().bake_and_save();
                debug!(action = %action, "→ {:?}", path);
            }
            ActionId::StepSpeed1 => report(action, self.control.lock().step_frames(1)),
            ActionId::StepSpeed10 => report(action, self.control.lock().step_frames(10)),
            ActionId::RigKeyAll => {
                let rig = self.rig();
                report(action, self.control.lock().key_all(&rig))
            }
            ActionId::RigZeroAll | ActionId::KeyframeZero => {
                let rig = self.rig();
                report(action, self.control.lock().key_all_to_zero(&rig))
            }
            ActionId::TimeControl => report(action, self.control.lock().time_control(ctx.value)),
            ActionId::StepForward => report(action, self.control.lock().step(1)),
            ActionId::StepBackward => report(action, self.control.lock().step(-1)),
            ActionId::PlayHold => report(action, self.control.lock().play_hold(ctx.value)),
            ActionId::KeyframeLastTouched => {
                let rig = self.rig();
                report(action, self.control.lock().key_last_touched(&rig))
            }
            ActionId::SmallStepButton => self.control.lock().set_small_held(ctx.value),
            ActionId::LargeStepButton => self.control.lock().set_large_held(ctx.value),
            ActionId::SetStartTime => report(action, self.control.lock().set_start_to_current()),
            ActionId::SetEndTime => report(action, self.control.lock().set_end_to_current()),
            ActionId::RigControl => {
                let target = ctx.mapping.target_control.trim();
                if target.is_empty() {
                    warn!(
                        control_id = ctx.control_id,
                        "Rig.Control mapping without target control"
                    );
                    return;
                }
                let rig = self.rig();
                let modus = ctx.mapping.modus();
                report(
                    action,
                    self.control
                        .lock()
                        .apply_rig_control(&rig, target, ctx.value, modus),
                )
            }
        }
    }
}

/// Register a handler for every catalog action
pub fn register_all(registry: &mut CommandRegistry, handlers: HandlerContext) {
    for action in ActionId::all() {
        let handlers = handlers.clone();
        let handler: CommandHandler =
            Arc::new(move |ctx: &CommandContext| handlers.run(action, ctx));
        registry.register(action, handler);
    }
    debug!("Registered {} command handler(s)", registry.registered().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Modus;
    use crate::config::{RigConfig, RigControlConfig, SequencerConfig, SessionConfig};
    use crate::event::ControlEvent;
    use crate::mapping::{MappedAction, MappingStore};
    use crate::router::{EventRouter, RouteOutcome};
    use crate::sequencer::{ConsoleSequencer, RigControlKind, Sequencer};
    use crate::settings::SettingsStore;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        router: EventRouter,
        console: Arc<ConsoleSequencer>,
        handlers: HandlerContext,
        _temp: TempDir,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().unwrap();
        let console = Arc::new(ConsoleSequencer::new("test", 100));
        console.set_rigs(&[RigConfig {
            name: "Face".to_string(),
            controls: vec![RigControlConfig {
                name: "Jaw".to_string(),
                kind: RigControlKind::Float,
            }],
        }]);

        let session = EditingSession::new(
            console.clone(),
            SettingsStore::temporary().unwrap(),
            &SessionConfig::default(),
            temp.path().join("out"),
        );
        let handlers = HandlerContext {
            control: Arc::new(Mutex::new(SequencerControl::new(
                console.clone(),
                SequencerConfig::default(),
            ))),
            session: Arc::new(Mutex::new(session)),
        };
        {
            let mut s = handlers.session.lock();
            s.select_mesh("/Game/Hero");
            s.select_rig("Face");
            s.queue_mut().add("/Game/Anims/Walk.Walk");
        }

        let mut router = EventRouter::new(MappingStore::new(temp.path().join("maps")));
        router.on_host_ready();
        register_all(router.registry_mut(), handlers.clone());

        Fixture { router, console, handlers, _temp: temp }
    }

    fn send(router: &mut EventRouter, number: u8, value: f32) -> RouteOutcome {
        let id = ControlEvent::format_id("Pad", "CC", 0, number);
        router.on_control_event(&ControlEvent::new("Pad", id, value, ""))
    }

    fn bind(router: &mut EventRouter, number: i32, action: MappedAction) {
        router.store_mut().set("Pad", number, action).unwrap();
    }

    #[test]
    fn test_every_action_has_a_handler() {
        let f = fixture();
        assert_eq!(f.router.registry().registered().len(), ActionId::all().count());
    }

    #[test]
    fn test_load_next_then_step() {
        let mut f = fixture();
        bind(&mut f.router, 1, MappedAction::for_action(ActionId::QueueLoadNext));
        bind(&mut f.router, 2, MappedAction::for_action(ActionId::StepForward));
        bind(&mut f.router, 3, MappedAction::for_action(ActionId::LargeStepButton));

        send(&mut f.router, 1, 1.0);
        assert_eq!(f.console.current_frame(), Some(0));

        assert_eq!(send(&mut f.router, 2, 1.0), RouteOutcome::Dispatched(ActionId::StepForward));
        assert_eq!(f.console.current_frame(), Some(5));

        // Release does not step again
        send(&mut f.router, 2, 0.0);
        assert_eq!(f.console.current_frame(), Some(5));

        send(&mut f.router, 3, 1.0);
        send(&mut f.router, 2, 1.0);
        assert_eq!(f.console.current_frame(), Some(15));
    }

    #[test]
    fn test_rig_control_mapping_keys_value() {
        let mut f = fixture();
        bind(&mut f.router, 1, MappedAction::for_action(ActionId::QueueLoadNext));
        bind(&mut f.router, 7, MappedAction::for_rig_control("Jaw", Modus::Absolute));
        send(&mut f.router, 1, 1.0);

        send(&mut f.router, 7, 0.25);
        let keys = f.console.keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].control, "Jaw");
        assert_eq!(f.handlers.control.lock().last_touched(), ["Jaw".to_string()]);
    }

    #[test]
    fn test_bake_marks_source_processed() {
        let mut f = fixture();
        bind(&mut f.router, 1, MappedAction::for_action(ActionId::QueueLoadNext));
        bind(&mut f.router, 2, MappedAction::for_action(ActionId::QueueBakeSave));
        send(&mut f.router, 1, 1.0);
        send(&mut f.router, 2, 1.0);
        assert!(f.handlers.session.lock().queue().is_processed("/Game/Anims/Walk.Walk"));
    }

    #[test]
    fn test_actions_without_sequence_are_noops() {
        let mut f = fixture();
        bind(&mut f.router, 2, MappedAction::for_action(ActionId::StepForward));
        assert_eq!(send(&mut f.router, 2, 1.0), RouteOutcome::Dispatched(ActionId::StepForward));
        assert_eq!(f.console.current_frame(), None);
    }
}
