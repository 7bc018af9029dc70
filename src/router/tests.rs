//! Tests for EventRouter

use super::*;
use crate::mapping::MappedAction;
use parking_lot::Mutex;
use tempfile::{tempdir, TempDir};

fn make_router() -> (EventRouter, TempDir) {
    let temp = tempdir().unwrap();
    let router = EventRouter::new(MappingStore::new(temp.path()));
    (router, temp)
}

fn cc_event(device: &str, number: u8, value: f32) -> ControlEvent {
    ControlEvent::new(
        device,
        ControlEvent::format_id(device, "CC", 0, number),
        value,
        "",
    )
}

fn bind(router: &mut EventRouter, control_id: i32, action: ActionId) {
    router
        .store_mut()
        .set("APC40", control_id, MappedAction::for_action(action))
        .unwrap();
}

fn recording_handler(hits: &Arc<Mutex<Vec<(i32, f32)>>>) -> CommandHandler {
    let sink = Arc::clone(hits);
    Arc::new(move |ctx: &CommandContext| sink.lock().push((ctx.control_id, ctx.value)))
}

#[test]
fn test_events_dropped_until_host_ready() {
    let (mut router, _temp) = make_router();
    bind(&mut router, 1, ActionId::StepForward);

    assert_eq!(router.on_control_event(&cc_event("APC40", 1, 1.0)), RouteOutcome::Ignored);

    assert!(router.on_host_ready());
    assert!(!router.on_host_ready());
    assert!(router.is_bound());
}

#[test]
fn test_mapped_event_dispatches() {
    let (mut router, _temp) = make_router();
    router.on_host_ready();
    router.device_connected("APC40", "Face");
    bind(&mut router, 48, ActionId::StepForward);

    let hits = Arc::new(Mutex::new(Vec::new()));
    router.registry_mut().register(ActionId::StepForward, recording_handler(&hits));

    let outcome = router.on_control_event(&cc_event("APC40", 48, 0.75));
    assert_eq!(outcome, RouteOutcome::Dispatched(ActionId::StepForward));
    assert_eq!(*hits.lock(), vec![(48, 0.75)]);
}

#[test]
fn test_unmapped_and_unhandled() {
    let (mut router, _temp) = make_router();
    router.on_host_ready();

    assert_eq!(router.on_control_event(&cc_event("APC40", 5, 1.0)), RouteOutcome::Unmapped);

    router.store_mut().set("APC40", 5, MappedAction::new("Seq.Unknown", "", "")).unwrap();
    assert_eq!(router.on_control_event(&cc_event("APC40", 5, 1.0)), RouteOutcome::Unhandled);

    bind(&mut router, 6, ActionId::SetEndTime);
    assert_eq!(router.on_control_event(&cc_event("APC40", 6, 1.0)), RouteOutcome::Unhandled);
}

#[test]
fn test_malformed_id_is_ignored() {
    let (mut router, _temp) = make_router();
    router.on_host_ready();
    let event = ControlEvent::new("APC40", "IN:APC40:CC", 1.0, "");
    assert_eq!(router.on_control_event(&event), RouteOutcome::Ignored);
}

#[test]
fn test_learn_binds_without_executing() {
    let (mut router, temp) = make_router();
    router.on_host_ready();

    let hits = Arc::new(Mutex::new(Vec::new()));
    router.registry_mut().register(ActionId::PlayHold, recording_handler(&hits));

    let target = LearnTarget::new(4, MappedAction::for_action(ActionId::PlayHold));
    router.arm_learn(target.clone());
    assert!(router.is_learning());

    let outcome = router.on_control_event(&cc_event("nanoKONTROL2", 41, 1.0));
    assert_eq!(outcome, RouteOutcome::Learned { control_id: 41, target });
    assert!(!router.is_learning());
    assert!(hits.lock().is_empty());

    // Device was auto-initialized and the file written
    assert_eq!(
        router.store().get("nanoKONTROL2", 41).map(|m| m.action_name.as_str()),
        Some("Seq.PlayHold")
    );
    assert!(temp.path().join("nanoKONTROL2_.json").exists());

    // Next event executes the learned mapping
    let outcome = router.on_control_event(&cc_event("nanoKONTROL2", 41, 1.0));
    assert_eq!(outcome, RouteOutcome::Dispatched(ActionId::PlayHold));
    assert_eq!(hits.lock().len(), 1);
}

#[test]
fn test_second_arm_receives_binding() {
    let (mut router, _temp) = make_router();
    router.on_host_ready();

    router.arm_learn(LearnTarget::new(0, MappedAction::for_action(ActionId::StepForward)));
    router.arm_learn(LearnTarget::new(1, MappedAction::for_action(ActionId::StepBackward)));
    assert_eq!(router.learn_target().unwrap().row, 1);

    router.on_control_event(&cc_event("APC40", 10, 1.0));
    assert_eq!(
        router.store().get("APC40", 10).unwrap().action_name,
        "Seq.StepBackward"
    );
}

#[test]
fn test_learn_observers_and_cancel() {
    let (mut router, _temp) = make_router();
    router.on_host_ready();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    router.on_learn(Arc::new(move |capture: &LearnCapture| {
        sink.lock().push((capture.device.clone(), capture.control_id))
    }));

    router.arm_learn(LearnTarget::new(0, MappedAction::for_action(ActionId::StepForward)));
    assert!(router.cancel_learn().is_some());
    assert_eq!(router.on_control_event(&cc_event("APC40", 3, 1.0)), RouteOutcome::Unmapped);

    router.arm_learn(LearnTarget::new(0, MappedAction::for_action(ActionId::StepForward)));
    router.on_control_event(&cc_event("APC40", 3, 1.0));
    assert_eq!(*seen.lock(), vec![("APC40".to_string(), 3)]);
}

#[test]
fn test_unbind_and_disconnect() {
    let (mut router, temp) = make_router();
    router.on_host_ready();
    router.device_connected("APC40", "Face");
    bind(&mut router, 1, ActionId::StepForward);
    bind(&mut router, 2, ActionId::StepBackward);

    assert!(router.unbind("APC40", 1));
    assert!(!router.unbind("APC40", 1));

    router.device_disconnected("APC40");
    assert!(!router.store().is_active("APC40"));
    assert_eq!(router.on_control_event(&cc_event("APC40", 2, 1.0)), RouteOutcome::Unmapped);

    router.device_connected("APC40", "Face");
    assert!(router.store().get("APC40", 2).is_some());
    assert!(router.store().get("APC40", 1).is_none());
    assert!(temp.path().join("APC40_Face.json").exists());
}

#[test]
fn test_rescope_swaps_mapping_files() {
    let (mut router, temp) = make_router();
    router.device_connected("APC40", "Face");
    bind(&mut router, 7, ActionId::RigKeyAll);

    assert!(!router.rescope_device("APC40", "Face"));
    assert!(!router.rescope_device("Nano", "Body"));

    assert!(router.rescope_device("APC40", "Body"));
    assert_eq!(router.store().rig_for("APC40"), Some("Body"));
    assert!(router.store().get("APC40", 7).is_none());
    assert!(temp.path().join("APC40_Face.json").exists());

    assert!(router.rescope_device("APC40", "Face"));
    assert!(router.store().get("APC40", 7).is_some());
}
