//! Control mappings
//!
//! A mapping entry says "MIDI control N of device D triggers action A against
//! target T in mode M". Entries are grouped per device and rig, and persisted as
//! one JSON file per (device, rig).

mod store;

pub use store::MappingStore;

use crate::actions::{ActionId, Modus};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Action bound to a control
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MappedAction {
    #[serde(rename = "ActionName", default)]
    pub action_name: String,
    #[serde(rename = "TargetControl", default)]
    pub target_control: String,
    #[serde(rename = "Modus", default)]
    pub modus: String,
}

impl MappedAction {
    pub fn new(
        action_name: impl Into<String>,
        target_control: impl Into<String>,
        modus: impl Into<String>,
    ) -> Self {
        Self {
            action_name: action_name.into(),
            target_control: target_control.into(),
            modus: modus.into(),
        }
    }

    /// Entry for a catalog action without target
    pub fn for_action(action: ActionId) -> Self {
        Self::new(action.name(), "", "")
    }

    /// Entry driving a named rig control
    pub fn for_rig_control(control: impl Into<String>, modus: Modus) -> Self {
        Self::new(ActionId::RigControl.name(), control, modus.as_str())
    }

    /// Typed action, if the name is in the catalog
    pub fn action(&self) -> Result<ActionId> {
        self.action_name.parse()
    }

    pub fn modus(&self) -> Modus {
        Modus::parse_lenient(&self.modus)
    }
}

/// Mappings of one device for one rig, keyed by control id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceMapping {
    pub rig: String,
    pub controls: BTreeMap<i32, MappedAction>,
}

impl DeviceMapping {
    pub fn new(rig: impl Into<String>) -> Self {
        Self {
            rig: rig.into(),
            controls: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names() {
        let entry = MappedAction::new("Seq.StepForward", "", "Absolute");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ActionName"], "Seq.StepForward");
        assert_eq!(json["TargetControl"], "");
        assert_eq!(json["Modus"], "Absolute");
    }

    #[test]
    fn test_typed_accessors() {
        let entry = MappedAction::for_rig_control("Jaw", Modus::Relative);
        assert_eq!(entry.action().unwrap(), ActionId::RigControl);
        assert_eq!(entry.modus(), Modus::Relative);
        assert_eq!(entry.target_control, "Jaw");

        let unknown = MappedAction::new("Nope", "", "");
        assert!(unknown.action().is_err());
        assert_eq!(unknown.modus(), Modus::Absolute);
    }
}
