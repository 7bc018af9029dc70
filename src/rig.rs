//! Rig control binding: the bindable `Rig.<Control>` targets of the active rig

use crate::sequencer::{RigControl, Sequencer};
use std::fmt;
use tracing::{info, warn};

/// Label prefix of rig control targets
pub const RIG_TARGET_PREFIX: &str = "Rig.";

/// One bindable rig control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigTarget {
    /// Control name (the mapping's target control)
    pub id: String,
    /// Display label (`Rig.<Control>`)
    pub label: String,
    pub control: RigControl,
}

impl fmt::Display for RigTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.label, self.control.kind)
    }
}

/// Registry of the active rig's bindable controls
#[derive(Debug, Default)]
pub struct RigBinder {
    rig: String,
    targets: Vec<RigTarget>,
}

impl RigBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the target list with the controls of `rig`
    ///
    /// An empty rig name or a rig without controls leaves the list empty.
    pub fn register_rig_controls(&mut self, sequencer: &dyn Sequencer, rig: &str) -> &[RigTarget] {
        self.targets.clear();
        self.rig = rig.to_string();

        if rig.is_empty() {
            warn!("No rig selected, no rig controls registered");
            return &self.targets;
        }

        let controls = sequencer.rig_controls(rig);
        if controls.is_empty() {
            warn!("Rig {} has no controls", rig);
            return &self.targets;
        }

        self.targets = controls
            .into_iter()
            .map(|control| RigTarget {
                id: control.name.clone(),
                label: format!("{}{}", RIG_TARGET_PREFIX, control.name),
                control,
            })
            .collect();

        info!("Registered {} rig control(s) from {}", self.targets.len(), rig);
        &self.targets
    }

    pub fn rig(&self) -> &str {
        &self.rig
    }

    pub fn targets(&self) -> &[RigTarget] {
        &self.targets
    }

    /// Look up a target by control name or `Rig.<Control>` label
    pub fn find(&self, name: &str) -> Option<&RigTarget> {
        let id = name.strip_prefix(RIG_TARGET_PREFIX).unwrap_or(name);
        self.targets.iter().find(|t| t.id == id)
    }
}
