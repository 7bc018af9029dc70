//! Action catalog
//!
//! Every action a MIDI control can trigger is an [`ActionId`] variant. Mapping files
//! store the symbolic name (e.g. `"Seq.StepForward"`); dispatch always goes through
//! the typed id.

use crate::error::MapperError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How an action consumes the control value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Fires on a press edge (value above the trigger threshold)
    Trigger,
    /// Consumes the normalized value on every event
    Continuous,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Trigger => write!(f, "Trigger"),
            ActionKind::Continuous => write!(f, "Float"),
        }
    }
}

/// Typed action identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionId {
    QueueLoadNext,
    QueueBakeSave,
    StepSpeed1,
    StepSpeed10,
    RigKeyAll,
    RigZeroAll,
    TimeControl,
    StepForward,
    StepBackward,
    PlayHold,
    KeyframeZero,
    KeyframeLastTouched,
    SmallStepButton,
    LargeStepButton,
    SetStartTime,
    SetEndTime,
    /// Drives the rig control named by the mapping's target control
    RigControl,
}

impl ActionId {
    /// Every action in catalog order
    pub const ALL: [ActionId; 17] = [
        ActionId::QueueLoadNext,
        ActionId::QueueBakeSave,
        ActionId::StepSpeed1,
        ActionId::StepSpeed10,
        ActionId::RigKeyAll,
        ActionId::RigZeroAll,
        ActionId::TimeControl,
        ActionId::StepForward,
        ActionId::StepBackward,
        ActionId::PlayHold,
        ActionId::KeyframeZero,
        ActionId::KeyframeLastTouched,
        ActionId::SmallStepButton,
        ActionId::LargeStepButton,
        ActionId::SetStartTime,
        ActionId::SetEndTime,
        ActionId::RigControl,
    ];

    pub fn all() -> impl Iterator<Item = ActionId> {
        Self::ALL.into_iter()
    }

    /// Symbolic name stored in mapping files
    pub fn name(&self) -> &'static str {
        match self {
            ActionId::QueueLoadNext => "Queue.LoadNext",
            ActionId::QueueBakeSave => "Queue.BakeSave",
            ActionId::StepSpeed1 => "Sequencer.StepSpeed1",
            ActionId::StepSpeed10 => "Sequencer.StepSpeed10",
            ActionId::RigKeyAll => "Rig.KeyAll",
            ActionId::RigZeroAll => "Rig.ZeroAll",
            ActionId::TimeControl => "Seq.TimeControl",
            ActionId::StepForward => "Seq.StepForward",
            ActionId::StepBackward => "Seq.StepBackward",
            ActionId::PlayHold => "Seq.PlayHold",
            ActionId::KeyframeZero => "Seq.KeyframeZero",
            ActionId::KeyframeLastTouched => "Seq.KeyframeLastTouched",
            ActionId::SmallStepButton => "Seq.SmallStepButton",
            ActionId::LargeStepButton => "Seq.LargeStepButton",
            ActionId::SetStartTime => "Seq.SetStartTime",
            ActionId::SetEndTime => "Seq.SetEndTime",
            ActionId::RigControl => "Rig.Control",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            ActionId::QueueLoadNext => "Queue Load Next",
            ActionId::QueueBakeSave => "Queue Bake & Save",
            ActionId::StepSpeed1 => "Sequencer Step +1",
            ActionId::StepSpeed10 => "Sequencer Step +10",
            ActionId::RigKeyAll => "Rig Key All",
            ActionId::RigZeroAll => "Rig Zero All",
            ActionId::TimeControl => "Sequencer Jog",
            ActionId::StepForward => "Step Forward",
            ActionId::StepBackward => "Step Backward",
            ActionId::PlayHold => "Play While Held",
            ActionId::KeyframeZero => "Keyframe All Controls To Zero",
            ActionId::KeyframeLastTouched => "Keyframe Last Touched Controls",
            ActionId::SmallStepButton => "Small Step Modifier",
            ActionId::LargeStepButton => "Large Step Modifier",
            ActionId::SetStartTime => "Set Start Time",
            ActionId::SetEndTime => "Set End Time",
            ActionId::RigControl => "Rig Control",
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ActionId::TimeControl
            | ActionId::PlayHold
            | ActionId::SmallStepButton
            | ActionId::LargeStepButton
            | ActionId::RigControl => ActionKind::Continuous,
            ActionId::QueueLoadNext
            | ActionId::QueueBakeSave
            | ActionId::StepSpeed1
            | ActionId::StepSpeed10
            | ActionId::RigKeyAll
            | ActionId::RigZeroAll
            | ActionId::StepForward
            | ActionId::StepBackward
            | ActionId::KeyframeZero
            | ActionId::KeyframeLastTouched
            | ActionId::SetStartTime
            | ActionId::SetEndTime => ActionKind::Trigger,
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionId {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::all()
            .find(|id| id.name() == s)
            .ok_or_else(|| MapperError::UnknownAction(s.to_string()))
    }
}

/// Mode in which a rig control consumes values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Modus {
    #[default]
    Absolute,
    /// Offset from the centre position (0.5)
    Relative,
    /// Flip between 0 and 1 on each press
    Toggle,
}

impl Modus {
    /// Parse a modus name, falling back to `Absolute` for empty or unknown names
    pub fn parse_lenient(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("none") {
            return Modus::Absolute;
        }
        match name.to_ascii_lowercase().as_str() {
            "absolute" | "abs" => Modus::Absolute,
            "relative" | "rel" => Modus::Relative,
            "toggle" => Modus::Toggle,
            other => {
                warn!("Unknown modus '{}', using Absolute", other);
                Modus::Absolute
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modus::Absolute => "Absolute",
            Modus::Relative => "Relative",
            Modus::Toggle => "Toggle",
        }
    }
}

impl fmt::Display for Modus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
