//! Sequencer collaborator interface
//!
//! The host animation editor is reached through the [`Sequencer`] trait.
//! [`ConsoleSequencer`] is the built-in implementation; [`SequencerControl`] holds
//! the stepping, range and keyframe logic driven by MIDI actions.

pub mod console;
pub mod control;

pub use console::ConsoleSequencer;
pub use control::SequencerControl;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Inclusive frame range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: i32,
    pub end: i32,
}

impl FrameRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> i32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Value type of a rig control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigControlKind {
    #[default]
    Float,
    Bool,
    Vector2D,
    Position,
    Scale,
    Rotator,
    Transform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigControl {
    pub name: String,
    pub kind: RigControlKind,
}

impl RigControl {
    pub fn new(name: impl Into<String>, kind: RigControlKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Value keyed onto a rig control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum KeyValue {
    Float(f32),
    Bool(bool),
    Vector2D([f32; 2]),
    /// Position, scale or rotation
    Vector([f32; 3]),
    Transform {
        translation: [f32; 3],
        rotation: [f32; 3],
        scale: [f32; 3],
    },
}

impl KeyValue {
    /// Neutral value for a control kind; `None` for kinds that are not reset
    pub fn neutral(kind: RigControlKind) -> Option<Self> {
        match kind {
            RigControlKind::Float => Some(KeyValue::Float(0.0)),
            RigControlKind::Bool => None,
            RigControlKind::Vector2D => Some(KeyValue::Vector2D([0.0, 0.0])),
            RigControlKind::Position | RigControlKind::Rotator => {
                Some(KeyValue::Vector([0.0, 0.0, 0.0]))
            }
            RigControlKind::Scale => Some(KeyValue::Vector([1.0, 1.0, 1.0])),
            RigControlKind::Transform => Some(KeyValue::Transform {
                translation: [0.0; 3],
                rotation: [0.0; 3],
                scale: [1.0; 3],
            }),
        }
    }
}

/// Request to open an animation for editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Animation asset path
    pub animation: String,
    pub mesh: String,
    pub rig: String,
}

/// Request to bake the open animation into a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeRequest {
    pub animation: String,
    pub rig: String,
    pub folder: PathBuf,
}

/// Host sequencer operations
///
/// Methods take `&self` so the sequencer can be shared as `Arc<dyn Sequencer>`;
/// implementations use interior mutability. Operations needing an open sequence
/// return [`MapperError::NoOpenSequence`](crate::error::MapperError::NoOpenSequence)
/// when there is none.
pub trait Sequencer: Send + Sync {
    fn name(&self) -> &str;

    fn current_frame(&self) -> Option<i32>;

    fn set_frame(&self, frame: i32) -> Result<()>;

    fn set_playing(&self, playing: bool) -> Result<()>;

    fn playback_range(&self) -> Option<FrameRange>;

    fn set_playback_range(&self, range: FrameRange) -> Result<()>;

    /// Controls of a rig, empty when the rig is unknown
    fn rig_controls(&self, rig: &str) -> Vec<RigControl>;

    fn key_control(&self, rig: &str, control: &str, frame: i32, value: KeyValue) -> Result<()>;

    fn load_animation(&self, request: &LoadRequest) -> Result<()>;

    /// Bake the open sequence; returns the written asset path
    fn bake(&self, request: &BakeRequest) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_values() {
        assert_eq!(KeyValue::neutral(RigControlKind::Float), Some(KeyValue::Float(0.0)));
        assert_eq!(KeyValue::neutral(RigControlKind::Bool), None);
        assert_eq!(
            KeyValue::neutral(RigControlKind::Scale),
            Some(KeyValue::Vector([1.0, 1.0, 1.0]))
        );
        match KeyValue::neutral(RigControlKind::Transform) {
            Some(KeyValue::Transform { translation, scale, .. }) => {
                assert_eq!(translation, [0.0; 3]);
                assert_eq!(scale, [1.0; 3]);
            }
            other => panic!("unexpected neutral transform: {:?}", other),
        }
    }

    #[test]
    fn test_frame_range() {
        let range = FrameRange::new(0, 149);
        assert_eq!(range.len(), 150);
        assert!(!range.is_empty());
        assert_eq!(range.to_string(), "0..=149");
    }
}
