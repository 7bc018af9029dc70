//! Sequencer stepping, jog, playback range and keyframe helpers
//!
//! Step size table:
//!
//! | small held | large held | step            |
//! |------------|------------|-----------------|
//! | yes        | no         | `small_step`    |
//! | no         | yes        | `large_step`    |
//! | yes        | yes        | `combined_step` |
//! | no         | no         | `normal_step`   |

use super::{FrameRange, KeyValue, RigControlKind, Sequencer};
use crate::actions::Modus;
use crate::config::SequencerConfig;
use crate::error::{MapperError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Modifier buttons count as held from this value up
const HOLD_THRESHOLD: f32 = 0.5;

/// Relative mode treats this value as "no change"
const RELATIVE_CENTER: f32 = 0.5;

pub struct SequencerControl {
    sequencer: Arc<dyn Sequencer>,
    config: SequencerConfig,
    small_held: bool,
    large_held: bool,
    last_jog: f32,
    /// Last value applied per rig control
    values: HashMap<String, f32>,
    /// Press state per toggle control (edge detection)
    pressed: HashMap<String, bool>,
    /// Controls touched since the last keyframe, in touch order
    touched: Vec<String>,
}

impl SequencerControl {
    pub fn new(sequencer: Arc<dyn Sequencer>, config: SequencerConfig) -> Self {
        Self {
            sequencer,
            config,
            small_held: false,
            large_held: false,
            last_jog: 0.0,
            values: HashMap::new(),
            pressed: HashMap::new(),
            touched: Vec::new(),
        }
    }

    pub fn sequencer(&self) -> &Arc<dyn Sequencer> {
        &self.sequencer
    }

    pub fn set_config(&mut self, config: SequencerConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn set_small_held(&mut self, value: f32) {
        self.small_held = value >= HOLD_THRESHOLD;
    }

    pub fn set_large_held(&mut self, value: f32) {
        self.large_held = value >= HOLD_THRESHOLD;
    }

    pub fn step_size(&self) -> i32 {
        match (self.small_held, self.large_held) {
            (true, false) => self.config.small_step,
            (false, true) => self.config.large_step,
            (true, true) => self.config.combined_step,
            (false, false) => self.config.normal_step,
        }
    }

    fn current_frame(&self) -> Result<i32> {
        self.sequencer.current_frame().ok_or(MapperError::NoOpenSequence)
    }

    /// Move the playhead by `delta` frames; returns the new frame
    pub fn step_frames(&self, delta: i32) -> Result<i32> {
        let frame = self.current_frame()? + delta;
        self.sequencer.set_frame(frame)?;
        debug!(frame, delta, "Sequencer stepped");
        Ok(frame)
    }

    /// Step by `direction * step_size()`; returns the new frame
    pub fn step(&self, direction: i32) -> Result<i32> {
        self.step_frames(direction * self.step_size())
    }

    /// Jog wheel: direction follows the value change, size follows the modifiers
    ///
    /// A value at the top of the range always moves forward.
    pub fn time_control(&mut self, value: f32) -> Result<i32> {
        let size = if self.small_held {
            self.config.small_step
        } else if self.large_held {
            self.config.large_step
        } else {
            self.config.normal_step
        };
        let forward = value - self.last_jog > 0.0 || value >= 1.0;
        self.last_jog = value;
        self.step_frames(if forward { size } else { -size })
    }

    pub fn play_hold(&self, value: f32) -> Result<()> {
        self.sequencer
            .set_playing(value > self.config.trigger_threshold)
    }

    /// Move the range start to the current frame; `false` when current >= end
    pub fn set_start_to_current(&self) -> Result<bool> {
        let frame = self.current_frame()?;
        let range = self.sequencer.playback_range().ok_or(MapperError::NoOpenSequence)?;
        if frame >= range.end {
            debug!(frame, end = range.end, "Start not moved past end");
            return Ok(false);
        }
        self.sequencer.set_playback_range(FrameRange::new(frame, range.end))?;
        Ok(true)
    }

    /// Move the range end to the current frame; `false` when current <= start
    pub fn set_end_to_current(&self) -> Result<bool> {
        let frame = self.current_frame()?;
        let range = self.sequencer.playback_range().ok_or(MapperError::NoOpenSequence)?;
        if frame <= range.start {
            debug!(frame, start = range.start, "End not moved before start");
            return Ok(false);
        }
        self.sequencer.set_playback_range(FrameRange::new(range.start, frame))?;
        Ok(true)
    }

    /// Key the neutral value of every rig control at the current frame
    ///
    /// Bool controls are left alone. Returns the number of keys set.
    pub fn key_all_to_zero(&mut self, rig: &str) -> Result<usize> {
        let frame = self.current_frame()?;
        let mut keyed = 0;
        for control in self.sequencer.rig_controls(rig) {
            let Some(value) = KeyValue::neutral(control.kind) else {
                continue;
            };
            self.sequencer.key_control(rig, &control.name, frame, value)?;
            if let KeyValue::Float(v) = value {
                self.values.insert(control.name.clone(), v);
            }
            keyed += 1;
        }
        info!(rig, frame, keyed, "Keyed rig controls to neutral");
        Ok(keyed)
    }

    /// Key every float control of the rig with its last applied value (0 if untouched)
    pub fn key_all(&mut self, rig: &str) -> Result<usize> {
        let frame = self.current_frame()?;
        let mut keyed = 0;
        for control in self.sequencer.rig_controls(rig) {
            if control.kind != RigControlKind::Float {
                continue;
            }
            let value = self.values.get(&control.name).copied().unwrap_or(0.0);
            self.sequencer.key_control(rig, &control.name, frame, KeyValue::Float(value))?;
            keyed += 1;
        }
        info!(rig, frame, keyed, "Keyed all rig controls");
        Ok(keyed)
    }

    pub fn touch_control(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_string(), value);
        if !self.touched.iter().any(|t| t == name) {
            self.touched.push(name.to_string());
        }
    }

    pub fn last_touched(&self) -> &[String] {
        &self.touched
    }

    pub fn clear_last_touched(&mut self) {
        self.touched.clear();
    }

    /// Key each touched control's last value at the current frame
    pub fn key_last_touched(&mut self, rig: &str) -> Result<usize> {
        let frame = self.current_frame()?;
        let mut keyed = 0;
        for name in &self.touched {
            let value = self.values.get(name).copied().unwrap_or(0.0);
            self.sequencer.key_control(rig, name, frame, KeyValue::Float(value))?;
            keyed += 1;
        }
        info!(rig, frame, keyed, "Keyed last touched controls");
        Ok(keyed)
    }

    /// Drive a rig control from a MIDI value and key it at the current frame
    ///
    /// Returns the keyed value, or `None` when a toggle saw no press edge.
    pub fn apply_rig_control(
        &mut self,
        rig: &str,
        control: &str,
        value: f32,
        modus: Modus,
    ) -> Result<Option<f32>> {
        let frame = self.current_frame()?;
        let previous = self.values.get(control).copied().unwrap_or(0.0);

        let keyed = match modus {
            Modus::Absolute => value,
            Modus::Relative => previous + (value - RELATIVE_CENTER),
            Modus::Toggle => {
                let pressed = value > self.config.trigger_threshold;
                let was_pressed = self
                    .pressed
                    .insert(control.to_string(), pressed)
                    .unwrap_or(false);
                if !pressed || was_pressed {
                    return Ok(None);
                }
                if previous > 0.5 { 0.0 } else { 1.0 }
            }
        };

        self.sequencer.key_control(rig, control, frame, KeyValue::Float(keyed))?;
        self.touch_control(control, keyed);
        Ok(Some(keyed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RigConfig, RigControlConfig};
    use crate::sequencer::{ConsoleSequencer, LoadRequest};

    fn setup() -> (SequencerControl, Arc<ConsoleSequencer>) {
        let console = Arc::new(ConsoleSequencer::new("test", 100));
        console.set_rigs(&[RigConfig {
            name: "Face".to_string(),
            controls: vec![
                RigControlConfig { name: "Jaw".to_string(), kind: RigControlKind::Float },
                RigControlConfig { name: "Blink".to_string(), kind: RigControlKind::Bool },
                RigControlConfig { name: "Head".to_string(), kind: RigControlKind::Transform },
            ],
        }]);
        console
            .load_animation(&LoadRequest {
                animation: "/Game/Anims/Walk.Walk".to_string(),
                mesh: "/Game/Hero".to_string(),
                rig: "Face".to_string(),
            })
            .unwrap();
        let control = SequencerControl::new(console.clone(), SequencerConfig::default());
        (control, console)
    }

    #[test]
    fn test_step_size_table() {
        let (mut control, _) = setup();
        assert_eq!(control.step_size(), 5);
        control.set_small_held(1.0);
        assert_eq!(control.step_size(), 1);
        control.set_large_held(0.5);
        assert_eq!(control.step_size(), 20);
        control.set_small_held(0.49);
        assert_eq!(control.step_size(), 10);
    }

    #[test]
    fn test_step_moves_frame() {
        let (mut control, console) = setup();
        assert_eq!(control.step(1).unwrap(), 5);
        control.set_large_held(1.0);
        assert_eq!(control.step(-1).unwrap(), -5);
        assert_eq!(console.current_frame(), Some(-5));
    }

    #[test]
    fn test_time_control_direction() {
        let (mut control, console) = setup();
        assert_eq!(control.time_control(0.3).unwrap(), 5);
        assert_eq!(control.time_control(0.2).unwrap(), 0);
        // Top of range moves forward even without change
        assert_eq!(control.time_control(1.0).unwrap(), 5);
        assert_eq!(control.time_control(1.0).unwrap(), 10);
        control.set_small_held(1.0);
        control.set_large_held(1.0);
        // Jog uses small before large, never combined
        assert_eq!(control.time_control(0.5).unwrap(), 9);
        assert_eq!(console.current_frame(), Some(9));
    }

    #[test]
    fn test_playback_range_guards() {
        let (control, console) = setup();
        console.set_frame(10).unwrap();
        assert!(control.set_start_to_current().unwrap());
        assert_eq!(console.playback_range(), Some(FrameRange::new(10, 99)));

        console.set_frame(5).unwrap();
        assert!(!control.set_end_to_current().unwrap());
        console.set_frame(40).unwrap();
        assert!(control.set_end_to_current().unwrap());
        assert_eq!(console.playback_range(), Some(FrameRange::new(10, 40)));

        console.set_frame(40).unwrap();
        assert!(!control.set_start_to_current().unwrap());
    }

    #[test]
    fn test_play_hold() {
        let (control, console) = setup();
        control.play_hold(0.9).unwrap();
        assert!(console.is_playing());
        control.play_hold(0.0).unwrap();
        assert!(!console.is_playing());
    }

    #[test]
    fn test_key_all_to_zero_skips_bool() {
        let (mut control, console) = setup();
        assert_eq!(control.key_all_to_zero("Face").unwrap(), 2);
        let keys = console.keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.control != "Blink"));
    }

    #[test]
    fn test_rig_control_modes() {
        let (mut control, console) = setup();
        let mut apply = |name: &str, value: f32, modus: Modus| {
            control.apply_rig_control("Face", name, value, modus).unwrap()
        };
        assert_eq!(apply("Jaw", 0.8, Modus::Absolute), Some(0.8));

        let relative = apply("Jaw", 0.6, Modus::Relative).unwrap();
        assert!((relative - 0.9).abs() < 1e-6);

        assert_eq!(apply("Lid", 1.0, Modus::Toggle), Some(1.0));
        assert_eq!(apply("Lid", 1.0, Modus::Toggle), None);
        assert_eq!(apply("Lid", 0.0, Modus::Toggle), None);
        assert_eq!(apply("Lid", 1.0, Modus::Toggle), Some(0.0));

        assert_eq!(control.last_touched(), ["Jaw".to_string(), "Lid".to_string()]);
        assert_eq!(console.keys().len(), 2);
    }

    #[test]
    fn test_key_all_uses_last_values() {
        let (mut control, console) = setup();
        control.apply_rig_control("Face", "Jaw", 0.4, Modus::Absolute).unwrap();
        console.set_frame(3).unwrap();
        assert_eq!(control.key_all("Face").unwrap(), 1);
        let key = console.keys().into_iter().find(|k| k.frame == 3).unwrap();
        assert_eq!(key.value, KeyValue::Float(0.4));
    }

    #[test]
    fn test_key_last_touched() {
        let (mut control, console) = setup();
        control.touch_control("Jaw", 0.25);
        control.touch_control("Brow", 0.75);
        console.set_frame(7).unwrap();

        assert_eq!(control.key_last_touched("Face").unwrap(), 2);
        let keys = console.keys();
        assert!(keys.iter().all(|k| k.frame == 7));
        control.clear_last_touched();
        assert!(control.last_touched().is_empty());
    }

    #[test]
    fn test_no_open_sequence() {
        let console = Arc::new(ConsoleSequencer::new("empty", 100));
        let mut control = SequencerControl::new(console, SequencerConfig::default());
        assert!(matches!(control.step(1), Err(MapperError::NoOpenSequence)));
        assert!(matches!(control.time_control(1.0), Err(MapperError::NoOpenSequence)));
        assert!(matches!(control.key_all_to_zero("Face"), Err(MapperError::NoOpenSequence)));
    }
}
