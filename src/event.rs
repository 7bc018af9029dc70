//! Control events delivered by MIDI input devices

use crate::midi::MidiMessage;
use std::fmt;

/// Prefix of input event ids
pub const INPUT_PREFIX: &str = "IN";

/// One normalized control event
///
/// `id` has the form `IN:<Device>:<TYPE>:<Channel>:<Number>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    pub device: String,
    pub id: String,
    /// Normalized value (0.0..=1.0)
    pub value: f32,
    pub label: String,
}

impl ControlEvent {
    pub fn new(
        device: impl Into<String>,
        id: impl Into<String>,
        value: f32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            id: id.into(),
            value,
            label: label.into(),
        }
    }

    /// Build the event id for a device, message type, channel and control number
    pub fn format_id(device: &str, type_tag: &str, channel: u8, number: u8) -> String {
        format!("{}:{}:{}:{}:{}", INPUT_PREFIX, device, type_tag, channel, number)
    }

    /// Convert a parsed MIDI message into a control event
    ///
    /// Only Control Change, Note On/Off and Pitch Bend produce events.
    pub fn from_midi(device: &str, msg: &MidiMessage) -> Option<Self> {
        match msg {
            MidiMessage::ControlChange { .. }
            | MidiMessage::NoteOn { .. }
            | MidiMessage::NoteOff { .. }
            | MidiMessage::PitchBend { .. } => {}
            _ => return None,
        }

        let id = Self::format_id(device, msg.type_tag(), msg.channel(), msg.control_number());
        Some(Self::new(device, id, msg.normalized_value(), msg.to_string()))
    }

    /// Control id: the 5th `:`-separated field of the event id
    ///
    /// Returns `None` for short ids, non-numeric fields and negative numbers.
    pub fn control_id(&self) -> Option<i32> {
        let field = self.id.split(':').nth(4)?;
        match field.trim().parse::<i32>() {
            Ok(n) if n >= 0 => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:.3}", self.id, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_id_from_fifth_field() {
        let ev = ControlEvent::new("APC40", "IN:APC40:CC:0:48", 0.5, "");
        assert_eq!(ev.control_id(), Some(48));
    }

    #[test]
    fn test_malformed_ids_have_no_control_id() {
        for id in ["IN:APC40:CC:0", "IN:APC40:CC:0:abc", "IN:APC40:CC:0:-3", ""] {
            let ev = ControlEvent::new("APC40", id, 1.0, "");
            assert_eq!(ev.control_id(), None, "id {:?}", id);
        }
    }

    #[test]
    fn test_from_midi_control_change() {
        let msg = MidiMessage::ControlChange { channel: 1, cc: 21, value: 127 };
        let ev = ControlEvent::from_midi("nanoKONTROL2", &msg).unwrap();
        assert_eq!(ev.id, "IN:nanoKONTROL2:CC:1:21");
        assert_eq!(ev.device, "nanoKONTROL2");
        assert_eq!(ev.value, 1.0);
        assert_eq!(ev.control_id(), Some(21));
    }

    #[test]
    fn test_from_midi_note_press_and_release_share_id() {
        let note_on = MidiMessage::NoteOn { channel: 0, note: 36, velocity: 127 };
        let note_off = MidiMessage::NoteOff { channel: 0, note: 36, velocity: 64 };
        let on = ControlEvent::from_midi("Pad", &note_on).unwrap();
        let off = ControlEvent::from_midi("Pad", &note_off).unwrap();
        assert_eq!(on.id, off.id);
        assert_eq!(on.value, 1.0);
        assert_eq!(off.value, 0.0);
    }

    #[test]
    fn test_from_midi_ignores_other_messages() {
        let msg = MidiMessage::ProgramChange { channel: 0, program: 3 };
        assert!(ControlEvent::from_midi("Pad", &msg).is_none());
    }
}
