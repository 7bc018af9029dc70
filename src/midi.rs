//! MIDI channel-voice parsing
//!
//! Only the messages a control surface sends (notes, controllers, pitch bend,
//! pressure, program change) are decoded; system messages are ignored.

use std::fmt;

/// Channel-voice MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    ProgramChange { channel: u8, program: u8 },

    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },
}

impl MidiMessage {
    /// Parse a channel-voice message from raw bytes
    ///
    /// Running status and system messages return `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        let channel = status & 0x0F;
        let d1 = rest.first().map(|b| b & 0x7F);
        let d2 = rest.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff { channel, note: d1?, velocity: d2? }),
            0x90 => {
                let (note, velocity) = (d1?, d2?);
                // Note On with velocity 0 is a Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xA0 => Some(MidiMessage::PolyPressure { channel, note: d1?, pressure: d2? }),
            0xB0 => Some(MidiMessage::ControlChange { channel, cc: d1?, value: d2? }),
            0xC0 => Some(MidiMessage::ProgramChange { channel, program: d1? }),
            0xD0 => Some(MidiMessage::ChannelPressure { channel, pressure: d1? }),
            0xE0 => {
                let (lsb, msb) = (d1? as u16, d2? as u16);
                Some(MidiMessage::PitchBend { channel, value: (msb << 7) | lsb })
            }
            _ => None,
        }
    }

    /// Channel (0-15)
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => channel,
        }
    }

    /// Type tag used in control event ids (`IN:<device>:<TYPE>:<chan>:<num>`)
    ///
    /// Note On and Note Off share the `NOTE` tag so press and release address the
    /// same control.
    pub fn type_tag(&self) -> &'static str {
        match self {
            MidiMessage::NoteOff { .. } | MidiMessage::NoteOn { .. } => "NOTE",
            MidiMessage::PolyPressure { .. } => "POLYAT",
            MidiMessage::ControlChange { .. } => "CC",
            MidiMessage::ProgramChange { .. } => "PC",
            MidiMessage::ChannelPressure { .. } => "AT",
            MidiMessage::PitchBend { .. } => "PB",
        }
    }

    /// Control number addressed by this message (0 for per-channel messages)
    pub fn control_number(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { note, .. }
            | MidiMessage::NoteOn { note, .. }
            | MidiMessage::PolyPressure { note, .. } => note,
            MidiMessage::ControlChange { cc, .. } => cc,
            MidiMessage::ProgramChange { program, .. } => program,
            MidiMessage::ChannelPressure { .. } | MidiMessage::PitchBend { .. } => 0,
        }
    }

    /// Value normalized into `0.0..=1.0`
    pub fn normalized_value(&self) -> f32 {
        match *self {
            MidiMessage::NoteOff { .. } => 0.0,
            MidiMessage::NoteOn { velocity, .. } => convert::norm_7bit(velocity),
            MidiMessage::PolyPressure { pressure, .. }
            | MidiMessage::ChannelPressure { pressure, .. } => convert::norm_7bit(pressure),
            MidiMessage::ControlChange { value, .. } => convert::norm_7bit(value),
            // Program changes behave like buttons
            MidiMessage::ProgramChange { .. } => 1.0,
            MidiMessage::PitchBend { value, .. } => convert::norm_14bit(value),
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                write!(f, "PolyPressure ch:{} n:{} p:{}", channel + 1, note, pressure)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
        }
    }
}

/// MIDI value conversion utilities
pub mod convert {
    /// 7-bit value (0-127) to `0.0..=1.0`
    pub fn norm_7bit(value: u8) -> f32 {
        (value.min(127) as f32) / 127.0
    }

    /// 14-bit value (0-16383) to `0.0..=1.0`
    pub fn norm_14bit(value: u16) -> f32 {
        (value.min(16383) as f32) / 16383.0
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let msg = MidiMessage::parse(&[0x90, 60, 100]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOn { channel: 0, note: 60, velocity: 100 });
        assert_eq!(msg.type_tag(), "NOTE");
        assert_eq!(msg.control_number(), 60);
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = MidiMessage::parse(&[0x90, 60, 0]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOff { channel: 0, note: 60, velocity: 0 });
        assert_eq!(msg.normalized_value(), 0.0);
    }

    #[test]
    fn test_control_change() {
        let msg = MidiMessage::parse(&[0xB2, 7, 127]).unwrap();
        assert_eq!(msg, MidiMessage::ControlChange { channel: 2, cc: 7, value: 127 });
        assert_eq!(msg.channel(), 2);
        assert_eq!(msg.normalized_value(), 1.0);
    }

    #[test]
    fn test_pitch_bend() {
        let msg = MidiMessage::parse(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(msg, MidiMessage::PitchBend { channel: 0, value: 8192 });
        assert_eq!(msg.type_tag(), "PB");
        assert!((msg.normalized_value() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_truncated_and_system_messages_are_ignored() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0x40, 7, 1]), None);
        assert_eq!(MidiMessage::parse(&[0xF8]), None);
        assert_eq!(MidiMessage::parse(&[0xF0, 0x00, 0xF7]), None);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xB0, 0x07, 0x7F]), "B0 07 7F");
    }
}
