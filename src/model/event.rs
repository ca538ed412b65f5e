use crate::codec::vlq;
use crate::error::{MidiError, Result};
use serde::{Deserialize, Serialize};

/// Sign applied to the accidental count of a key signature.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccidentalType {
    Sharps,
    Flats,
}

impl AccidentalType {
    pub fn sign(self) -> i8 {
        match self {
            AccidentalType::Sharps => 1,
            AccidentalType::Flats => -1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    pub fn as_byte(self) -> u8 {
        match self {
            Mode::Major => 0,
            Mode::Minor => 1,
        }
    }
}

/// A single message as it appears on the wire, minus its delta time.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    NoteOn {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    Tempo {
        micros_per_quarter: u32,
    },
    Copyright {
        notice: Vec<u8>,
    },
    Text {
        text: Vec<u8>,
    },
    KeySignature {
        accidentals: u8,
        accidental_type: AccidentalType,
        mode: Mode,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    SysEx {
        manufacturer_id: u8,
        payload: Vec<u8>,
    },
    UniversalSysEx {
        real_time: bool,
        sysex_channel: u8,
        code: u8,
        subcode: u8,
        payload: Vec<u8>,
    },
    Controller {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ChannelPressure {
        channel: u8,
        pressure: u8,
    },
    PitchWheel {
        channel: u8,
        value: i16,
    },
    TrackName {
        name: Vec<u8>,
    },
    TimeSignature {
        numerator: u8,
        denominator: u8,
        clocks_per_tick: u8,
        notes_per_quarter: u8,
    },
}

impl Message {
    /// Tie-break between messages sharing a tick; lower values are written first.
    ///
    /// Names and time signatures lead, a NoteOff always precedes a NoteOn so that a note
    /// ending at `t` is released before one starting at `t` sounds.
    pub fn precedence(&self) -> u8 {
        match self {
            Message::TrackName { .. } | Message::TimeSignature { .. } => 0,
            Message::NoteOff { .. } => 2,
            Message::NoteOn { .. } | Message::Tempo { .. } => 3,
            _ => 1,
        }
    }

    /// Whether `other` at the same time would duplicate this message.
    ///
    /// Controller, SysEx and Universal SysEx messages are never duplicates: repeated
    /// identical sends can be intentional. Text, copyright, key and time signatures,
    /// channel pressure and pitch wheel only match when their whole payload is equal, so
    /// two different texts at one time both survive.
    pub fn is_duplicate_of(&self, other: &Message) -> bool {
        use Message::*;

        match (self, other) {
            (
                NoteOn { channel, pitch, .. },
                NoteOn {
                    channel: c,
                    pitch: p,
                    ..
                },
            )
            | (
                NoteOff { channel, pitch, .. },
                NoteOff {
                    channel: c,
                    pitch: p,
                    ..
                },
            ) => channel == c && pitch == p,
            (Tempo { micros_per_quarter }, Tempo { micros_per_quarter: m }) => {
                micros_per_quarter == m
            }
            (ProgramChange { channel, program }, ProgramChange { channel: c, program: p }) => {
                channel == c && program == p
            }
            (TrackName { name }, TrackName { name: n }) => name == n,
            (Controller { .. }, _) | (SysEx { .. }, _) | (UniversalSysEx { .. }, _) => false,
            (Copyright { .. }, Copyright { .. })
            | (Text { .. }, Text { .. })
            | (KeySignature { .. }, KeySignature { .. })
            | (ChannelPressure { .. }, ChannelPressure { .. })
            | (PitchWheel { .. }, PitchWheel { .. })
            | (TimeSignature { .. }, TimeSignature { .. }) => self == other,
            _ => false,
        }
    }

    /// Append the status byte(s) and data of this message to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Message::NoteOn {
                channel,
                pitch,
                velocity,
            } => out.extend_from_slice(&[0x90 | *channel, *pitch, *velocity]),
            Message::NoteOff {
                channel,
                pitch,
                velocity,
            } => out.extend_from_slice(&[0x80 | *channel, *pitch, *velocity]),
            Message::Tempo { micros_per_quarter } => {
                let [_, b2, b1, b0] = micros_per_quarter.to_be_bytes();
                out.extend_from_slice(&[0xFF, 0x51, 0x03, b2, b1, b0]);
            }
            Message::Copyright { notice } => encode_meta_text(0x02, notice, out)?,
            Message::Text { text } => encode_meta_text(0x01, text, out)?,
            Message::TrackName { name } => encode_meta_text(0x03, name, out)?,
            Message::KeySignature {
                accidentals,
                accidental_type,
                mode,
            } => {
                let sharps_or_flats = (*accidentals as i8) * accidental_type.sign();
                out.extend_from_slice(&[
                    0xFF,
                    0x59,
                    0x02,
                    sharps_or_flats as u8,
                    mode.as_byte(),
                ]);
            }
            Message::TimeSignature {
                numerator,
                denominator,
                clocks_per_tick,
                notes_per_quarter,
            } => out.extend_from_slice(&[
                0xFF,
                0x58,
                0x04,
                *numerator,
                *denominator,
                *clocks_per_tick,
                *notes_per_quarter,
            ]),
            Message::ProgramChange { channel, program } => {
                out.extend_from_slice(&[0xC0 | *channel, *program])
            }
            Message::Controller {
                channel,
                controller,
                value,
            } => out.extend_from_slice(&[0xB0 | *channel, *controller, *value]),
            Message::ChannelPressure { channel, pressure } => {
                out.extend_from_slice(&[0xD0 | *channel, *pressure])
            }
            Message::PitchWheel { channel, value } => {
                let centered = (i32::from(*value) + 8192).clamp(0, 0x3FFF) as u16;
                out.extend_from_slice(&[
                    0xE0 | *channel,
                    (centered & 0x7F) as u8,
                    (centered >> 7) as u8,
                ]);
            }
            Message::SysEx {
                manufacturer_id,
                payload,
            } => {
                out.push(0xF0);
                vlq::encode_len_into(payload.len() + 2, out)?;
                out.push(*manufacturer_id);
                out.extend_from_slice(payload);
                out.push(0xF7);
            }
            Message::UniversalSysEx {
                real_time,
                sysex_channel,
                code,
                subcode,
                payload,
            } => {
                out.push(0xF0);
                vlq::encode_len_into(payload.len() + 5, out)?;
                out.push(if *real_time { 0x7F } else { 0x7E });
                out.extend_from_slice(&[*sysex_channel, *code, *subcode]);
                out.extend_from_slice(payload);
                out.push(0xF7);
            }
        }

        Ok(())
    }
}

fn encode_meta_text(subcode: u8, bytes: &[u8], out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&[0xFF, subcode]);
    vlq::encode_len_into(bytes.len(), out)?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Encode `text` as ISO-8859-1, as meta-event strings are stored.
pub fn latin1(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| MidiError::NotLatin1 { ch }))
        .collect()
}

/// What the caller added: either a whole note or a single wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Note {
        channel: u8,
        pitch: u8,
        duration: f64,
        volume: u8,
    },
    Message(Message),
}

/// A logical event at a beat position, stamped with the order it was added in.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: f64,
    pub insertion_order: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: f64, insertion_order: u64, kind: EventKind) -> Self {
        Self {
            time,
            insertion_order,
            kind,
        }
    }

    pub fn is_duplicate_of(&self, other: &Event) -> bool {
        if self.time != other.time {
            return false;
        }

        match (&self.kind, &other.kind) {
            (
                EventKind::Note { channel, pitch, .. },
                EventKind::Note {
                    channel: c,
                    pitch: p,
                    ..
                },
            ) => channel == c && pitch == p,
            (EventKind::Message(a), EventKind::Message(b)) => a.is_duplicate_of(b),
            _ => false,
        }
    }

    /// Expand into wire events at absolute ticks; a note becomes a NoteOn/NoteOff pair.
    ///
    /// A note too short to span a tick releases after its own NoteOn, not before it.
    pub fn expand_into(&self, ticks_per_quarter: u16, out: &mut Vec<WireEvent>) {
        let tick = beats_to_ticks(self.time, ticks_per_quarter);

        match &self.kind {
            EventKind::Note {
                channel,
                pitch,
                duration,
                volume,
            } => {
                let off_tick = beats_to_ticks(self.time + duration, ticks_per_quarter);
                let release = Message::NoteOff {
                    channel: *channel,
                    pitch: *pitch,
                    velocity: *volume,
                };

                out.push(WireEvent::new(
                    tick,
                    self.insertion_order,
                    Message::NoteOn {
                        channel: *channel,
                        pitch: *pitch,
                        velocity: *volume,
                    },
                ));

                let mut off = WireEvent::new(off_tick, self.insertion_order, release);
                if off_tick == tick {
                    off.precedence = ZERO_LENGTH_RELEASE;
                }
                out.push(off);
            }
            EventKind::Message(message) => {
                out.push(WireEvent::new(tick, self.insertion_order, message.clone()))
            }
        }
    }

    /// Beat positions this event occupies (a note covers its start and end).
    pub fn beat_times(&self) -> impl Iterator<Item = f64> {
        let end = match &self.kind {
            EventKind::Note { duration, .. } => Some(self.time + duration),
            EventKind::Message(_) => None,
        };

        std::iter::once(self.time).chain(end)
    }
}

/// Precedence of the NoteOff of a note that starts and ends on the same tick: after
/// every NoteOn, so the pair stays on-then-off.
const ZERO_LENGTH_RELEASE: u8 = 4;

/// A wire message pinned to an absolute tick.
#[derive(Debug, Clone, PartialEq)]
pub struct WireEvent {
    pub tick: i64,
    pub insertion_order: u64,
    /// Tie-break among events on the same tick, see [`Message::precedence`].
    pub precedence: u8,
    pub message: Message,
}

impl WireEvent {
    pub fn new(tick: i64, insertion_order: u64, message: Message) -> Self {
        Self {
            tick,
            insertion_order,
            precedence: message.precedence(),
            message,
        }
    }

    /// `(tick, precedence, insertion order)`: the total order events are written in.
    pub fn sort_key(&self) -> (i64, u8, u64) {
        (self.tick, self.precedence, self.insertion_order)
    }
}

pub fn beats_to_ticks(beats: f64, ticks_per_quarter: u16) -> i64 {
    (beats * f64::from(ticks_per_quarter)).round() as i64
}

/// Whether converting `beats` to ticks discards a fraction of a tick.
pub fn loses_precision(beats: f64, ticks_per_quarter: u16) -> bool {
    let exact = beats * f64::from(ticks_per_quarter);
    (exact - exact.round()).abs() > 1e-6
}

#[cfg(test)]
mod test {
    use super::*;

    fn encoded(message: &Message) -> Vec<u8> {
        let mut out = Vec::new();
        message.encode_into(&mut out).unwrap();
        out
    }

    fn note(time: f64, pitch: u8, duration: f64, order: u64) -> Event {
        Event::new(
            time,
            order,
            EventKind::Note {
                channel: 0,
                pitch,
                duration,
                volume: 100,
            },
        )
    }

    #[test]
    fn channel_message_layouts() {
        let on = Message::NoteOn {
            channel: 3,
            pitch: 60,
            velocity: 100,
        };
        let off = Message::NoteOff {
            channel: 3,
            pitch: 60,
            velocity: 100,
        };
        assert_eq!(encoded(&on), vec![0x93, 60, 100]);
        assert_eq!(encoded(&off), vec![0x83, 60, 100]);
        assert_eq!(
            encoded(&Message::ProgramChange {
                channel: 0,
                program: 10
            }),
            vec![0xC0, 10]
        );
        assert_eq!(
            encoded(&Message::Controller {
                channel: 3,
                controller: 1,
                value: 2
            }),
            vec![0xB3, 1, 2]
        );
        assert_eq!(
            encoded(&Message::ChannelPressure {
                channel: 0,
                pressure: 10
            }),
            vec![0xD0, 10]
        );
    }

    #[test]
    fn pitch_wheel_is_centered() {
        let up = Message::PitchWheel {
            channel: 0,
            value: 1000,
        };
        let down = Message::PitchWheel {
            channel: 1,
            value: -1000,
        };
        assert_eq!(encoded(&up), vec![0xE0, (9192 & 0x7F) as u8, (9192 >> 7) as u8]);
        assert_eq!(encoded(&down), vec![0xE1, (7192 & 0x7F) as u8, (7192 >> 7) as u8]);
        assert_eq!(
            encoded(&Message::PitchWheel {
                channel: 0,
                value: 0
            }),
            vec![0xE0, 0x00, 0x40]
        );
    }

    #[test]
    fn pitch_wheel_out_of_range_stays_seven_bit() {
        let high = encoded(&Message::PitchWheel {
            channel: 0,
            value: i16::MAX,
        });
        let low = encoded(&Message::PitchWheel {
            channel: 0,
            value: i16::MIN,
        });

        assert_eq!(high, vec![0xE0, 0x7F, 0x7F]);
        assert_eq!(low, vec![0xE0, 0x00, 0x00]);
    }

    #[test]
    fn meta_layouts() {
        assert_eq!(
            encoded(&Message::Tempo {
                micros_per_quarter: 1_000_000
            }),
            vec![0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40]
        );
        assert_eq!(
            encoded(&Message::TimeSignature {
                numerator: 4,
                denominator: 2,
                clocks_per_tick: 24,
                notes_per_quarter: 8
            }),
            vec![0xFF, 0x58, 0x04, 4, 2, 24, 8]
        );
        assert_eq!(
            encoded(&Message::KeySignature {
                accidentals: 3,
                accidental_type: AccidentalType::Flats,
                mode: Mode::Minor
            }),
            vec![0xFF, 0x59, 0x02, 0xFD, 0x01]
        );
        assert_eq!(
            encoded(&Message::TrackName {
                name: b"track".to_vec()
            }),
            [&[0xFF, 0x03, 0x05][..], &b"track"[..]].concat()
        );
        assert_eq!(
            encoded(&Message::Copyright {
                notice: b"2016(C) MCW".to_vec()
            })[..3],
            [0xFF, 0x02, 11]
        );
    }

    #[test]
    fn long_text_uses_multi_byte_length() {
        let name = "long track name ".repeat(8);
        let bytes = encoded(&Message::TrackName {
            name: latin1(&name).unwrap(),
        });
        assert_eq!(&bytes[..4], &[0xFF, 0x03, 0x81, 0x00]);
        assert_eq!(bytes.len(), 4 + 128);
    }

    #[test]
    fn sysex_framing() {
        assert_eq!(
            encoded(&Message::SysEx {
                manufacturer_id: 0,
                payload: vec![0x01]
            }),
            vec![0xF0, 3, 0x00, 0x01, 0xF7]
        );
        assert_eq!(
            encoded(&Message::UniversalSysEx {
                real_time: false,
                sysex_channel: 0x7F,
                code: 1,
                subcode: 2,
                payload: vec![42]
            }),
            vec![0xF0, 6, 0x7E, 0x7F, 1, 2, 42, 0xF7]
        );
    }

    #[test]
    fn latin1_rejects_wide_characters() {
        assert_eq!(latin1("café").unwrap(), vec![b'c', b'a', b'f', 0xE9]);
        assert!(matches!(latin1("♩"), Err(MidiError::NotLatin1 { ch: '♩' })));
    }

    #[test]
    fn note_off_sorts_before_note_on() {
        let off = Message::NoteOff {
            channel: 0,
            pitch: 60,
            velocity: 0,
        };
        let on = Message::NoteOn {
            channel: 0,
            pitch: 60,
            velocity: 0,
        };
        let name = Message::TrackName { name: Vec::new() };
        let program = Message::ProgramChange {
            channel: 0,
            program: 0,
        };
        assert!(name.precedence() < program.precedence());
        assert!(program.precedence() < off.precedence());
        assert!(off.precedence() < on.precedence());
    }

    #[test]
    fn duplicate_rules() {
        assert!(note(0.0, 69, 1.0, 0).is_duplicate_of(&note(0.0, 69, 2.0, 1)));
        assert!(!note(0.0, 69, 1.0, 0).is_duplicate_of(&note(0.0, 70, 1.0, 1)));
        assert!(!note(0.0, 69, 1.0, 0).is_duplicate_of(&note(0.5, 69, 1.0, 1)));

        let sysex = |order| {
            Event::new(
                0.0,
                order,
                EventKind::Message(Message::SysEx {
                    manufacturer_id: 10,
                    payload: vec![1],
                }),
            )
        };
        assert!(!sysex(0).is_duplicate_of(&sysex(1)));

        let controller = Message::Controller {
            channel: 0,
            controller: 7,
            value: 100,
        };
        assert!(!controller.is_duplicate_of(&controller.clone()));

        let tempo = |micros_per_quarter| Message::Tempo { micros_per_quarter };
        assert!(tempo(500_000).is_duplicate_of(&tempo(500_000)));
        assert!(!tempo(500_000).is_duplicate_of(&tempo(750_000)));
    }

    #[test]
    fn note_expands_to_on_off_pair() {
        let mut wire = Vec::new();
        note(1.5, 60, 0.5, 7).expand_into(960, &mut wire);

        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].tick, 1440);
        assert!(matches!(wire[0].message, Message::NoteOn { pitch: 60, .. }));
        assert_eq!(wire[1].tick, 1920);
        assert!(matches!(wire[1].message, Message::NoteOff { pitch: 60, .. }));
        assert!(wire.iter().all(|w| w.insertion_order == 7));
    }

    #[test]
    fn zero_length_note_releases_after_its_own_note_on() {
        for duration in [0.0, 0.0001] {
            let mut wire = Vec::new();
            note(1.0, 60, duration, 3).expand_into(960, &mut wire);
            note(1.0, 64, 1.0, 4).expand_into(960, &mut wire);
            wire.sort_by_key(WireEvent::sort_key);

            let order: Vec<_> = wire
                .iter()
                .map(|w| match w.message {
                    Message::NoteOn { pitch, .. } => (w.tick, "on", pitch),
                    Message::NoteOff { pitch, .. } => (w.tick, "off", pitch),
                    _ => unreachable!(),
                })
                .collect();

            assert_eq!(
                order,
                vec![
                    (960, "on", 60),
                    (960, "on", 64),
                    (960, "off", 60),
                    (1920, "off", 64)
                ]
            );
        }
    }

    #[test]
    fn tick_rounding() {
        assert_eq!(beats_to_ticks(1.0 / 3.0, 100), 33);
        assert_eq!(beats_to_ticks(2.0 / 3.0, 100), 67);
        assert_eq!(beats_to_ticks(-5.0, 960), -4800);
        assert!(loses_precision(1.0 / 3.0, 100));
        assert!(!loses_precision(0.25, 960));
    }
}
