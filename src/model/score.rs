use crate::error::Result;
use crate::midi_file::MidiFile;
use crate::model::config::MidiFileOptions;
use crate::model::event::{AccidentalType, Mode};
use log::debug;
use serde::{Deserialize, Serialize};

fn default_volume() -> u8 {
    100
}

fn default_clocks_per_tick() -> u8 {
    24
}

fn default_notes_per_quarter() -> u8 {
    8
}

fn default_sysex_channel() -> u8 {
    0x7F
}

fn default_true() -> bool {
    true
}

/// One event of a score track. Times and durations are in beats.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreEvent {
    Note {
        #[serde(default)]
        channel: u8,
        pitch: u8,
        #[serde(default)]
        time: f64,
        duration: f64,
        #[serde(default = "default_volume")]
        volume: u8,
    },
    Tempo {
        #[serde(default)]
        time: f64,
        bpm: f64,
    },
    TimeSignature {
        #[serde(default)]
        time: f64,
        numerator: u8,
        /// Power of two: 2 is a quarter note, 3 an eighth.
        denominator: u8,
        #[serde(default = "default_clocks_per_tick")]
        clocks_per_tick: u8,
        #[serde(default = "default_notes_per_quarter")]
        notes_per_quarter: u8,
    },
    KeySignature {
        #[serde(default)]
        time: f64,
        accidentals: u8,
        accidental_type: AccidentalType,
        mode: Mode,
    },
    Text {
        #[serde(default)]
        time: f64,
        text: String,
    },
    Copyright {
        #[serde(default)]
        time: f64,
        notice: String,
    },
    ProgramChange {
        #[serde(default)]
        channel: u8,
        #[serde(default)]
        time: f64,
        program: u8,
    },
    Controller {
        #[serde(default)]
        channel: u8,
        #[serde(default)]
        time: f64,
        controller: u8,
        value: u8,
    },
    ChannelPressure {
        #[serde(default)]
        channel: u8,
        #[serde(default)]
        time: f64,
        pressure: u8,
    },
    PitchWheel {
        #[serde(default)]
        channel: u8,
        #[serde(default)]
        time: f64,
        value: i16,
    },
    Sysex {
        #[serde(default)]
        time: f64,
        manufacturer_id: u8,
        payload: Vec<u8>,
    },
    UniversalSysex {
        #[serde(default)]
        time: f64,
        code: u8,
        subcode: u8,
        payload: Vec<u8>,
        #[serde(default = "default_sysex_channel")]
        sysex_channel: u8,
        #[serde(default = "default_true")]
        real_time: bool,
    },
    Rpn {
        #[serde(default)]
        channel: u8,
        #[serde(default)]
        time: f64,
        controller_msb: u8,
        controller_lsb: u8,
        data_msb: u8,
        #[serde(default)]
        data_lsb: Option<u8>,
        #[serde(default)]
        time_order: bool,
    },
    Nrpn {
        #[serde(default)]
        channel: u8,
        #[serde(default)]
        time: f64,
        controller_msb: u8,
        controller_lsb: u8,
        data_msb: u8,
        #[serde(default)]
        data_lsb: Option<u8>,
        #[serde(default)]
        time_order: bool,
    },
    /// `(note, frequency in Hz)` pairs, sent as a single note tuning change at time 0.
    NoteTuning {
        tunings: Vec<(u8, f64)>,
        #[serde(default = "default_sysex_channel")]
        sysex_channel: u8,
        #[serde(default = "default_true")]
        real_time: bool,
        #[serde(default)]
        program: u8,
    },
}

impl ScoreEvent {
    /// Add this event to caller track `track` of `midi`.
    pub fn apply(&self, midi: &mut MidiFile, track: usize) -> Result<()> {
        match self {
            ScoreEvent::Note {
                channel,
                pitch,
                time,
                duration,
                volume,
            } => midi.add_note(track, *channel, *pitch, *time, *duration, *volume),
            ScoreEvent::Tempo { time, bpm } => midi.add_tempo(track, *time, *bpm),
            ScoreEvent::TimeSignature {
                time,
                numerator,
                denominator,
                clocks_per_tick,
                notes_per_quarter,
            } => midi.add_time_signature(
                track,
                *time,
                *numerator,
                *denominator,
                *clocks_per_tick,
                *notes_per_quarter,
            ),
            ScoreEvent::KeySignature {
                time,
                accidentals,
                accidental_type,
                mode,
            } => midi.add_key_signature(track, *time, *accidentals, *accidental_type, *mode),
            ScoreEvent::Text { time, text } => midi.add_text(track, *time, text),
            ScoreEvent::Copyright { time, notice } => midi.add_copyright(track, *time, notice),
            ScoreEvent::ProgramChange {
                channel,
                time,
                program,
            } => midi.add_program_change(track, *channel, *time, *program),
            ScoreEvent::Controller {
                channel,
                time,
                controller,
                value,
            } => midi.add_controller_event(track, *channel, *time, *controller, *value),
            ScoreEvent::ChannelPressure {
                channel,
                time,
                pressure,
            } => midi.add_channel_pressure(track, *channel, *time, *pressure),
            ScoreEvent::PitchWheel {
                channel,
                time,
                value,
            } => midi.add_pitch_wheel_event(track, *channel, *time, *value),
            ScoreEvent::Sysex {
                time,
                manufacturer_id,
                payload,
            } => midi.add_sysex(track, *time, *manufacturer_id, payload),
            ScoreEvent::UniversalSysex {
                time,
                code,
                subcode,
                payload,
                sysex_channel,
                real_time,
            } => midi.add_universal_sysex(
                track,
                *time,
                *code,
                *subcode,
                payload,
                *sysex_channel,
                *real_time,
            ),
            ScoreEvent::Rpn {
                channel,
                time,
                controller_msb,
                controller_lsb,
                data_msb,
                data_lsb,
                time_order,
            } => midi.make_rpn_call(
                track,
                *channel,
                *time,
                *controller_msb,
                *controller_lsb,
                *data_msb,
                *data_lsb,
                *time_order,
            ),
            ScoreEvent::Nrpn {
                channel,
                time,
                controller_msb,
                controller_lsb,
                data_msb,
                data_lsb,
                time_order,
            } => midi.make_nrpn_call(
                track,
                *channel,
                *time,
                *controller_msb,
                *controller_lsb,
                *data_msb,
                *data_lsb,
                *time_order,
            ),
            ScoreEvent::NoteTuning {
                tunings,
                sysex_channel,
                real_time,
                program,
            } => midi.change_note_tuning(track, tunings, *sysex_channel, *real_time, *program),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScoreTrack {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub events: Vec<ScoreEvent>,
}

/// A piece described as data. The track count in `options` is taken from `tracks`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Score {
    #[serde(default)]
    pub options: MidiFileOptions,
    pub tracks: Vec<ScoreTrack>,
}

impl Score {
    /// Build a [`MidiFile`] holding every event of the score. The file is left open.
    pub fn render(&self) -> Result<MidiFile> {
        let options = MidiFileOptions {
            num_tracks: self.tracks.len(),
            ..self.options
        };

        let mut midi = MidiFile::new(options)?;
        for (index, track) in self.tracks.iter().enumerate() {
            if let Some(name) = &track.name {
                midi.add_track_name(index, 0.0, name)?;
            }

            for event in &track.events {
                event.apply(&mut midi, index)?;
            }

            debug!(
                "Rendered track {} ({} event(s))",
                track.name.as_deref().unwrap_or("<unnamed>"),
                track.events.len()
            );
        }

        Ok(midi)
    }
}
