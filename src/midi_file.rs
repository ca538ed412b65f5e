use crate::codec::frequency_to_bytes;
use crate::codec::vlq::MAX_VLQ;
use crate::engine::Track;
use crate::error::{MidiError, Result, check_range};
use crate::model::config::{FileFormat, MidiFileOptions};
use crate::model::event::{AccidentalType, Event, EventKind, Message, Mode, latin1};
use log::{debug, info};
use std::io::Write;

const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
const MAX_MICROS_PER_QUARTER: f64 = 0xFF_FFFF as f64;

// Registered / non-registered parameter number controllers.
const CC_RPN_MSB: u8 = 101;
const CC_RPN_LSB: u8 = 100;
const CC_NRPN_MSB: u8 = 99;
const CC_NRPN_LSB: u8 = 98;
const CC_DATA_ENTRY_MSB: u8 = 6;
const CC_DATA_ENTRY_LSB: u8 = 38;

/// A multi-track Standard MIDI File under construction.
///
/// Events may be added in any order and at any beat time, including fractional and
/// negative ones. [`MidiFile::close`] orders and serializes every track; after that the
/// file is immutable and [`MidiFile::write`] only copies out the finished bytes.
///
/// In a format 1 file, internal track 0 is a conductor track that receives every tempo
/// and time signature; caller track `n` is internal track `n + 1`.
#[derive(Debug, Clone)]
pub struct MidiFile {
    options: MidiFileOptions,
    tracks: Vec<Track>,
    /// Stamped onto every added event so same-time events keep the order they were added in.
    event_counter: u64,
    closed: bool,
}

impl MidiFile {
    pub fn new(options: MidiFileOptions) -> Result<Self> {
        options.validate()?;

        let total = options.num_tracks + options.file_format.hidden_tracks();
        let tracks = (0..total)
            .map(|_| {
                Track::new(
                    options.remove_duplicates,
                    options.deinterleave,
                    options.ticks_per_quarter,
                )
            })
            .collect();

        debug!(
            "New MIDI file: format {}, {} track(s) ({} in header), {} ticks per quarter",
            options.file_format.as_u16(),
            options.num_tracks,
            total,
            options.ticks_per_quarter
        );

        Ok(Self {
            options,
            tracks,
            event_counter: 0,
            closed: false,
        })
    }

    pub fn options(&self) -> &MidiFileOptions {
        &self.options
    }

    /// Every track in file order, including the format 1 conductor track.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn caller_track(&self, track: usize) -> Result<usize> {
        if track >= self.options.num_tracks {
            return Err(MidiError::TrackOutOfRange {
                track,
                tracks: self.options.num_tracks,
            });
        }

        Ok(track + self.options.file_format.hidden_tracks())
    }

    /// Tempo and time signature target: the conductor track in format 1, else the caller's.
    fn conductor_track(&self, track: usize) -> Result<usize> {
        let internal = self.caller_track(track)?;
        Ok(match self.options.file_format {
            FileFormat::Multi => 0,
            FileFormat::Single | FileFormat::Sequential => internal,
        })
    }

    fn push(&mut self, internal: usize, time: f64, kind: EventKind) -> Result<()> {
        if self.closed {
            return Err(MidiError::Closed);
        }

        if !time.is_finite() {
            return Err(MidiError::InvalidTime { time });
        }

        let event = Event::new(time, self.event_counter, kind);
        self.tracks[internal].push(event)?;
        self.event_counter += 1;

        Ok(())
    }

    fn push_message(&mut self, internal: usize, time: f64, message: Message) -> Result<()> {
        self.push(internal, time, EventKind::Message(message))
    }

    /// Add a note of `duration` beats starting at `time` beats.
    pub fn add_note(
        &mut self,
        track: usize,
        channel: u8,
        pitch: u8,
        time: f64,
        duration: f64,
        volume: u8,
    ) -> Result<()> {
        check_channel(channel)?;
        check_data("pitch", pitch)?;
        check_data("volume", volume)?;

        if !duration.is_finite() || duration < 0.0 {
            return Err(MidiError::InvalidTime { time: duration });
        }

        let internal = self.caller_track(track)?;
        self.push(
            internal,
            time,
            EventKind::Note {
                channel,
                pitch,
                duration,
                volume,
            },
        )
    }

    pub fn add_track_name(&mut self, track: usize, time: f64, name: &str) -> Result<()> {
        let name = latin1(name)?;
        check_len(name.len())?;

        let internal = self.caller_track(track)?;
        self.push_message(internal, time, Message::TrackName { name })
    }

    /// Add a time signature. `denominator` is a power of two (2 = quarter, 3 = eighth) and
    /// `clocks_per_tick` counts MIDI clocks (24 per quarter) per metronome click.
    pub fn add_time_signature(
        &mut self,
        track: usize,
        time: f64,
        numerator: u8,
        denominator: u8,
        clocks_per_tick: u8,
        notes_per_quarter: u8,
    ) -> Result<()> {
        let internal = self.conductor_track(track)?;
        self.push_message(
            internal,
            time,
            Message::TimeSignature {
                numerator,
                denominator,
                clocks_per_tick,
                notes_per_quarter,
            },
        )
    }

    /// Add a tempo change in beats per minute.
    pub fn add_tempo(&mut self, track: usize, time: f64, bpm: f64) -> Result<()> {
        let micros = MICROSECONDS_PER_MINUTE / bpm;
        if !bpm.is_finite() || bpm <= 0.0 || !(0.5..=MAX_MICROS_PER_QUARTER).contains(&micros) {
            return Err(MidiError::InvalidTempo { bpm });
        }

        let internal = self.conductor_track(track)?;
        self.push_message(
            internal,
            time,
            Message::Tempo {
                micros_per_quarter: micros.round() as u32,
            },
        )
    }

    pub fn add_copyright(&mut self, track: usize, time: f64, notice: &str) -> Result<()> {
        let notice = latin1(notice)?;
        check_len(notice.len())?;

        let internal = self.caller_track(track)?;
        self.push_message(internal, time, Message::Copyright { notice })
    }

    pub fn add_text(&mut self, track: usize, time: f64, text: &str) -> Result<()> {
        let text = latin1(text)?;
        check_len(text.len())?;

        let internal = self.caller_track(track)?;
        self.push_message(internal, time, Message::Text { text })
    }

    pub fn add_key_signature(
        &mut self,
        track: usize,
        time: f64,
        accidentals: u8,
        accidental_type: AccidentalType,
        mode: Mode,
    ) -> Result<()> {
        check_range("accidentals", i64::from(accidentals), 7)?;

        let internal = self.caller_track(track)?;
        self.push_message(
            internal,
            time,
            Message::KeySignature {
                accidentals,
                accidental_type,
                mode,
            },
        )
    }

    pub fn add_program_change(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        program: u8,
    ) -> Result<()> {
        check_channel(channel)?;
        check_data("program", program)?;

        let internal = self.caller_track(track)?;
        self.push_message(internal, time, Message::ProgramChange { channel, program })
    }

    pub fn add_controller_event(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        controller: u8,
        parameter: u8,
    ) -> Result<()> {
        check_channel(channel)?;
        check_data("controller number", controller)?;
        check_data("controller value", parameter)?;

        let internal = self.caller_track(track)?;
        self.push_message(
            internal,
            time,
            Message::Controller {
                channel,
                controller,
                value: parameter,
            },
        )
    }

    pub fn add_channel_pressure(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        pressure: u8,
    ) -> Result<()> {
        check_channel(channel)?;
        check_data("pressure", pressure)?;

        let internal = self.caller_track(track)?;
        self.push_message(internal, time, Message::ChannelPressure { channel, pressure })
    }

    /// Add a pitch bend in `-8192..=8191`, where 0 is no bend.
    pub fn add_pitch_wheel_event(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        value: i16,
    ) -> Result<()> {
        check_channel(channel)?;
        check_range("pitch wheel value + 8192", i64::from(value) + 8192, 0x3FFF)?;

        let internal = self.caller_track(track)?;
        self.push_message(internal, time, Message::PitchWheel { channel, value })
    }

    /// Add a manufacturer-specific System Exclusive message. The payload is written as-is
    /// between the manufacturer ID and the closing `F7`.
    pub fn add_sysex(
        &mut self,
        track: usize,
        time: f64,
        manufacturer_id: u8,
        payload: &[u8],
    ) -> Result<()> {
        check_data("manufacturer ID", manufacturer_id)?;
        check_len(payload.len() + 2)?;

        let internal = self.caller_track(track)?;
        self.push_message(
            internal,
            time,
            Message::SysEx {
                manufacturer_id,
                payload: payload.to_vec(),
            },
        )
    }

    /// Add a Universal System Exclusive message (`7E` non-real-time or `7F` real-time).
    #[allow(clippy::too_many_arguments)]
    pub fn add_universal_sysex(
        &mut self,
        track: usize,
        time: f64,
        code: u8,
        subcode: u8,
        payload: &[u8],
        sysex_channel: u8,
        real_time: bool,
    ) -> Result<()> {
        check_data("SysEx channel", sysex_channel)?;
        check_data("SysEx code", code)?;
        check_data("SysEx subcode", subcode)?;
        check_len(payload.len() + 5)?;

        let internal = self.caller_track(track)?;
        self.push_message(
            internal,
            time,
            Message::UniversalSysEx {
                real_time,
                sysex_channel,
                code,
                subcode,
                payload: payload.to_vec(),
            },
        )
    }

    /// Send a Registered Parameter Number: CC101, CC100, CC6 and, if given, CC38.
    ///
    /// With `time_order` each controller is nudged just over a tick after the previous one,
    /// for sequencers that shuffle events sharing a timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn make_rpn_call(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        controller_msb: u8,
        controller_lsb: u8,
        data_msb: u8,
        data_lsb: Option<u8>,
        time_order: bool,
    ) -> Result<()> {
        self.parameter_call(
            track,
            channel,
            time,
            [(CC_RPN_MSB, controller_msb), (CC_RPN_LSB, controller_lsb)],
            data_msb,
            data_lsb,
            time_order,
        )
    }

    /// Send a Non-Registered Parameter Number: CC99, CC98, CC6 and, if given, CC38.
    #[allow(clippy::too_many_arguments)]
    pub fn make_nrpn_call(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        controller_msb: u8,
        controller_lsb: u8,
        data_msb: u8,
        data_lsb: Option<u8>,
        time_order: bool,
    ) -> Result<()> {
        self.parameter_call(
            track,
            channel,
            time,
            [(CC_NRPN_MSB, controller_msb), (CC_NRPN_LSB, controller_lsb)],
            data_msb,
            data_lsb,
            time_order,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn parameter_call(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        select: [(u8, u8); 2],
        data_msb: u8,
        data_lsb: Option<u8>,
        time_order: bool,
    ) -> Result<()> {
        let step = if time_order {
            1.0 / f64::from(self.options.ticks_per_quarter.saturating_sub(10).max(1))
        } else {
            0.0
        };

        let data = std::iter::once((CC_DATA_ENTRY_MSB, data_msb))
            .chain(data_lsb.map(|lsb| (CC_DATA_ENTRY_LSB, lsb)));

        for (i, (controller, value)) in select.into_iter().chain(data).enumerate() {
            self.add_controller_event(track, channel, time + step * i as f64, controller, value)?;
        }

        Ok(())
    }

    /// Select a tuning bank on `channel` (RPN 0/4).
    pub fn change_tuning_bank(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        bank: u8,
        time_order: bool,
    ) -> Result<()> {
        self.make_rpn_call(track, channel, time, 0, 4, 0, Some(bank), time_order)
    }

    /// Select a tuning program on `channel` (RPN 0/3).
    pub fn change_tuning_program(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        program: u8,
        time_order: bool,
    ) -> Result<()> {
        self.make_rpn_call(track, channel, time, 0, 3, 0, Some(program), time_order)
    }

    /// Retune individual notes with a real-time single note tuning change.
    ///
    /// `tunings` pairs MIDI note numbers with target frequencies in Hz. The message is
    /// placed at time 0.
    pub fn change_note_tuning(
        &mut self,
        track: usize,
        tunings: &[(u8, f64)],
        sysex_channel: u8,
        real_time: bool,
        tuning_program: u8,
    ) -> Result<()> {
        check_data("tuning program", tuning_program)?;
        check_range("tuning count", tunings.len() as i64, 127)?;

        let mut payload = Vec::with_capacity(2 + tunings.len() * 4);
        payload.push(tuning_program);
        payload.push(tunings.len() as u8);

        for &(note, freq) in tunings {
            check_data("note number", note)?;
            payload.push(note);
            payload.extend_from_slice(&frequency_to_bytes(freq)?);
        }

        self.add_universal_sysex(track, 0.0, 0x08, 0x02, &payload, sysex_channel, real_time)
    }

    /// Move every event so the earliest start time in the file lands at `offset` beats.
    pub fn shift_tracks(&mut self, offset: f64) -> Result<()> {
        if self.closed {
            return Err(MidiError::Closed);
        }

        let Some(origin) = self
            .tracks
            .iter()
            .flat_map(|track| track.events().iter().map(|event| event.time))
            .min_by(f64::total_cmp)
        else {
            return Ok(());
        };

        for track in self.tracks.iter_mut() {
            for event in track.events_mut() {
                event.time = event.time - origin + offset;
            }
        }

        debug!("Shifted tracks by {} beat(s)", offset - origin);
        Ok(())
    }

    /// Order and serialize every track. Safe to call more than once.
    ///
    /// All tracks are planned first, then the earliest tick across the whole file becomes
    /// the common origin so tracks keep their alignment. Nothing is committed unless every
    /// track encodes, so a failed close leaves the file open and unchanged.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let streams: Vec<_> = self.tracks.iter().map(Track::plan).collect();
        let origin = streams
            .iter()
            .filter_map(|stream| stream.first().map(|event| event.tick))
            .min()
            .unwrap_or(0);

        debug!(
            "File origin at tick {} (adjusting: {})",
            origin, self.options.adjust_origin
        );

        let data = streams
            .iter()
            .map(|stream| Track::encode(stream, origin, self.options.adjust_origin))
            .collect::<Result<Vec<_>>>()?;

        for ((track, stream), data) in self.tracks.iter_mut().zip(streams).zip(data) {
            track.commit(stream, data);
        }

        self.closed = true;
        Ok(())
    }

    fn write_header<W: Write>(&self, out: &mut W) -> Result<()> {
        let track_count = self.tracks.len() as u16;

        out.write_all(b"MThd")?;
        out.write_all(&6u32.to_be_bytes())?;
        out.write_all(&self.options.file_format.as_u16().to_be_bytes())?;
        out.write_all(&track_count.to_be_bytes())?;
        out.write_all(&self.options.ticks_per_quarter.to_be_bytes())?;
        Ok(())
    }

    /// Close the file if needed and write the header and every track chunk to `out`.
    pub fn write<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.close()?;

        self.write_header(out)?;
        for track in &self.tracks {
            track.write_chunk(out)?;
        }

        info!(
            "Wrote MIDI file with {} track chunk(s)..!",
            self.tracks.len()
        );

        Ok(())
    }

    /// The complete file image.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(bytes)
    }
}

fn check_channel(channel: u8) -> Result<()> {
    check_range("channel", i64::from(channel), 15)
}

fn check_data(field: &'static str, value: u8) -> Result<()> {
    check_range(field, i64::from(value), 127)
}

fn check_len(len: usize) -> Result<()> {
    if len > MAX_VLQ as usize {
        return Err(MidiError::PayloadTooLong { len });
    }

    Ok(())
}
