//! Error types for building and writing MIDI files.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MidiError {
    /// Caller-visible track index outside the file's range.
    #[error("Track {track} is out of range, the file has {tracks} caller-visible track(s)")]
    TrackOutOfRange { track: usize, tracks: usize },

    /// A channel, data byte or similar field exceeded what the wire format can hold.
    #[error("{field} must be within 0..={max}, got {value}")]
    ValueOutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },

    /// A length that a variable-length quantity cannot represent.
    #[error("Payload of {len} bytes cannot be framed by a MIDI variable-length quantity")]
    PayloadTooLong { len: usize },

    /// Meta-event text must be representable as ISO-8859-1.
    #[error("Character {ch:?} cannot be encoded as ISO-8859-1")]
    NotLatin1 { ch: char },

    #[error("Tempo of {bpm} BPM cannot be encoded as microseconds per quarter note")]
    InvalidTempo { bpm: f64 },

    #[error("Frequency of {freq}Hz cannot be expressed as a MIDI tuning")]
    InvalidFrequency { freq: f64 },

    #[error("Invalid beat time or duration: {time}")]
    InvalidTime { time: f64 },

    /// An event still lands before tick 0 once the origin has been resolved.
    #[error("Event at tick {tick} precedes the start of the track (enable origin adjustment?)")]
    NegativeTick { tick: i64 },

    #[error("Delta time of {delta} ticks exceeds the variable-length quantity maximum")]
    DeltaOverflow { delta: i64 },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("File is closed to new events")]
    Closed,

    #[error("Track must be closed before it can be written")]
    NotClosed,

    /// I/O error while writing the finished file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, MidiError>;

/// Fail with [`MidiError::ValueOutOfRange`] unless `0 <= value <= max`.
pub(crate) fn check_range(field: &'static str, value: i64, max: i64) -> Result<()> {
    if value > max || value < 0 {
        return Err(MidiError::ValueOutOfRange { field, value, max });
    }

    Ok(())
}
