use crate::error::{MidiError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TICKS_PER_QUARTER: u16 = 960;

/// Standard MIDI File layout written to the header.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Format 0: one track holding everything.
    Single,
    /// Format 1: simultaneous tracks, with tempo and time signatures on a leading conductor track.
    #[default]
    Multi,
    /// Format 2: independent sequential patterns, indexed literally.
    Sequential,
}

impl FileFormat {
    pub fn as_u16(self) -> u16 {
        match self {
            FileFormat::Single => 0,
            FileFormat::Multi => 1,
            FileFormat::Sequential => 2,
        }
    }

    pub fn from_u16(format: u16) -> Result<Self> {
        match format {
            0 => Ok(FileFormat::Single),
            1 => Ok(FileFormat::Multi),
            2 => Ok(FileFormat::Sequential),
            other => Err(MidiError::InvalidOptions(format!(
                "unknown MIDI file format {}",
                other
            ))),
        }
    }

    /// Tracks the file holds beyond the caller's: format 1 adds the conductor track.
    pub fn hidden_tracks(self) -> usize {
        match self {
            FileFormat::Multi => 1,
            FileFormat::Single | FileFormat::Sequential => 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct MidiFileOptions {
    /// Caller-visible tracks.
    pub num_tracks: usize,
    pub remove_duplicates: bool,
    pub deinterleave: bool,
    /// Shift every track so the earliest event in the file starts at tick 0.
    pub adjust_origin: bool,
    pub file_format: FileFormat,
    pub ticks_per_quarter: u16,
}

impl Default for MidiFileOptions {
    fn default() -> Self {
        Self {
            num_tracks: 1,
            remove_duplicates: true,
            deinterleave: true,
            adjust_origin: true,
            file_format: FileFormat::Multi,
            ticks_per_quarter: DEFAULT_TICKS_PER_QUARTER,
        }
    }
}

impl MidiFileOptions {
    pub fn with_tracks(num_tracks: usize) -> Self {
        Self {
            num_tracks,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_tracks == 0 {
            return Err(MidiError::InvalidOptions(
                "a MIDI file needs at least one track".into(),
            ));
        }

        if self.file_format == FileFormat::Single && self.num_tracks != 1 {
            return Err(MidiError::InvalidOptions(format!(
                "format 0 files hold exactly one track, not {}",
                self.num_tracks
            )));
        }

        // The high bit of the division word selects SMPTE timing, which is not written here.
        if self.ticks_per_quarter == 0 || self.ticks_per_quarter > 0x7FFF {
            return Err(MidiError::InvalidOptions(format!(
                "ticks per quarter note must be within 1..=32767, got {}",
                self.ticks_per_quarter
            )));
        }

        let total = self.num_tracks + self.file_format.hidden_tracks();
        if u16::try_from(total).is_err() {
            return Err(MidiError::InvalidOptions(format!(
                "{} tracks do not fit in a MIDI header",
                total
            )));
        }

        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "midiscribe",
    about = "Render a JSON score into a Standard MIDI File."
)]
pub struct Args {
    /// Path to the JSON score.
    pub score: PathBuf,

    /// Where to write the MIDI file. Defaults to the score path with a `.mid` extension.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// MIDI file format (0, 1 or 2), overriding the score.
    #[arg(short, long)]
    pub format: Option<String>,

    /// Ticks per quarter note, overriding the score.
    #[arg(short, long = "ticks-per-quarter")]
    pub ticks_per_quarter: Option<u16>,

    /// Keep events that duplicate an earlier one at the same time.
    #[arg(long, default_value_t = false)]
    pub keep_duplicates: bool,

    /// Leave overlapping notes of the same pitch as written.
    #[arg(long, default_value_t = false)]
    pub no_deinterleave: bool,

    /// Write times as given instead of shifting the earliest event to tick 0.
    #[arg(long, default_value_t = false)]
    pub absolute_time: bool,

    /// Re-read the written file and print what it contains.
    #[arg(short, long, default_value_t = false)]
    pub verify: bool,
}
