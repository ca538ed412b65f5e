use crate::FileFormat;
use anyhow::{Result, anyhow};
use log::info;
use midly::{Format, Smf, Timing, TrackEventKind};

pub fn parse_format(s: &str) -> FileFormat {
    if let Ok(number) = s.trim().parse::<u16>()
        && let Ok(format) = FileFormat::from_u16(number)
    {
        return format;
    }

    match s.to_lowercase().as_str() {
        "single" => FileFormat::Single,
        "multi" | "parallel" => FileFormat::Multi,
        "sequential" => FileFormat::Sequential,
        other => {
            info!("Unknown file format '{}', defaulting to `1`..!", other);
            FileFormat::Multi
        }
    }
}

/// What a written file holds, as read back by an independent parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmfSummary {
    pub format: u16,
    pub ticks_per_quarter: u16,
    /// `(events, notes, length in ticks)` per track chunk.
    pub tracks: Vec<(usize, usize, u64)>,
}

/// Parse a complete file image with `midly` and summarize it.
pub fn summarize_smf(bytes: &[u8]) -> Result<SmfSummary> {
    let smf = Smf::parse(bytes).map_err(|e| anyhow!("Written file does not parse: {}", e))?;

    let format = match smf.header.format {
        Format::SingleTrack => 0,
        Format::Parallel => 1,
        Format::Sequential => 2,
    };

    let Timing::Metrical(ticks_per_quarter) = smf.header.timing else {
        return Err(anyhow!("Written file uses timecode timing..!"));
    };

    let tracks = smf
        .tracks
        .iter()
        .map(|track| {
            let length = track.iter().map(|e| u64::from(e.delta.as_int())).sum();
            let notes = track
                .iter()
                .filter(|e| {
                    matches!(
                        e.kind,
                        TrackEventKind::Midi {
                            message: midly::MidiMessage::NoteOn { vel, .. },
                            ..
                        } if vel.as_int() > 0
                    )
                })
                .count();

            (track.len(), notes, length)
        })
        .collect();

    Ok(SmfSummary {
        format,
        ticks_per_quarter: ticks_per_quarter.as_int(),
        tracks,
    })
}
