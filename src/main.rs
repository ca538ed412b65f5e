use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use midiscribe::{Args, Score, parse_format, summarize_smf};
use std::fs;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Reading score: '{}'...", args.score.display());
    let raw = fs::read_to_string(&args.score)
        .with_context(|| format!("Failed to read '{}'", args.score.display()))?;

    let mut score: Score = serde_json::from_str(&raw)
        .with_context(|| format!("'{}' is not a valid score", args.score.display()))?;

    if score.tracks.is_empty() {
        bail!("Score has no tracks, nothing to write..!");
    }

    if let Some(format) = args.format.as_deref() {
        score.options.file_format = parse_format(format);
    }
    if let Some(tpq) = args.ticks_per_quarter {
        score.options.ticks_per_quarter = tpq;
    }
    if args.keep_duplicates {
        score.options.remove_duplicates = false;
    }
    if args.no_deinterleave {
        score.options.deinterleave = false;
    }
    if args.absolute_time {
        score.options.adjust_origin = false;
    }

    debug!("Options: {:?}", score.options);

    let mut midi = score.render()?;
    let bytes = midi.to_bytes()?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.score.with_extension("mid"));

    fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    info!(
        "Wrote {} bytes to '{}'..!",
        bytes.len(),
        output.display()
    );

    if args.verify {
        let summary = summarize_smf(&bytes)?;
        info!(
            "Verified: format {}, {} ticks per quarter, {} track(s)..!",
            summary.format,
            summary.ticks_per_quarter,
            summary.tracks.len()
        );

        for (i, (events, notes, length)) in summary.tracks.iter().enumerate() {
            info!(
                "Track {}: {} event(s), {} note(s), {} tick(s)",
                i, events, notes, length
            );
        }
    }

    Ok(())
}
