use crate::codec::vlq::{self, MAX_VLQ};
use crate::error::{MidiError, Result};
use crate::model::event::{Event, Message, WireEvent, beats_to_ticks};
use log::debug;
use std::collections::HashMap;

pub const END_OF_TRACK: [u8; 4] = [0x00, 0xFF, 0x2F, 0x00];

/// Drop events that duplicate an earlier one, keeping the first occurrence of each.
pub fn remove_duplicates(events: &[Event], ticks_per_quarter: u16) -> Vec<Event> {
    let mut kept: Vec<Event> = Vec::with_capacity(events.len());
    let mut by_tick: HashMap<i64, Vec<usize>> = HashMap::new();

    for event in events {
        let bucket = by_tick
            .entry(beats_to_ticks(event.time, ticks_per_quarter))
            .or_default();

        if bucket.iter().any(|&i| kept[i].is_duplicate_of(event)) {
            continue;
        }

        bucket.push(kept.len());
        kept.push(event.clone());
    }

    kept
}

pub fn expand(events: &[Event], ticks_per_quarter: u16) -> Vec<WireEvent> {
    let mut wire = Vec::with_capacity(events.len() * 2);
    for event in events {
        event.expand_into(ticks_per_quarter, &mut wire);
    }

    wire
}

/// Stable sort by `(tick, precedence, insertion order)`.
pub fn sort_events(events: &mut [WireEvent]) {
    events.sort_by_key(WireEvent::sort_key);
}

/// Untangle overlapping notes of the same pitch and channel.
///
/// Walks the time-sorted stream keeping a stack of pending NoteOn ticks per key. A NoteOff
/// arriving while more than one note of its key is sounding is moved back to the most
/// recent NoteOn, which turns overlapping intervals into back-to-back ones. Returns the
/// re-sorted stream and the number of NoteOffs that were moved.
pub fn deinterleave(events: Vec<WireEvent>) -> (Vec<WireEvent>, usize) {
    let mut pending: HashMap<(u8, u8), Vec<i64>> = HashMap::new();
    let mut untangled = Vec::with_capacity(events.len());
    let mut moved = 0;

    for mut event in events {
        match event.message {
            Message::NoteOn { channel, pitch, .. } => {
                pending.entry((pitch, channel)).or_default().push(event.tick);
            }
            Message::NoteOff { channel, pitch, .. } => {
                let stack = pending.entry((pitch, channel)).or_default();

                if stack.len() > 1 {
                    if let Some(on_tick) = stack.pop() {
                        event.tick = on_tick;
                        moved += 1;
                    }
                } else if stack.pop().is_none() {
                    debug!(
                        "Orphaned NoteOff for {} ch{} at tick {}..!",
                        pitch, channel, event.tick
                    );
                }
            }
            _ => {}
        }

        untangled.push(event);
    }

    sort_events(&mut untangled);
    (untangled, moved)
}

/// Serialize a sorted stream as delta-timed track data, ending with the end-of-track marker.
///
/// Every tick is shifted by `origin` first. Deltas are differences of absolute ticks,
/// each rounded once from its beat time, so rounding never accumulates along the track.
pub fn encode_events(events: &[WireEvent], origin: i64) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(events.len() * 4 + END_OF_TRACK.len());
    let mut previous: i64 = 0;

    for event in events {
        let tick = event.tick - origin;
        if tick < 0 {
            return Err(MidiError::NegativeTick { tick });
        }

        let delta = tick - previous;
        let framed = u32::try_from(delta)
            .ok()
            .filter(|&d| d <= MAX_VLQ)
            .ok_or(MidiError::DeltaOverflow { delta })?;

        vlq::encode_into(framed, &mut data);
        event.message.encode_into(&mut data)?;
        previous = tick;
    }

    data.extend_from_slice(&END_OF_TRACK);
    Ok(data)
}
