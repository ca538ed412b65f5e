use crate::engine::pipeline;
use crate::error::{MidiError, Result};
use crate::model::event::{Event, WireEvent, loses_precision};
use log::{debug, warn};
use std::io::Write;

/// Where a track is in its lifecycle. Every transition is one-way and re-running one is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Accepting events.
    Open,
    /// Deduplicated, expanded, sorted and deinterleaved; waiting for the file's origin.
    Sequenced,
    /// Serialized; `data` holds the finished chunk payload.
    Closed,
}

#[derive(Debug, Clone)]
pub struct Track {
    remove_duplicates: bool,
    deinterleave: bool,
    ticks_per_quarter: u16,
    state: TrackState,
    events: Vec<Event>,
    sequenced: Vec<WireEvent>,
    data: Vec<u8>,
}

impl Track {
    pub fn new(remove_duplicates: bool, deinterleave: bool, ticks_per_quarter: u16) -> Self {
        Self {
            remove_duplicates,
            deinterleave,
            ticks_per_quarter,
            state: TrackState::Open,
            events: Vec::new(),
            sequenced: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, event: Event) -> Result<()> {
        if self.state != TrackState::Open {
            return Err(MidiError::Closed);
        }

        self.events.push(event);
        Ok(())
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == TrackState::Closed
    }

    /// Events as they were added, before any processing.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    /// The time-ordered wire events, at absolute ticks. Empty until the track is sequenced.
    pub fn sequenced(&self) -> &[WireEvent] {
        &self.sequenced
    }

    /// Chunk payload (without the `MTrk` header). Empty until the track is closed.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The time-ordered stream this track would be written from, without changing state.
    ///
    /// Runs the ordering stages on an open track: deduplicate, expand, sort and
    /// (optionally) deinterleave. Once sequenced, returns the stored stream.
    pub fn plan(&self) -> Vec<WireEvent> {
        if self.state != TrackState::Open {
            return self.sequenced.clone();
        }

        let tpq = self.ticks_per_quarter;
        let imprecise = self
            .events
            .iter()
            .filter(|event| event.beat_times().any(|beats| loses_precision(beats, tpq)))
            .count();

        if imprecise > 0 {
            warn!(
                "{} event(s) fall between ticks at {} ticks per quarter and will be rounded..!",
                imprecise, tpq
            );
        }

        let unique = if self.remove_duplicates {
            pipeline::remove_duplicates(&self.events, tpq)
        } else {
            self.events.clone()
        };

        let mut wire = pipeline::expand(&unique, tpq);
        pipeline::sort_events(&mut wire);

        let (wire, moved) = if self.deinterleave {
            pipeline::deinterleave(wire)
        } else {
            (wire, 0)
        };

        debug!(
            "Sequenced track: {} event(s), {} duplicate(s) dropped, {} wire event(s), {} NoteOff(s) moved",
            self.events.len(),
            self.events.len() - unique.len(),
            wire.len(),
            moved
        );

        wire
    }

    /// Run the ordering stages and keep the result, see [`Track::plan`].
    pub fn sequence(&mut self) {
        if self.state != TrackState::Open {
            return;
        }

        self.sequenced = self.plan();
        self.state = TrackState::Sequenced;
    }

    /// Chunk payload for `stream` against a file-wide origin tick. When `adjust_origin` is
    /// false the origin is ignored and ticks are taken as absolute from zero.
    pub(crate) fn encode(stream: &[WireEvent], origin: i64, adjust_origin: bool) -> Result<Vec<u8>> {
        let origin = if adjust_origin { origin } else { 0 };
        let data = pipeline::encode_events(stream, origin)?;

        if u32::try_from(data.len()).is_err() {
            return Err(MidiError::PayloadTooLong { len: data.len() });
        }

        Ok(data)
    }

    /// Store a planned stream and its encoded payload, closing the track.
    pub(crate) fn commit(&mut self, sequenced: Vec<WireEvent>, data: Vec<u8>) {
        self.sequenced = sequenced;
        self.data = data;
        self.state = TrackState::Closed;
    }

    /// Serialize against a file-wide origin tick, sequencing first if needed.
    pub fn finalize(&mut self, origin: i64, adjust_origin: bool) -> Result<()> {
        if self.state == TrackState::Closed {
            return Ok(());
        }

        let sequenced = self.plan();
        let data = Self::encode(&sequenced, origin, adjust_origin)?;
        self.commit(sequenced, data);
        Ok(())
    }

    /// Close a track on its own, using its own first event as the origin.
    pub fn close(&mut self, adjust_origin: bool) -> Result<()> {
        if self.state == TrackState::Closed {
            return Ok(());
        }

        let sequenced = self.plan();
        let origin = sequenced.first().map(|event| event.tick).unwrap_or(0);
        let data = Self::encode(&sequenced, origin, adjust_origin)?;
        self.commit(sequenced, data);
        Ok(())
    }

    /// Write the `MTrk` chunk. The track must already be closed.
    pub fn write_chunk<W: Write>(&self, out: &mut W) -> Result<()> {
        if !self.is_closed() {
            return Err(MidiError::NotClosed);
        }

        out.write_all(b"MTrk")?;
        out.write_all(&(self.data.len() as u32).to_be_bytes())?;
        out.write_all(&self.data)?;
        Ok(())
    }
}
