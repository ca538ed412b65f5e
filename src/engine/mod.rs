//! The track engine: turns an unordered list of beat-timed events into track chunk data.
//!
//! Closing runs in two phases so a file can agree on one origin for all of its tracks:
//! [`Track::plan`] (deduplicate, expand, sort, deinterleave) and then
//! [`Track::finalize`] (shift by the origin, convert to deltas, serialize).

pub mod pipeline;
mod track;

pub use track::*;
