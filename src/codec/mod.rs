//! Low-level encodings shared by every event kind.

pub mod frequency;
pub mod vlq;

pub use frequency::{bytes_to_frequency, frequency_to_bytes};
