//! MIDI Tuning Standard frequency words.
//!
//! A frequency is stored as the equal-tempered semitone at or below it (A4 = 69 = 440Hz)
//! followed by the remaining deviation as a 14-bit fraction of a semitone, split into two
//! 7-bit bytes.

use crate::error::{MidiError, Result};

const A4_HZ: f64 = 440.0;
const A4_NOTE: f64 = 69.0;
const FRACTION_STEPS: f64 = 16384.0;

/// Encode `freq` (Hz) as `[semitone, msb, lsb]`.
///
/// Every byte is clamped into `0..=127`. The all-ones word is reserved by the tuning
/// standard, so `(127, 127, 127)` is pulled back to `(127, 127, 126)`.
pub fn frequency_to_bytes(freq: f64) -> Result<[u8; 3]> {
    if !freq.is_finite() || freq <= 0.0 {
        return Err(MidiError::InvalidFrequency { freq });
    }

    let semitones = A4_NOTE + 12.0 * (freq / A4_HZ).log2();
    let semitone = (semitones.trunc() as i64).clamp(0, 127);

    let lower = semitone_frequency(semitone as f64);
    let cents = if freq != lower {
        1200.0 * (freq / lower).log2()
    } else {
        0.0
    };

    let fraction = ((cents / 100.0) * FRACTION_STEPS).round() as i64;
    let msb = (fraction >> 7).clamp(0, 127);
    let mut lsb = (fraction - (msb << 7)).clamp(0, 127);

    if semitone == 127 && msb == 127 && lsb == 127 {
        lsb = 126;
    }

    Ok([semitone as u8, msb as u8, lsb as u8])
}

/// Decode a `[semitone, msb, lsb]` tuning word back to Hz.
pub fn bytes_to_frequency(bytes: [u8; 3]) -> f64 {
    let [semitone, msb, lsb] = bytes;
    let fraction = ((u32::from(msb) << 7) + u32::from(lsb)) as f64;
    let cents = fraction * 100.0 / FRACTION_STEPS;

    semitone_frequency(f64::from(semitone)) * 2f64.powf(cents / 1200.0)
}

fn semitone_frequency(semitone: f64) -> f64 {
    A4_HZ * 2f64.powf((semitone - A4_NOTE) / 12.0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn bytes(freq: f64) -> [u8; 3] {
        frequency_to_bytes(freq).unwrap()
    }

    #[test]
    fn reference_table_values() {
        assert_eq!(bytes(8.1758), [0x00, 0x00, 0x00]);
        assert_eq!(bytes(8.66196), [0x01, 0x00, 0x00]);
        assert_eq!(bytes(440.0), [0x45, 0x00, 0x00]);
        assert_eq!(bytes(440.0016), [0x45, 0x00, 0x01]);
        assert_eq!(bytes(439.9984), [0x44, 0x7F, 0x7F]);
        assert_eq!(bytes(8372.0190), [0x78, 0x00, 0x00]);
        assert_eq!(bytes(8372.062), [0x78, 0x00, 0x01]);
        assert_eq!(bytes(12543.8760), [0x7F, 0x00, 0x00]);
    }

    #[test]
    fn saturates_below_the_reserved_word() {
        assert_eq!(bytes(13289.7300), [0x7F, 0x7F, 0x7E]);
        assert_eq!(bytes(20000.0), [0x7F, 0x7F, 0x7E]);
    }

    #[test]
    fn clamps_below_the_lowest_note() {
        assert_eq!(bytes(4.0), [0x00, 0x00, 0x00]);
    }

    #[test]
    fn rejects_non_positive_frequencies() {
        assert!(frequency_to_bytes(0.0).is_err());
        assert!(frequency_to_bytes(-440.0).is_err());
        assert!(frequency_to_bytes(f64::NAN).is_err());
    }

    #[test]
    fn round_trips_through_the_audible_range() {
        let accuracy = 0.00001;
        let mut freq = 15.0;

        while freq <= 12000.0 {
            let back = bytes_to_frequency(bytes(freq));
            assert!(
                (back - freq).abs() < accuracy * freq,
                "{freq}Hz came back as {back}Hz"
            );
            freq *= 1.037;
        }
    }

    #[test]
    fn decodes_a4() {
        assert!((bytes_to_frequency([69, 0, 0]) - 440.0).abs() < 1e-9);
        assert!((bytes_to_frequency([81, 0, 0]) - 880.0).abs() < 1e-9);
    }
}
