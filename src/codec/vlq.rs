//! MIDI variable-length quantities.
//!
//! Seven bits of magnitude per byte, most significant group first. Every byte except the
//! last has its high bit set, so `0` encodes as a single `0x00`.

use crate::error::{MidiError, Result};

/// Largest value a Standard MIDI File allows in a variable-length quantity (four bytes).
pub const MAX_VLQ: u32 = 0x0FFF_FFFF;

/// Encode `value` as a variable-length quantity.
pub fn encode(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    encode_into(value, &mut out);
    out
}

/// Append the variable-length encoding of `value` to `out`.
pub fn encode_into(value: u32, out: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut rest = value;

    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for i in (0..count).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        out.push(groups[i] | continuation);
    }
}

/// Append a length prefix, refusing lengths the file format cannot frame.
pub fn encode_len_into(len: usize, out: &mut Vec<u8>) -> Result<()> {
    let framed = u32::try_from(len)
        .ok()
        .filter(|&l| l <= MAX_VLQ)
        .ok_or(MidiError::PayloadTooLong { len })?;

    encode_into(framed, out);
    Ok(())
}

/// Read a variable-length quantity starting at `offset`.
///
/// Returns the decoded value and the number of bytes consumed, or `None` if the buffer
/// ends before a terminating byte or the value overflows 32 bits.
pub fn decode(buffer: &[u8], offset: usize) -> Option<(u32, usize)> {
    let mut value: u32 = 0;

    for (consumed, &byte) in buffer.get(offset..)?.iter().enumerate() {
        value = value.checked_mul(128)? | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Some((value, consumed + 1));
        }
    }

    None
}
