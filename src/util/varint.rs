//! Variable-length integer encoding used by the delta postings codec.
//!
//! Seven payload bits per byte, high bit set on every byte but the last.

use crate::error::{Result, TesseraError};

/// Append the varint encoding of `value` to `out`.
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Continuation bit
        }

        out.push(byte);

        if val == 0 {
            break;
        }
    }
}

/// Decode a varint from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (index, &byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(TesseraError::corrupt_block("varint overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, index + 1));
        }

        shift += 7;
    }

    Err(TesseraError::corrupt_block("incomplete varint"))
}

/// Decode a varint that must fit in a `u32`.
pub fn read_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, read) = read_u64(bytes)?;
    let value = u32::try_from(value)
        .map_err(|_| TesseraError::corrupt_block(format!("varint {value} exceeds u32")))?;
    Ok((value, read))
}
