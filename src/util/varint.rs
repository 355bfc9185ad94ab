//! Variable-length integer encoding utilities.
//!
//! Integers are written as big-endian base-128 groups: the most significant
//! 7-bit group comes first, every byte except the last carries the
//! continuation bit (`0x80`), and the final byte holds the least significant
//! group with its high bit clear. Zero is a single `0x00` byte.

use crate::error::{PagedexError, Result};

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7F;

/// Maximum number of bytes a `u32` can occupy.
pub const MAX_U32_LEN: usize = 5;

/// Encode a u32 value using big-endian variable-length encoding.
pub fn encode_u32(value: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(encoded_len(value));
    encode_u32_into(value, &mut bytes);
    bytes
}

/// Append the encoding of `value` to `out`.
pub fn encode_u32_into(value: u32, out: &mut Vec<u8>) {
    let len = encoded_len(value);
    for group in (0..len).rev() {
        let mut byte = ((value >> (7 * group)) as u8) & PAYLOAD;
        if group != 0 {
            byte |= CONTINUATION;
        }
        out.push(byte);
    }
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u32) -> usize {
    let bits = 32 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Decode one u32 value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let mut result = 0u32;

    for (index, &byte) in bytes.iter().enumerate() {
        if index >= MAX_U32_LEN {
            return Err(PagedexError::segment("VarInt overflow"));
        }

        result = (result << 7) | (byte & PAYLOAD) as u32;

        if byte & CONTINUATION == 0 {
            return Ok((result, index + 1));
        }
    }

    Err(PagedexError::segment("Incomplete VarInt"))
}
