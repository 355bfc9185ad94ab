//! Integer-list codecs for posting and position lists.
//!
//! Two encodings exist and an index picks one when it is created:
//!
//! - [`PostingCodec::DeltaVarLen`] stores the gaps between consecutive values
//!   as big-endian base-128 varints. Positional indexes use it for doc-id
//!   lists, and every index uses it for position lists.
//! - [`PostingCodec::FixedWidth`] stores each value as an absolute 4-byte
//!   big-endian integer. Plain (non-positional) indexes use it for doc-id
//!   lists.
//!
//! Neither encoding carries a length prefix: a list is recovered from its
//! byte range alone.
//!
//! # Examples
//!
//! ```
//! use pagedex::codec::PostingCodec;
//!
//! let bytes = PostingCodec::DeltaVarLen.encode(&[200]).unwrap();
//! assert_eq!(bytes, vec![0x81, 0x48]);
//! assert_eq!(PostingCodec::DeltaVarLen.decode(&bytes).unwrap(), vec![200]);
//! ```

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::error::{PagedexError, Result};
use crate::util::varint;

/// Encoding used for an ascending list of non-negative integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingCodec {
    /// Absolute 4-byte big-endian values.
    FixedWidth,
    /// Delta gaps encoded as big-endian base-128 varints.
    DeltaVarLen,
}

impl PostingCodec {
    /// Pick the doc-id codec for an index.
    pub fn for_index(positional: bool) -> Self {
        if positional {
            PostingCodec::DeltaVarLen
        } else {
            PostingCodec::FixedWidth
        }
    }

    /// Encode an ascending list.
    ///
    /// A decreasing pair is rejected by the delta codec; repeated values are
    /// encoded as zero gaps.
    pub fn encode(&self, values: &[u32]) -> Result<Vec<u8>> {
        match self {
            PostingCodec::FixedWidth => {
                let mut bytes = vec![0u8; values.len() * 4];
                BigEndian::write_u32_into(values, &mut bytes);
                Ok(bytes)
            }
            PostingCodec::DeltaVarLen => {
                let mut bytes = Vec::with_capacity(values.len());
                let mut previous = 0u32;
                for &value in values {
                    let delta = value.checked_sub(previous).ok_or_else(|| {
                        PagedexError::precondition(format!(
                            "delta codec requires ascending values, got {value} after {previous}"
                        ))
                    })?;
                    varint::encode_u32_into(delta, &mut bytes);
                    previous = value;
                }
                Ok(bytes)
            }
        }
    }

    /// Decode a list from exactly the bytes one `encode` call produced.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u32>> {
        match self {
            PostingCodec::FixedWidth => {
                if bytes.len() % 4 != 0 {
                    return Err(PagedexError::segment(format!(
                        "fixed-width list length {} is not a multiple of 4",
                        bytes.len()
                    )));
                }
                let mut values = vec![0u32; bytes.len() / 4];
                BigEndian::read_u32_into(bytes, &mut values);
                Ok(values)
            }
            PostingCodec::DeltaVarLen => {
                let mut values = Vec::new();
                let mut previous = 0u32;
                let mut rest = bytes;
                while !rest.is_empty() {
                    let (gap, used) = varint::decode_u32(rest)?;
                    previous = previous.wrapping_add(gap);
                    values.push(previous);
                    rest = &rest[used..];
                }
                Ok(values)
            }
        }
    }
}
