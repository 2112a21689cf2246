//! Leaf-index codecs.
//!
//! Indices are serialized big-endian inside row tails so that lexicographic
//! array comparison is equivalent to integer comparison. The little-endian
//! order used when feeding an index into the hash lives in [`crate::state`];
//! nothing else in the crate touches byte order.

use byteorder::{BigEndian, ByteOrder};

pub(crate) fn index_to_array(i: u32) -> [u8; 4] {
    let mut array = [0u8; 4];
    BigEndian::write_u32(&mut array, i);
    array
}

pub(crate) fn array_to_index(array: &[u8]) -> u32 {
    BigEndian::read_u32(array)
}

/// The top 8 bits of an `ilen`-bit index.
pub(crate) fn truncate_index(i: u32, ilen: u32) -> u8 {
    debug_assert!(ilen >= 8);
    (i >> (ilen - 8)) as u8
}

pub(crate) fn untruncate_index(t: u8, r: u32, ilen: u32) -> u32 {
    debug_assert!(ilen >= 8);
    (u32::from(t) << (ilen - 8)) | r
}
