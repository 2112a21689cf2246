//! Step rows: the working units of the solver table.
//!
//! A row is a flat byte buffer laid out as `[hash_prefix | index_tail]`. The
//! prefix shrinks by one collision chunk per round while the tail doubles,
//! always keeping the lexicographically-smaller half first so the index tree
//! is canonically ordered.

use std::cmp::Ordering;

use crate::index::{array_to_index, index_to_array, truncate_index};
use crate::state::{generate_hash, HashState};

/// A row carrying its XOR prefix and a tail of 4-byte big-endian indices.
pub(crate) struct FullStepRow {
    pub(crate) hash: Vec<u8>,
}

impl FullStepRow {
    pub(crate) fn from_hash(base_state: &HashState, i: u32) -> Self {
        let digest = generate_hash(base_state, i);
        let mut hash = Vec::with_capacity(digest.as_bytes().len() + 4);
        hash.extend_from_slice(digest.as_bytes());
        hash.extend_from_slice(&index_to_array(i));
        FullStepRow { hash }
    }

    /// XORs the prefixes from `trim` onwards and concatenates the tails,
    /// smaller tail first.
    pub(crate) fn merge(
        a: &Self,
        b: &Self,
        hash_len: usize,
        tail_len: usize,
        trim: usize,
    ) -> Self {
        let mut hash = Vec::with_capacity(hash_len - trim + 2 * tail_len);
        for i in trim..hash_len {
            hash.push(a.hash[i] ^ b.hash[i]);
        }
        let (first, second) = if a.indices_before(b, hash_len, tail_len) {
            (a, b)
        } else {
            (b, a)
        };
        hash.extend_from_slice(&first.hash[hash_len..hash_len + tail_len]);
        hash.extend_from_slice(&second.hash[hash_len..hash_len + tail_len]);
        FullStepRow { hash }
    }

    pub(crate) fn indices_before(&self, other: &Self, hash_len: usize, tail_len: usize) -> bool {
        self.hash[hash_len..hash_len + tail_len] < other.hash[hash_len..hash_len + tail_len]
    }

    pub(crate) fn is_zero(&self, len: usize) -> bool {
        self.hash.iter().take(len).all(|v| *v == 0)
    }

    pub(crate) fn indices(&self, hash_len: usize, tail_len: usize) -> Vec<u32> {
        self.hash[hash_len..hash_len + tail_len]
            .chunks_exact(4)
            .map(array_to_index)
            .collect()
    }

    /// The leftmost leaf index of the subtree this row represents.
    pub(crate) fn leading_index(&self, hash_len: usize) -> u32 {
        array_to_index(&self.hash[hash_len..hash_len + 4])
    }
}

/// A row for the optimised solver's outer pass.
///
/// Before the representation switchover the buffer holds only 4-byte full
/// indices and no hash bytes; the XOR prefix is recomputed on demand with
/// [`generate_xor`]. Afterwards it holds an XOR prefix followed by one
/// truncated byte per index. Callers track which phase a table is in.
pub(crate) struct TruncatedStepRow {
    pub(crate) hash: Vec<u8>,
}

impl TruncatedStepRow {
    pub(crate) fn from_index(i: u32) -> Self {
        TruncatedStepRow {
            hash: index_to_array(i).to_vec(),
        }
    }

    /// Decodes a tail of full indices starting at the front of the buffer.
    pub(crate) fn full_indices(&self, tail_len: usize) -> Vec<u32> {
        self.hash[..tail_len]
            .chunks_exact(4)
            .map(array_to_index)
            .collect()
    }

    pub(crate) fn merge(
        a: &Self,
        b: &Self,
        hash_len: usize,
        tail_len: usize,
        trim: usize,
    ) -> Self {
        let mut hash = Vec::with_capacity(hash_len - trim + 2 * tail_len);
        for i in trim..hash_len {
            hash.push(a.hash[i] ^ b.hash[i]);
        }
        let (first, second) = if a.indices_before(b, hash_len, tail_len) {
            (a, b)
        } else {
            (b, a)
        };
        hash.extend_from_slice(&first.hash[hash_len..hash_len + tail_len]);
        hash.extend_from_slice(&second.hash[hash_len..hash_len + tail_len]);
        TruncatedStepRow { hash }
    }

    /// The switchover merge: both operands still carry full indices and no
    /// stored prefix, the result carries a trimmed XOR prefix and one
    /// truncated byte per index.
    pub(crate) fn merge_truncating(
        base_state: &HashState,
        a: &Self,
        b: &Self,
        len: usize,
        tail_len: usize,
        trim: usize,
        ilen: u32,
    ) -> Self {
        let a_hash = generate_xor(base_state, a, len, tail_len);
        let b_hash = generate_xor(base_state, b, len, tail_len);

        let mut hash = Vec::with_capacity(len - trim + tail_len / 2);
        for i in trim..len {
            hash.push(a_hash[i] ^ b_hash[i]);
        }
        let (first, second) = if a.indices_before(b, 0, tail_len) {
            (a, b)
        } else {
            (b, a)
        };
        for row in [first, second] {
            for i in row.full_indices(tail_len) {
                hash.push(truncate_index(i, ilen));
            }
        }
        TruncatedStepRow { hash }
    }

    pub(crate) fn indices_before(&self, other: &Self, hash_len: usize, tail_len: usize) -> bool {
        self.hash[hash_len..hash_len + tail_len] < other.hash[hash_len..hash_len + tail_len]
    }

    pub(crate) fn is_zero(&self, len: usize) -> bool {
        self.hash.iter().take(len).all(|v| *v == 0)
    }

    pub(crate) fn truncated_indices(&self, hash_len: usize, tail_len: usize) -> Vec<u8> {
        self.hash[hash_len..hash_len + tail_len].to_vec()
    }
}

/// XOR of every leaf hash named by a pre-switchover row's index tail.
pub(crate) fn generate_xor(
    base_state: &HashState,
    row: &TruncatedStepRow,
    len: usize,
    tail_len: usize,
) -> Vec<u8> {
    let mut xor = vec![0u8; len];
    for i in row.full_indices(tail_len) {
        let digest = generate_hash(base_state, i);
        for (x, h) in xor.iter_mut().zip(digest.as_bytes()) {
            *x ^= h;
        }
    }
    xor
}

/// Collision test for pre-switchover rows, which store no XOR prefix.
pub(crate) fn hashing_has_collision(
    base_state: &HashState,
    a: &TruncatedStepRow,
    b: &TruncatedStepRow,
    len: usize,
    tail_len: usize,
    l: usize,
) -> bool {
    let a_hash = generate_xor(base_state, a, len, tail_len);
    let b_hash = generate_xor(base_state, b, len, tail_len);
    a_hash[..l] == b_hash[..l]
}

pub(crate) fn has_collision(a: &[u8], b: &[u8], len: usize) -> bool {
    a[..len] == b[..len]
}

/// Checks that two decoded index sets are disjoint. Numeric, not
/// lexicographic, order.
pub(crate) fn distinct_indices(mut a: Vec<u32>, mut b: Vec<u32>) -> bool {
    a.sort_unstable();
    b.sort_unstable();

    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => return false,
        }
    }
    true
}
