use blake2b_simd::{Hash as Blake2bHash, Params as Blake2bParams, State as Blake2bState};
use byteorder::{LittleEndian, WriteBytesExt};

use crate::params::Params;
use crate::verify::Error;

/// A seeded Equihash hash state.
///
/// Holds the validated parameters together with a personalized BLAKE2b state
/// that has absorbed the caller's seed material. Solvers and the verifier only
/// ever clone the inner state, so a `HashState` can be reused across calls.
#[derive(Clone)]
pub struct HashState {
    pub(crate) params: Params,
    state: Blake2bState,
}

/// Initialises a hash state for the `(n, k)` parameters, seeded with `input`
/// followed by `nonce`.
///
/// Returns an error if the parameters are incompatible with the row layout
/// (see [`crate::Error`]).
pub fn init_state(n: u32, k: u32, input: &[u8], nonce: &[u8]) -> Result<HashState, Error> {
    let params = Params::new(n, k)?;

    let mut personalization: Vec<u8> = Vec::from("ZcashPOW");
    personalization.write_u32::<LittleEndian>(n).unwrap();
    personalization.write_u32::<LittleEndian>(k).unwrap();

    let mut state = Blake2bParams::new()
        .hash_length(params.hash_length())
        .personal(&personalization)
        .to_state();
    state.update(input);
    state.update(nonce);

    Ok(HashState { params, state })
}

/// Produces the n-bit hash for leaf index `i`.
///
/// The index is fed to the hash in little-endian byte order; this differs from
/// the big-endian order used inside row tails and is kept for compatibility
/// with existing Equihash deployments.
pub(crate) fn generate_hash(base_state: &HashState, i: u32) -> Blake2bHash {
    let mut lei = [0u8; 4];
    (&mut lei[..]).write_u32::<LittleEndian>(i).unwrap();

    let mut state = base_state.state.clone();
    state.update(&lei);
    state.finalize()
}

#[cfg(test)]
mod tests {
    use super::{generate_hash, init_state};

    #[test]
    fn hash_output_length_matches_n() {
        let state = init_state(48, 5, b"input", &[0; 32]).unwrap();
        assert_eq!(generate_hash(&state, 0).as_bytes().len(), 6);

        let state = init_state(96, 5, b"input", &[0; 32]).unwrap();
        assert_eq!(generate_hash(&state, 0).as_bytes().len(), 12);
    }

    #[test]
    fn hashing_is_deterministic_per_index() {
        let state = init_state(48, 5, b"input", &[0; 32]).unwrap();
        assert_eq!(
            generate_hash(&state, 7).as_bytes(),
            generate_hash(&state, 7).as_bytes(),
        );
        assert_ne!(
            generate_hash(&state, 7).as_bytes(),
            generate_hash(&state, 8).as_bytes(),
        );
    }

    #[test]
    fn personalization_separates_parameter_sets() {
        // Same output length, but k differs in the personalization tag
        let a = init_state(96, 5, b"input", &[0; 32]).unwrap();
        let b = init_state(96, 3, b"input", &[0; 32]).unwrap();
        assert_ne!(generate_hash(&a, 0).as_bytes(), generate_hash(&b, 0).as_bytes());
    }

    #[test]
    fn seed_material_feeds_the_state() {
        let a = init_state(48, 5, b"input", &[0; 32]).unwrap();
        let b = init_state(48, 5, b"other", &[0; 32]).unwrap();
        let c = init_state(48, 5, b"input", &[1; 32]).unwrap();
        assert_ne!(generate_hash(&a, 0).as_bytes(), generate_hash(&b, 0).as_bytes());
        assert_ne!(generate_hash(&a, 0).as_bytes(), generate_hash(&c, 0).as_bytes());
    }
}
