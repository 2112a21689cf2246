//! Verification for the Equihash proof-of-work algorithm.

use std::fmt;

use crate::row::{distinct_indices, has_collision, FullStepRow};
use crate::state::HashState;

/// An Equihash solution failed to verify, or the parameters are invalid.
#[derive(Debug)]
pub struct Error(pub(crate) Kind);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid solution: {}", self.0)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, PartialEq)]
pub(crate) enum Kind {
    InvalidParams,
    SolutionSize,
    IndexRange,
    Collision,
    OutOfOrder,
    DuplicateIdxs,
    NonZeroRootHash,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::InvalidParams => f.write_str("invalid parameters"),
            Kind::SolutionSize => f.write_str("incorrect solution size"),
            Kind::IndexRange => f.write_str("index out of range"),
            Kind::Collision => f.write_str("invalid collision length between StepRows"),
            Kind::OutOfOrder => f.write_str("Index tree incorrectly ordered"),
            Kind::DuplicateIdxs => f.write_str("duplicate indices"),
            Kind::NonZeroRootHash => f.write_str("root hash of tree is non-zero"),
        }
    }
}

/// Checks whether `indices` is a valid solution for the given state.
///
/// Rebuilds the binary XOR tree bottom-up, so it runs in time and space
/// proportional to the solution size, independent of the solver's search
/// space.
pub fn is_valid_solution(base_state: &HashState, indices: &[u32]) -> Result<(), Error> {
    let p = base_state.params;
    let collision_byte_length = p.collision_byte_length();

    if indices.len() != p.solution_size() {
        return Err(Error(Kind::SolutionSize));
    }
    // The solver only ever emits indices of index_bits width; a wider one
    // cannot come from the search space
    if indices.iter().any(|&i| i >= 1 << p.index_bits()) {
        return Err(Error(Kind::IndexRange));
    }

    let mut rows: Vec<FullStepRow> = indices
        .iter()
        .map(|&i| FullStepRow::from_hash(base_state, i))
        .collect();

    let mut hash_len = p.hash_length();
    let mut tail_len = 4;
    while rows.len() > 1 {
        let mut merged_rows = Vec::with_capacity(rows.len() / 2);
        for pair in rows.chunks(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if !has_collision(&a.hash, &b.hash, collision_byte_length) {
                return Err(Error(Kind::Collision));
            }
            if b.indices_before(a, hash_len, tail_len) {
                return Err(Error(Kind::OutOfOrder));
            }
            if !distinct_indices(a.indices(hash_len, tail_len), b.indices(hash_len, tail_len)) {
                return Err(Error(Kind::DuplicateIdxs));
            }
            merged_rows.push(FullStepRow::merge(
                a,
                b,
                hash_len,
                tail_len,
                collision_byte_length,
            ));
        }
        rows = merged_rows;
        hash_len -= collision_byte_length;
        tail_len *= 2;
    }

    if rows[0].is_zero(hash_len) {
        Ok(())
    } else {
        Err(Error(Kind::NonZeroRootHash))
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_solution, Kind};
    use crate::solve::basic_solve;
    use crate::state::{init_state, HashState};

    fn solved_state() -> (HashState, Vec<u32>) {
        let state = init_state(48, 5, b"block commitments", &[0; 32]).unwrap();
        let solution = basic_solve(&state)
            .into_iter()
            .next()
            .expect("seed yields a solution");
        (state, solution)
    }

    #[test]
    fn accepts_solver_output() {
        let (state, solution) = solved_state();
        assert!(is_valid_solution(&state, &solution).is_ok());
    }

    #[test]
    fn rejects_wrong_solution_size() {
        let (state, solution) = solved_state();
        assert_eq!(
            is_valid_solution(&state, &solution[..31]).unwrap_err().0,
            Kind::SolutionSize,
        );
        assert_eq!(is_valid_solution(&state, &[]).unwrap_err().0, Kind::SolutionSize);

        let mut extended = solution;
        extended.push(0);
        assert_eq!(
            is_valid_solution(&state, &extended).unwrap_err().0,
            Kind::SolutionSize,
        );
    }

    #[test]
    fn rejects_out_of_range_index() {
        let (state, mut solution) = solved_state();
        solution[0] = 1 << 9;
        assert_eq!(
            is_valid_solution(&state, &solution).unwrap_err().0,
            Kind::IndexRange,
        );
    }

    #[test]
    fn rejects_mutated_index() {
        let (state, mut solution) = solved_state();
        solution[0] ^= 1;
        assert!(is_valid_solution(&state, &solution).is_err());
    }

    #[test]
    fn rejects_swapped_pair() {
        let (state, mut solution) = solved_state();
        solution.swap(0, 1);
        assert_eq!(
            is_valid_solution(&state, &solution).unwrap_err().0,
            Kind::OutOfOrder,
        );
    }

    #[test]
    fn rejects_swapped_subtrees() {
        let (state, mut solution) = solved_state();
        solution.swap(0, 2);
        solution.swap(1, 3);
        assert_eq!(
            is_valid_solution(&state, &solution).unwrap_err().0,
            Kind::OutOfOrder,
        );
    }

    #[test]
    fn rejects_duplicate_index() {
        let (state, mut solution) = solved_state();
        solution[1] = solution[0];
        assert_eq!(
            is_valid_solution(&state, &solution).unwrap_err().0,
            Kind::DuplicateIdxs,
        );
    }
}
