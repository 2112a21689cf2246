//! The basic and optimised Equihash solvers.

use std::collections::BTreeSet;

use tracing::debug;

use crate::collide::collide;
use crate::index::{truncate_index, untruncate_index};
use crate::row::{
    distinct_indices, generate_xor, has_collision, hashing_has_collision, FullStepRow,
    TruncatedStepRow,
};
use crate::state::HashState;

/// Finds all solutions for the given state by running the full-index
/// algorithm.
///
/// Every row carries its complete index tail throughout, so this needs memory
/// for `2^(n/(k+1)+1)` full rows but hashes each leaf exactly once.
pub fn basic_solve(base_state: &HashState) -> BTreeSet<Vec<u32>> {
    basic_solve_cancellable(base_state, || false)
}

/// [`basic_solve`] with a cooperative cancellation probe.
///
/// `cancelled` is checked at round boundaries; once it returns true the
/// solver stops and returns the solutions finalized so far.
pub fn basic_solve_cancellable(
    base_state: &HashState,
    mut cancelled: impl FnMut() -> bool,
) -> BTreeSet<Vec<u32>> {
    let p = base_state.params;
    let collision_byte_length = p.collision_byte_length();
    let mut hash_len = p.hash_length();
    let mut tail_len = 4;

    debug!("Generating first list");
    let mut rows: Vec<FullStepRow> = (0..p.initial_list_size())
        .map(|i| FullStepRow::from_hash(base_state, i))
        .collect();

    let mut solutions = BTreeSet::new();

    for r in 1..p.k {
        if rows.is_empty() {
            break;
        }
        if cancelled() {
            return solutions;
        }

        debug!("Round {}: sorting list", r);
        rows.sort_unstable_by(|a, b| a.hash[..hash_len].cmp(&b.hash[..hash_len]));

        debug!("Round {}: finding collisions", r);
        collide(
            &mut rows,
            |a, b| has_collision(&a.hash, &b.hash, collision_byte_length),
            |a, b, out| {
                if distinct_indices(a.indices(hash_len, tail_len), b.indices(hash_len, tail_len)) {
                    out.push(FullStepRow::merge(
                        a,
                        b,
                        hash_len,
                        tail_len,
                        collision_byte_length,
                    ));
                }
            },
        );

        hash_len -= collision_byte_length;
        tail_len *= 2;
    }

    if cancelled() {
        return solutions;
    }

    // Find a collision on the last 2n/(k+1) bits
    debug!("Final round");
    if rows.len() > 1 {
        rows.sort_unstable_by(|a, b| a.hash[..hash_len].cmp(&b.hash[..hash_len]));
        for pair in rows.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let merged = FullStepRow::merge(a, b, hash_len, tail_len, 0);
            if merged.is_zero(hash_len)
                && distinct_indices(a.indices(hash_len, tail_len), b.indices(hash_len, tail_len))
            {
                solutions.insert(merged.indices(hash_len, 2 * tail_len));
            }
        }
    }

    solutions
}

/// Finds all solutions for the given state, minimizing peak memory.
///
/// The outer pass searches over truncated indices, deferring both hashing and
/// distinctness; each partial solution it yields is then expanded back to
/// full indices by a bounded per-branch reconstruction. Returns the same
/// solution set as [`basic_solve`].
pub fn optimised_solve(base_state: &HashState) -> BTreeSet<Vec<u32>> {
    optimised_solve_cancellable(base_state, || false)
}

/// [`optimised_solve`] with a cooperative cancellation probe.
///
/// `cancelled` is checked at round boundaries and between partial-solution
/// expansions; once it returns true the solver stops and returns the
/// solutions finalized so far.
pub fn optimised_solve_cancellable(
    base_state: &HashState,
    mut cancelled: impl FnMut() -> bool,
) -> BTreeSet<Vec<u32>> {
    let p = base_state.params;
    let full_hash_len = p.hash_length();
    let collision_byte_length = p.collision_byte_length();
    let ilen = p.index_bits();

    let mut solutions = BTreeSet::new();

    // First run the algorithm with truncated indices
    let partial_solutions = {
        let mut trunc = false;
        let mut trunc_next = false;
        let mut full_tail_len = 4;
        let mut hash_len = full_hash_len;
        let mut tail_len = 1;

        debug!("Generating first list");
        let mut rows: Vec<TruncatedStepRow> = (0..p.initial_list_size())
            .map(TruncatedStepRow::from_index)
            .collect();

        let mut partials: Vec<Vec<u8>> = Vec::new();

        for r in 1..p.k {
            if rows.is_empty() {
                break;
            }
            if cancelled() {
                return solutions;
            }

            // Switch representations once the trimmed XOR plus truncated
            // indices becomes smaller than the full index tuple
            if !trunc && hash_len + tail_len < full_tail_len {
                debug!("Round {}: switching to truncated indices", r);
                trunc_next = true;
            }

            debug!("Round {}: sorting list", r);
            if trunc {
                rows.sort_unstable_by(|a, b| a.hash[..hash_len].cmp(&b.hash[..hash_len]));
            } else {
                rows.sort_by_cached_key(|row| {
                    generate_xor(base_state, row, full_hash_len, full_tail_len)
                });
            }

            debug!("Round {}: finding collisions", r);
            let cumulative = full_hash_len - hash_len + collision_byte_length;
            if trunc {
                collide(
                    &mut rows,
                    |a, b| has_collision(&a.hash, &b.hash, collision_byte_length),
                    |a, b, out| {
                        // Indices were truncated, so distinctness is settled
                        // during expansion
                        out.push(TruncatedStepRow::merge(
                            a,
                            b,
                            hash_len,
                            tail_len,
                            collision_byte_length,
                        ));
                    },
                );
            } else {
                collide(
                    &mut rows,
                    |a, b| {
                        hashing_has_collision(
                            base_state,
                            a,
                            b,
                            full_hash_len,
                            full_tail_len,
                            cumulative,
                        )
                    },
                    |a, b, out| {
                        if distinct_indices(
                            a.full_indices(full_tail_len),
                            b.full_indices(full_tail_len),
                        ) {
                            if trunc_next {
                                out.push(TruncatedStepRow::merge_truncating(
                                    base_state,
                                    a,
                                    b,
                                    full_hash_len,
                                    full_tail_len,
                                    cumulative,
                                    ilen,
                                ));
                            } else {
                                out.push(TruncatedStepRow::merge(a, b, 0, full_tail_len, 0));
                            }
                        }
                    },
                );
            }

            trunc = trunc_next;
            full_tail_len *= 2;
            hash_len -= collision_byte_length;
            tail_len *= 2;
        }

        if cancelled() {
            return solutions;
        }

        // Find a collision on the last 2n/(k+1) bits
        debug!("Final round");
        if rows.len() > 1 {
            if trunc {
                rows.sort_unstable_by(|a, b| a.hash[..hash_len].cmp(&b.hash[..hash_len]));
                for pair in rows.windows(2) {
                    let merged = TruncatedStepRow::merge(&pair[0], &pair[1], hash_len, tail_len, 0);
                    if merged.is_zero(hash_len) {
                        partials.push(merged.truncated_indices(hash_len, 2 * tail_len));
                    }
                }
            } else {
                // The switchover never paid off for these parameters; derive
                // the trimmed XOR on demand instead
                let cumulative = full_hash_len - hash_len;
                rows.sort_by_cached_key(|row| {
                    generate_xor(base_state, row, full_hash_len, full_tail_len)
                });
                for pair in rows.windows(2) {
                    let (a, b) = (&pair[0], &pair[1]);
                    if distinct_indices(a.full_indices(full_tail_len), b.full_indices(full_tail_len))
                    {
                        let merged = TruncatedStepRow::merge_truncating(
                            base_state,
                            a,
                            b,
                            full_hash_len,
                            full_tail_len,
                            cumulative,
                            ilen,
                        );
                        if merged.is_zero(hash_len) {
                            partials.push(merged.truncated_indices(hash_len, 2 * tail_len));
                        }
                    }
                }
            }
        }

        debug!("Found {} partial solutions", partials.len());
        partials
    }; // the truncated table is freed here, before expansion allocates

    // Now for each partial solution run the algorithm again to recreate the
    // full indices
    debug!("Culling solutions");
    let mut invalid_count = 0;
    for partial in &partial_solutions {
        if cancelled() {
            break;
        }
        match expand_partial(base_state, partial) {
            Some(expanded) => solutions.extend(expanded),
            None => invalid_count += 1,
        }
    }
    debug!("Number of invalid solutions found: {}", invalid_count);

    solutions
}

/// Rebuilds the full-index solutions encoded by one partial solution, or
/// `None` if a branch cannot be completed (the common case; most partial
/// solutions are false positives of the truncated search).
fn expand_partial(base_state: &HashState, partial: &[u8]) -> Option<Vec<Vec<u32>>> {
    let p = base_state.params;
    let collision_byte_length = p.collision_byte_length();
    let ilen = p.index_bits();
    let recreate_size = untruncate_index(1, 0, ilen);
    let mut hash_len = p.hash_length();
    let mut tail_len = 4;

    // Per leaf, every full index whose top bits match the partial solution
    let mut lists: Vec<Vec<FullStepRow>> = partial
        .iter()
        .map(|&t| {
            (0..recreate_size)
                .map(|r| FullStepRow::from_hash(base_state, untruncate_index(t, r, ilen)))
                .collect()
        })
        .collect();

    let mut level = 0u32;
    while lists.len() > 1 {
        let mut next = Vec::with_capacity(lists.len() / 2);
        let mut pairs = lists.into_iter();
        let mut v = 0;
        while let (Some(left), Some(right)) = (pairs.next(), pairs.next()) {
            let mut merged = left;
            merged.extend(right);
            merged.sort_unstable_by(|a, b| a.hash[..hash_len].cmp(&b.hash[..hash_len]));

            let left_trunc = partial[(1 << level) * v];
            let right_trunc = partial[(1 << level) * (v + 1)];
            collide_branches(
                &mut merged,
                hash_len,
                tail_len,
                collision_byte_length,
                ilen,
                left_trunc,
                right_trunc,
            );
            if merged.is_empty() {
                return None;
            }

            next.push(merged);
            v += 2;
        }
        lists = next;
        hash_len -= collision_byte_length;
        tail_len *= 2;
        level += 1;
    }

    // The branch collisions have pinned all but the last chunk; the root
    // prefix must cancel it too
    let root = lists.pop()?;
    Some(
        root.iter()
            .filter(|row| row.is_zero(hash_len))
            .map(|row| row.indices(hash_len, tail_len))
            .collect(),
    )
}

/// One collision round restricted to pairs whose subtrees hang off the
/// expected truncated branches of the partial solution.
fn collide_branches(
    rows: &mut Vec<FullStepRow>,
    hash_len: usize,
    tail_len: usize,
    collision_byte_length: usize,
    ilen: u32,
    left_trunc: u8,
    right_trunc: u8,
) {
    collide(
        rows,
        |a, b| has_collision(&a.hash, &b.hash, collision_byte_length),
        |a, b, out| {
            if distinct_indices(a.indices(hash_len, tail_len), b.indices(hash_len, tail_len)) {
                if is_valid_branch(a, hash_len, ilen, left_trunc)
                    && is_valid_branch(b, hash_len, ilen, right_trunc)
                {
                    out.push(FullStepRow::merge(
                        a,
                        b,
                        hash_len,
                        tail_len,
                        collision_byte_length,
                    ));
                } else if is_valid_branch(b, hash_len, ilen, left_trunc)
                    && is_valid_branch(a, hash_len, ilen, right_trunc)
                {
                    out.push(FullStepRow::merge(
                        b,
                        a,
                        hash_len,
                        tail_len,
                        collision_byte_length,
                    ));
                }
            }
        },
    );
}

fn is_valid_branch(row: &FullStepRow, hash_len: usize, ilen: u32, t: u8) -> bool {
    truncate_index(row.leading_index(hash_len), ilen) == t
}

#[cfg(test)]
mod tests {
    use super::{
        basic_solve, basic_solve_cancellable, optimised_solve, optimised_solve_cancellable,
    };
    use crate::state::{generate_hash, init_state, HashState};
    use crate::verify::is_valid_solution;

    fn test_state() -> HashState {
        init_state(48, 5, b"block commitments", &[0; 32]).unwrap()
    }

    #[test]
    fn basic_solve_finds_verifiable_solutions() {
        let state = test_state();
        let solutions = basic_solve(&state);
        assert!(!solutions.is_empty());
        for solution in &solutions {
            assert_eq!(solution.len(), 32);
            assert!(is_valid_solution(&state, solution).is_ok());
        }
    }

    #[test]
    fn solvers_are_deterministic() {
        let state = test_state();
        assert_eq!(basic_solve(&state), basic_solve(&state));
        assert_eq!(optimised_solve(&state), optimised_solve(&state));
    }

    #[test]
    fn optimised_solve_matches_basic_solve() {
        let state = test_state();
        let solutions = optimised_solve(&state);
        assert!(!solutions.is_empty());
        assert_eq!(solutions, basic_solve(&state));
    }

    #[test]
    fn solutions_satisfy_the_birthday_property() {
        // 2^k distinct in-range indices whose hashes XOR to zero
        let state = test_state();
        for solution in basic_solve(&state) {
            let mut deduped = solution.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(deduped.len(), solution.len());
            assert!(solution.iter().all(|&i| i < 1 << 9));

            let mut xor = [0u8; 6];
            for &i in &solution {
                for (x, h) in xor.iter_mut().zip(generate_hash(&state, i).as_bytes()) {
                    *x ^= h;
                }
            }
            assert_eq!(xor, [0; 6]);
        }
    }

    #[test]
    fn cancellation_returns_the_solutions_found_so_far() {
        let state = test_state();
        assert!(basic_solve_cancellable(&state, || true).is_empty());
        assert!(optimised_solve_cancellable(&state, || true).is_empty());

        // A probe that never fires leaves the result unchanged
        assert_eq!(basic_solve_cancellable(&state, || false), basic_solve(&state));
    }
}
