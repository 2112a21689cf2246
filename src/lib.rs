//! The Equihash Proof-of-Work function.
//!
//! Equihash is an asymmetric memory-hard proof-of-work based on the
//! Generalised Birthday problem: for parameters `(n, k)`, find `2^k` distinct
//! indices whose seeded n-bit hashes XOR to zero, arranged as a canonically
//! ordered binary tree of pairwise collisions.
//!
//! This crate provides the seeded hash state, two solvers (a straightforward
//! full-index one and a memory-optimised truncated-index one), and a verifier
//! that runs in time proportional only to the solution size.
//!
//! Reference: Alex Biryukov and Dmitry Khovratovich, "Equihash: Asymmetric
//! Proof-of-Work Based on the Generalized Birthday Problem", NDSS '16.

mod collide;
mod index;
mod params;
mod row;
mod solve;
mod state;
mod verify;

pub use solve::{
    basic_solve, basic_solve_cancellable, optimised_solve, optimised_solve_cancellable,
};
pub use state::{init_state, HashState};
pub use verify::{is_valid_solution, Error};
