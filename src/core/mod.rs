//! Core deterministic primitives.
//!
//! Grid arithmetic, seeded randomness and state hashing. Nothing in here
//! knows about snakes; the game layer builds on top of it.

pub mod grid;
pub mod rng;
pub mod hash;

// Re-export core types
pub use grid::{Direction, Position, wrap};
pub use rng::{DeterministicRng, derive_run_seed};
pub use hash::{compute_state_hash, Digestible, StateHash, StateHasher};
