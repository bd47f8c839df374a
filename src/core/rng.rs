//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. Every random draw the engine
//! makes (cell placement, pickup rolls, hazard kinds, relic offers) comes
//! from one of these, so a run is reproducible from its seed and its
//! recorded intents.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::grid::Position;

/// Domain tag for run seed derivation
const RUN_SEED_DOMAIN: &[u8] = b"CRYPT_SNAKE_SEED_V1";

/// Seeded Xorshift128+ generator.
///
/// ```
/// use crypt_snake::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.random_cell(24), b.random_cell(24));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    s0: u64,
    s1: u64,
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Seed a generator. Weak seeds (0, 1, ...) are spread by SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut mix = SplitMix64(seed);
        let (s0, s1) = (mix.next(), mix.next());

        // All-zero is a fixed point of xorshift
        if s0 | s1 == 0 {
            return Self { s0: 1, s1: 1 };
        }
        Self { s0, s1 }
    }

    /// Next raw 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let (a, b) = (self.s0, self.s1);
        let out = a.wrapping_add(b);

        let x = b ^ a;
        self.s0 = a.rotate_left(24) ^ x ^ (x << 16);
        self.s1 = x.rotate_left(37);
        out
    }

    /// Uniform value in `[0, bound)`; zero when `bound` is zero.
    #[inline]
    pub fn below(&mut self, bound: u32) -> u32 {
        match bound {
            0 => 0,
            n => (self.next_u64() % u64::from(n)) as u32,
        }
    }

    /// Uniform index into a collection of `len` items.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> usize {
        self.below(len as u32) as usize
    }

    /// True with probability `percent`/100.
    #[inline]
    pub fn chance_percent(&mut self, percent: u32) -> bool {
        self.below(100) < percent
    }

    /// Fair coin.
    #[inline]
    pub fn coin(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }

    /// Uniform cell on a `cells`-sized board.
    pub fn random_cell(&mut self, cells: i32) -> Position {
        let n = cells.max(0) as u32;
        let x = self.below(n) as i32;
        let y = self.below(n) as i32;
        Position::new(x, y)
    }

    /// Raw generator state, folded into the state hash.
    pub fn state(&self) -> [u64; 2] {
        [self.s0, self.s1]
    }
}

struct SplitMix64(u64);

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Derive the seed for one run of one profile.
///
/// `run_nonce` increments on every start, so a restart never replays the
/// previous board while the session stays reproducible from `base_seed`.
pub fn derive_run_seed(profile_id: &[u8; 16], base_seed: u64, run_nonce: u64) -> u64 {
    let digest = Sha256::new()
        .chain_update(RUN_SEED_DOMAIN)
        .chain_update(profile_id)
        .chain_update(base_seed.to_le_bytes())
        .chain_update(run_nonce.to_le_bytes())
        .finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = DeterministicRng::new(12345);
        let mut b = DeterministicRng::new(12345);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }

        let mut c = DeterministicRng::new(54321);
        assert_ne!(DeterministicRng::new(12345).next_u64(), c.next_u64());
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = DeterministicRng::new(0);
        let draws: Vec<u64> = (0..4).map(|_| rng.next_u64()).collect();
        assert!(draws.iter().any(|&v| v != 0));
    }

    #[test]
    fn test_below_bounds() {
        let mut rng = DeterministicRng::new(1234);
        for _ in 0..1000 {
            assert!(rng.below(24) < 24);
        }
        assert_eq!(rng.below(0), 0);
        assert_eq!(rng.below(1), 0);
    }

    #[test]
    fn test_random_cell_in_bounds() {
        let mut rng = DeterministicRng::new(7777);
        for _ in 0..500 {
            assert!(rng.random_cell(24).in_bounds(24));
            assert!(rng.random_cell(48).in_bounds(48));
        }
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = DeterministicRng::new(99);
        for _ in 0..200 {
            assert!(!rng.chance_percent(0));
            assert!(rng.chance_percent(100));
        }
    }

    #[test]
    fn test_coin_is_roughly_fair() {
        let mut rng = DeterministicRng::new(31);
        let heads = (0..10_000).filter(|_| rng.coin()).count();
        assert!((4_500..5_500).contains(&heads));
    }

    #[test]
    fn test_derive_run_seed() {
        let profile = [7u8; 16];
        let seed = derive_run_seed(&profile, 42, 0);
        assert_eq!(seed, derive_run_seed(&profile, 42, 0));

        // Each restart gets a fresh board
        assert_ne!(seed, derive_run_seed(&profile, 42, 1));
        assert_ne!(seed, derive_run_seed(&profile, 43, 0));
        assert_ne!(seed, derive_run_seed(&[8u8; 16], 42, 0));
    }
}
