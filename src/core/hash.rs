//! State Hashing
//!
//! SHA-256 digests of run state, used to check that a replayed run
//! lands on exactly the same board as the live one.

use sha2::{Sha256, Digest};
use super::grid::Position;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Domain tag for run-state digests
const RUN_STATE_DOMAIN: &[u8] = b"CRYPT_SNAKE_STATE_V1";

/// Values with a fixed little-endian byte encoding.
pub trait Digestible {
    /// Feed this value into `hasher`.
    fn digest_into(&self, hasher: &mut Sha256);
}

macro_rules! digestible_int {
    ($($t:ty),*) => {
        $(impl Digestible for $t {
            #[inline]
            fn digest_into(&self, hasher: &mut Sha256) {
                hasher.update(self.to_le_bytes());
            }
        })*
    };
}

digestible_int!(u8, u32, u64, i32);

impl Digestible for bool {
    #[inline]
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update([*self as u8]);
    }
}

impl Digestible for Position {
    #[inline]
    fn digest_into(&self, hasher: &mut Sha256) {
        self.x.digest_into(hasher);
        self.y.digest_into(hasher);
    }
}

impl Digestible for [u8; 16] {
    #[inline]
    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self);
    }
}

/// Order-sensitive hasher for game state.
///
/// Collections must be fed in a stable order.
pub struct StateHasher {
    inner: Sha256,
}

impl StateHasher {
    /// Start a digest under `domain`.
    pub fn new(domain: &[u8]) -> Self {
        let mut inner = Sha256::new();
        inner.update(domain);
        Self { inner }
    }

    /// Feed one value. Returns `self` so calls chain.
    #[inline]
    pub fn feed<T: Digestible + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.digest_into(&mut self.inner);
        self
    }

    /// Feed a length prefix followed by every item.
    pub fn feed_all<'a, T, I>(&mut self, items: I) -> &mut Self
    where
        T: Digestible + 'a,
        I: ExactSizeIterator<Item = &'a T>,
    {
        self.feed(&(items.len() as u32));
        for item in items {
            self.feed(item);
        }
        self
    }

    /// Finish the digest.
    pub fn finalize(self) -> StateHash {
        self.inner.finalize().into()
    }
}

/// Hash one run's state at `tick`.
///
/// `add_state` appends everything after the tick and seed.
pub fn compute_state_hash<F>(tick: u32, rng_seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::new(RUN_STATE_DOMAIN);
    hasher.feed(&tick).feed(&rng_seed);
    add_state(&mut hasher);
    hasher.finalize()
}
