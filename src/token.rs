//! Random public id tokens
//!
//! Tokens draw from `a-z A-Z 2-9` minus the easily confused `l L o O`
//! (56 symbols). One generator is seeded once and shared; callers that need
//! reproducible tokens supply a seed.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{FolioError, Result};

/// Symbols used in tokens
pub const ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHIJKMNPQRSTUVWXYZ23456789";

/// Shared random token source
pub struct TokenGenerator {
    rng: Mutex<StdRng>,
    min_len: usize,
    max_len: usize,
}

impl TokenGenerator {
    /// Generator seeded from the operating system
    ///
    /// Token length is drawn uniformly from `[min_len, max_len]`; when
    /// `min_len >= max_len` every token has exactly `min_len` symbols.
    /// A `min_len` of 0 is rejected: the empty token can only be used once.
    pub fn new(min_len: usize, max_len: usize) -> Result<Self> {
        Self::from_rng(StdRng::from_entropy(), min_len, max_len)
    }

    /// Deterministic generator
    pub fn with_seed(seed: u64, min_len: usize, max_len: usize) -> Result<Self> {
        Self::from_rng(StdRng::seed_from_u64(seed), min_len, max_len)
    }

    fn from_rng(rng: StdRng, min_len: usize, max_len: usize) -> Result<Self> {
        if min_len == 0 {
            return Err(FolioError::Config(
                "public id tokens need at least one symbol".to_string(),
            ));
        }
        Ok(Self {
            rng: Mutex::new(rng),
            min_len,
            max_len,
        })
    }

    /// Next random token
    pub fn generate(&self) -> String {
        let mut rng = self.rng.lock();
        let len = if self.min_len < self.max_len {
            rng.gen_range(self.min_len..=self.max_len)
        } else {
            self.min_len
        };
        (0..len)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}
