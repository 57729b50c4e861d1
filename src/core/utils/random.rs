//! Seeded random number helpers.
//!
//! Every random decision in the crate draws from an explicitly seeded
//! [`StdRng`]; nothing reads ambient or thread-local random state, so two runs
//! with the same seed and the same chunk layout make the same choices.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A wrapper for a seeded random generator
#[derive(Debug, Clone)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    /// Constructor, with specific seed
    pub fn with_seed(seed: u64) -> Self {
        Random {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generator for one cluster node, derived from the forest seed.
    pub fn for_node(seed: u64, node_index: u16) -> Self {
        Self::with_seed(node_seed(seed, node_index))
    }

    /// Uniform integer in `[0, upper_bound)`. `upper_bound` must be positive.
    pub fn next_index(&mut self, upper_bound: usize) -> usize {
        self.rng.gen_range(0..upper_bound)
    }
}

impl rand::RngCore for Random {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Mixes a node index into the forest seed (splitmix64 finalizer).
pub fn node_seed(seed: u64, node_index: u16) -> u64 {
    let mut z = seed ^ (u64::from(node_index) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Index of a maximal entry of `values`. Ties are broken uniformly at random
/// among all maximal entries, so repeated ties do not favour low indices.
///
/// Returns 0 for an empty slice.
pub fn max_index<R: Rng + ?Sized>(values: &[usize], rng: &mut R) -> usize {
    let mut best = 0;
    let mut ties = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if i == 0 || v > values[best] {
            best = i;
            ties = 1;
        } else if v == values[best] {
            ties += 1;
            // reservoir sampling over the tied entries
            if rng.gen_range(0..ties) == 0 {
                best = i;
            }
        }
    }
    best
}
