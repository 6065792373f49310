//! Deterministic per-combination RNG.
//!
//! A master seed is expanded into one sub-seed per combination index via
//! BLAKE3. Derivation does not depend on processing order, so tie-breaks are
//! identical regardless of thread count or batch size.

use rand::rngs::StdRng;
use rand::SeedableRng;

const DOMAIN_TAG: &[u8] = b"cscv-tie-break";

/// Source of per-combination random streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinationRng {
    master_seed: u64,
}

impl CombinationRng {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive the sub-seed for a combination index.
    pub fn sub_seed(&self, combination: usize) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(DOMAIN_TAG);
        hasher.update(&(combination as u64).to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Seeded `StdRng` for one combination.
    pub fn rng_for(&self, combination: usize) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(combination))
    }
}
