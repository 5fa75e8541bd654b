//! Deterministic per-account seeds.
//!
//! A market seed is expanded into one sub-seed per (account, stream) with
//! BLAKE3, so an account's randomness does not depend on how many other
//! accounts exist or the order they were built in.

use types::AccountId;

#[derive(Debug, Clone, Copy)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn sub_seed(&self, account: &AccountId, stream: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(account.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(stream.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}
