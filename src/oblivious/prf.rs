//! Switch-bit generation for the permutation network.
//!
//! Every switch in the Waksman network draws its control bit from a keyed
//! hash of `(nonce, level, position)`. The key is process-wide, drawn once
//! from the OS; the nonce comes from a monotonic counter so no two shuffle
//! invocations share a `(key, nonce)` pair. Control bits therefore depend
//! only on public quantities — never on tuple values.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use xxhash_rust::xxh3::xxh3_64_with_seed;

static PROCESS_KEY: OnceLock<u64> = OnceLock::new();
static NONCE_COUNTER: AtomicU64 = AtomicU64::new(1);

fn process_key() -> u64 {
    *PROCESS_KEY.get_or_init(|| {
        let mut buf = [0u8; 8];
        // Falling back to a fixed key would silently degrade the shuffle
        // to a deterministic permutation; fail loudly instead.
        getrandom::getrandom(&mut buf).expect("OS randomness unavailable for shuffle key");
        u64::from_le_bytes(buf)
    })
}

/// Next unique shuffle nonce.
pub fn next_nonce() -> u64 {
    NONCE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Per-invocation switch-bit source: a PRF keyed by `(key, nonce)`.
#[derive(Debug, Clone, Copy)]
pub struct ShuffleRng {
    key: u64,
    nonce: u64,
}

impl ShuffleRng {
    /// Fresh source under the process key with a new nonce.
    pub fn fresh() -> Self {
        ShuffleRng {
            key: process_key(),
            nonce: next_nonce(),
        }
    }

    /// Deterministic source for tests and reproduction runs.
    pub fn with_key_nonce(key: u64, nonce: u64) -> Self {
        ShuffleRng { key, nonce }
    }

    /// Derive an independent source for a sub-shuffle (k-way groups).
    ///
    /// Deterministic in `(key, nonce, salt)`, so fixed-nonce runs stay
    /// reproducible while sub-shuffles get disjoint PRF domains.
    pub fn derive(&self, salt: u64) -> ShuffleRng {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&self.nonce.to_le_bytes());
        block[8..].copy_from_slice(&salt.to_le_bytes());
        ShuffleRng {
            key: self.key,
            nonce: xxh3_64_with_seed(&block, self.key ^ 0x9e37_79b9_7f4a_7c15),
        }
    }

    /// Control bit for the switch at `(level, position)`.
    pub fn switch_bit(&self, level: u32, position: u64) -> bool {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&self.nonce.to_le_bytes());
        block[8..12].copy_from_slice(&level.to_le_bytes());
        block[12..16].copy_from_slice(&(position as u32).to_le_bytes());
        xxh3_64_with_seed(&block, self.key) & 1 == 1
    }
}
