//! Hash primitives: SHA-256, SHA3-512, and the Shandwich-256 composite.
//!
//! Shandwich-256 is the network's 32-byte hash: SHA-256 computed over the
//! SHA3-512 digest of the input, stacking the two unrelated constructions.
//! One-shot and incremental forms agree bit for bit, and the published test
//! vector pins the construction across implementations.

use sha2::{Digest, Sha256};
use sha3::Sha3_512;

/// Compute SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Compute SHA3-512.
pub fn sha3_512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha3_512::digest(data));
    out
}

/// Compute Shandwich-256: `sha256(sha3_512(x))`.
pub fn shandwich256(data: &[u8]) -> [u8; 32] {
    let mut h = Shandwich256::new();
    h.update(data);
    h.finalize()
}

/// Incremental Shandwich-256 hasher.
///
/// Input streams into the inner SHA3-512; the outer SHA-256 runs once at
/// finalization over the 64-byte inner digest.
#[derive(Clone)]
pub struct Shandwich256 {
    inner: Sha3_512,
}

impl Shandwich256 {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha3_512::new(),
        }
    }

    /// Absorb input.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Produce the 32-byte composite digest.
    pub fn finalize(self) -> [u8; 32] {
        let wide = self.inner.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(&wide));
        out
    }
}

impl Default for Shandwich256 {
    fn default() -> Self {
        Self::new()
    }
}
