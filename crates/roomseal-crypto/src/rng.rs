//! Randomness capability for nonce and salt generation
//!
//! Every encrypting operation takes a `NonceSource` so tests can substitute
//! a deterministic source. Production code uses [`OsRandom`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;

/// A source of unpredictable bytes, safe to share between concurrent operations.
pub trait NonceSource: Send + Sync {
    /// Fill `dest` with fresh bytes. Two calls must never produce the same output.
    fn fill(&self, dest: &mut [u8]);
}

/// The operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl NonceSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

impl<T: NonceSource + ?Sized> NonceSource for &T {
    fn fill(&self, dest: &mut [u8]) {
        (**self).fill(dest)
    }
}

impl<T: NonceSource + ?Sized> NonceSource for Arc<T> {
    fn fill(&self, dest: &mut [u8]) {
        (**self).fill(dest)
    }
}

/// Deterministic source: writes a monotonically increasing counter into the
/// leading bytes of each output and zeroes the rest.
///
/// Not random. Every call is still unique, which is all the AEAD layer needs,
/// so tests can assert exact nonces.
#[derive(Debug, Default)]
pub struct CounterSource {
    next: AtomicU64,
}

impl CounterSource {
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl NonceSource for CounterSource {
    fn fill(&self, dest: &mut [u8]) {
        let value = self.next.fetch_add(1, Ordering::Relaxed).to_be_bytes();
        dest.fill(0);
        let n = dest.len().min(value.len());
        dest[..n].copy_from_slice(&value[..n]);
    }
}
