//! Injectable randomness for session ids and passwords.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Shared random number source.
///
/// Production code seeds from the OS; tests pass a fixed seed so the
/// sequence of generated ids can be predicted.
pub struct Entropy {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl Entropy {
    /// Wrap an arbitrary generator.
    pub fn from_rng(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Generator seeded from operating system entropy.
    pub fn from_os() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic generator for a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
        // A panic while drawing numbers leaves the generator usable.
        let mut guard = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **guard)
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self::from_os()
    }
}

impl std::fmt::Debug for Entropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entropy").finish_non_exhaustive()
    }
}
