//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to test error handling and
//! recovery. Used to check that append retries, replay fallbacks, and the
//! dispatch loop all survive a flaky event log.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use murmur_core::ChatEvent;

use super::{Storage, StorageError};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but fails operations
/// based on a configured failure rate. A failed operation never reaches the
/// inner storage, so an injected append failure records nothing.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operation counter
    operation_count: Arc<AtomicUsize>,
}

/// Simple deterministic RNG for chaos injection
///
/// Linear congruential generator: fast, and reproducible with the same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted, failed ones included.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Count the operation and decide whether it fails.
    fn inject(&self) -> Result<(), StorageError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);

        let fail = match self.rng.lock() {
            Ok(mut rng) => rng.should_fail(self.failure_rate),
            Err(_) => true,
        };

        if fail { Err(StorageError::Io("chaotic failure injection".to_string())) } else { Ok(()) }
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn append(&self, event: &ChatEvent) -> Result<u64, StorageError> {
        self.inject()?;
        self.inner.append(event)
    }

    fn read_last(&self, n: usize) -> Result<Vec<ChatEvent>, StorageError> {
        self.inject()?;
        self.inner.read_last(n)
    }

    fn event_count(&self) -> Result<u64, StorageError> {
        self.inject()?;
        self.inner.event_count()
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::Identity;

    use super::*;
    use crate::storage::MemoryStorage;

    fn message(text: &str) -> ChatEvent {
        ChatEvent::message(&Identity::new("Alice", "FF0000"), text)
    }

    #[test]
    fn test_chaotic_with_zero_failure_rate() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 0.0);

        for _ in 0..100 {
            assert!(storage.append(&message("x")).is_ok());
        }

        assert_eq!(storage.inner().event_count().unwrap(), 100);
    }

    #[test]
    fn test_chaotic_with_100_failure_rate() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 1.0);

        for _ in 0..10 {
            assert!(matches!(storage.append(&message("x")), Err(StorageError::Io(_))));
        }

        // Failed appends never reach the inner log
        assert_eq!(storage.inner().event_count().unwrap(), 0);
        assert_eq!(storage.operation_count(), 10);
    }

    #[test]
    fn test_chaotic_deterministic_with_seed() {
        let outcomes = |seed| {
            let storage = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, seed);
            (0..50).map(|_| storage.append(&message("x")).is_ok()).collect::<Vec<_>>()
        };

        assert_eq!(outcomes(42), outcomes(42));
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn test_chaotic_rejects_invalid_failure_rate() {
        let _ = ChaoticStorage::new(MemoryStorage::new(), 1.5);
    }
}
