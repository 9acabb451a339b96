use std::sync::{Arc, Mutex, MutexGuard};

use murmur_core::ChatEvent;

use super::{Storage, StorageError};

/// In-memory event log for testing and simulation
///
/// Events are kept in a Vec in sequence order, so `read_last` is a slice of
/// the tail. All state is wrapped in Arc<Mutex<>> to allow Clone and
/// concurrent access. A poisoned mutex is reported as `StorageError::Io`.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Vec<(u64, ChatEvent)>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<(u64, ChatEvent)>>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::Io("mutex poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn append(&self, event: &ChatEvent) -> Result<u64, StorageError> {
        let mut events = self.lock()?;

        let seq = events.last().map_or(1, |(seq, _)| seq + 1);
        events.push((seq, event.clone()));

        debug_assert!(events.windows(2).all(|w| w[0].0 < w[1].0));

        Ok(seq)
    }

    fn read_last(&self, n: usize) -> Result<Vec<ChatEvent>, StorageError> {
        let events = self.lock()?;

        let start = events.len().saturating_sub(n);
        Ok(events[start..].iter().map(|(_, event)| event.clone()).collect())
    }

    fn event_count(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.len() as u64)
    }
}
