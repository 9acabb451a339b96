//! Durable chat event log.
//!
//! Trait-based abstraction over an append-only, ordered log of
//! [`ChatEvent`]s. The trait is synchronous: appends and reads run inline on
//! the dispatch path, which is what keeps log order identical to dispatch
//! order.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use murmur_core::ChatEvent;

pub use self::redb::RedbStorage;

/// Append-only event log.
///
/// Must be Clone (the runtime and tests may hold handles to the same log),
/// Send + Sync, and synchronous. Implementations share internal state via
/// Arc, so clones see the same events.
///
/// # Invariants
///
/// - Every successful `append` gets a sequence number strictly greater than
///   all earlier ones. Sequence numbers start at 1.
/// - Reads return events in sequence order.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Durably record one event and return its sequence number.
    ///
    /// On error nothing is recorded.
    fn append(&self, event: &ChatEvent) -> Result<u64, StorageError>;

    /// Up to `n` most recent events, oldest first.
    ///
    /// Returns all events if fewer than `n` exist, and nothing for `n == 0`.
    fn read_last(&self, n: usize) -> Result<Vec<ChatEvent>, StorageError>;

    /// Number of events stored.
    fn event_count(&self) -> Result<u64, StorageError>;
}
