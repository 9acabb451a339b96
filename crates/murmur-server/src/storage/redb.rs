//! Redb-backed durable event log.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! Events survive server restarts.

use std::{path::Path, sync::Arc};

use murmur_core::ChatEvent;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{Storage, StorageError};

/// Table: events
/// Key: sequence number (u64, starts at 1, strictly increasing)
/// Value: CBOR-encoded `ChatEvent`
const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");

/// Durable event log backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
///
/// The "last N" read walks the key range backwards and stops after N
/// records, then reverses. It never derives positions from the row count, so
/// gaps in the sequence cannot shift the window.
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the EVENTS table if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(EVENTS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn append(&self, event: &ChatEvent) -> Result<u64, StorageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(event, &mut bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let seq = {
            let mut table = txn.open_table(EVENTS).map_err(|e| StorageError::Io(e.to_string()))?;

            let seq = match table.last().map_err(|e| StorageError::Io(e.to_string()))? {
                Some((key, _)) => key.value() + 1,
                None => 1,
            };

            table.insert(seq, bytes.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?;

            seq
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(seq)
    }

    fn read_last(&self, n: usize) -> Result<Vec<ChatEvent>, StorageError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(EVENTS).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut events = Vec::with_capacity(n);
        for result in table.iter().map_err(|e| StorageError::Io(e.to_string()))?.rev().take(n) {
            let (_, value) = result.map_err(|e| StorageError::Io(e.to_string()))?;

            let event: ChatEvent = ciborium::from_reader(value.value())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            events.push(event);
        }

        events.reverse();

        Ok(events)
    }

    fn event_count(&self) -> Result<u64, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(EVENTS).map_err(|e| StorageError::Io(e.to_string()))?;

        table.len().map_err(|e| StorageError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::{EventKind, Identity};
    use tempfile::tempdir;

    use super::*;

    fn message(text: &str) -> ChatEvent {
        ChatEvent::message(&Identity::new("Alice", "FF0000"), text)
    }

    #[test]
    fn test_append_assigns_sequential_numbers() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        for expected in 1..=3 {
            assert_eq!(storage.append(&message("x")).unwrap(), expected);
        }

        assert_eq!(storage.event_count().unwrap(), 3);
    }

    #[test]
    fn test_read_last_window() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        for i in 0..30 {
            storage.append(&message(&format!("msg {i}"))).unwrap();
        }

        let window = storage.read_last(20).unwrap();
        assert_eq!(window.len(), 20);
        assert_eq!(window[0].text, "msg 10");
        assert_eq!(window[19].text, "msg 29");
    }

    #[test]
    fn test_read_last_short_log() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        storage.append(&ChatEvent::connect(&Identity::new("Bob", "00FF00"))).unwrap();
        storage.append(&message("hello")).unwrap();

        let window = storage.read_last(20).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].kind, EventKind::Connect);
        assert_eq!(window[1].kind, EventKind::Message);
    }

    #[test]
    fn test_read_last_empty_log() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        assert!(storage.read_last(20).unwrap().is_empty());
        assert!(storage.read_last(0).unwrap().is_empty());
    }

    #[test]
    fn test_event_fields_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        let event = ChatEvent::message(&Identity::new("Zoë", "ABCDEF"), "héllo <b>");
        storage.append(&event).unwrap();

        assert_eq!(storage.read_last(1).unwrap(), vec![event]);
    }
}
