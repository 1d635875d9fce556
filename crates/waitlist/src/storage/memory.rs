use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BulkInsert, CollectionKind, Document, DocumentStore, InsertedId, StorageError};

/// In-process store used by tests and `serve --in-memory`.
///
/// Failure switches let callers simulate an unreachable or rejecting backend.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<CollectionKind, Vec<(InsertedId, Document)>>>,
    bound: AtomicBool,
    refuse_connects: AtomicUsize,
    reject_writes: AtomicBool,
    connect_attempts: AtomicUsize,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every `connect` fails.
    pub fn unreachable() -> Self {
        let store = Self::default();
        store.refuse_connects.store(usize::MAX, Ordering::SeqCst);
        store
    }

    /// Fail the next `count` connection attempts, then succeed.
    pub fn refuse_connects(&self, count: usize) {
        self.refuse_connects.store(count, Ordering::SeqCst);
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Drops the bound handles, as if the connection had been lost.
    pub fn disconnect(&self) {
        self.bound.store(false, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn documents(&self, collection: CollectionKind) -> Vec<(InsertedId, Document)> {
        let guard = self.collections.lock().expect("memory store mutex poisoned");
        guard.get(&collection).cloned().unwrap_or_default()
    }

    fn next_id(&self) -> InsertedId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        InsertedId(format!("{id:024x}"))
    }

    fn ensure_writable(&self, collection: CollectionKind) -> Result<(), StorageError> {
        if !self.bound.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(collection));
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write("write rejected by memory store".to_string()));
        }
        Ok(())
    }

    fn insert_locked(
        &self,
        stored: &mut Vec<(InsertedId, Document)>,
        document: Document,
    ) -> Result<InsertedId, StorageError> {
        // Documents carrying their own `_id` behave like a unique index.
        if let Some(key) = document.get("_id") {
            if stored.iter().any(|(_, existing)| existing.get("_id") == Some(key)) {
                return Err(StorageError::Duplicate);
            }
        }
        let id = self.next_id();
        stored.push((id.clone(), document));
        Ok(id)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn connect(&self) -> Result<(), StorageError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| match remaining {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if refused {
            return Err(StorageError::Connection("memory store refused connection".to_string()));
        }

        self.bound.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_bound(&self, _collection: CollectionKind) -> bool {
        self.bound.load(Ordering::SeqCst)
    }

    async fn insert_one(
        &self,
        collection: CollectionKind,
        document: Document,
    ) -> Result<InsertedId, StorageError> {
        self.ensure_writable(collection)?;
        let mut guard = self.collections.lock().expect("memory store mutex poisoned");
        let stored = guard.entry(collection).or_default();
        self.insert_locked(stored, document)
    }

    async fn insert_many(
        &self,
        collection: CollectionKind,
        documents: Vec<Document>,
    ) -> Result<BulkInsert, StorageError> {
        self.ensure_writable(collection)?;
        let total = documents.len();
        let mut guard = self.collections.lock().expect("memory store mutex poisoned");
        let stored = guard.entry(collection).or_default();

        let inserted = documents
            .into_iter()
            .map(|document| self.insert_locked(stored, document))
            .filter(Result::is_ok)
            .count();

        if inserted < total {
            return Err(StorageError::PartialWrite { inserted, total });
        }
        Ok(BulkInsert { inserted })
    }
}
