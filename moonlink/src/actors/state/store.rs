//! Durable record store: the persistence contract activations rely on.
//!
//! Given a record type and a key, the store reads and writes opaque bytes
//! with ETag-based optimistic concurrency control. The backend's own
//! availability is its business; the runtime only maps its failures to
//! retryable errors.
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' `IGrainStorage` provider interface, with
//! `StoredRecord` mapping to `GrainState<T>`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Write failed because the stored ETag does not match the expected ETag.
    #[error("ETag mismatch: expected {expected:?}, found {actual:?}")]
    ETagMismatch {
        /// The ETag the caller expected.
        expected: String,
        /// The ETag currently in the store (empty when there is no record).
        actual: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A stored record: serialized data plus an ETag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Serialized bytes.
    pub data: Vec<u8>,
    /// Optimistic concurrency token.
    pub etag: String,
}

/// Key-value persistence with version semantics.
///
/// Records are keyed by a record type name and a key string.
#[async_trait::async_trait(?Send)]
pub trait DurableRecordStore: fmt::Debug {
    /// Read a record. `Ok(None)` means it was never written.
    async fn get(&self, record_type: &str, key: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Write a record, returning its new ETag.
    ///
    /// With `expected_etag == Some(_)`, the write only succeeds if the stored
    /// ETag matches. With `None`, the write is unconditional.
    async fn put(
        &self,
        record_type: &str,
        key: &str,
        data: Vec<u8>,
        expected_etag: Option<&str>,
    ) -> Result<String, StoreError>;
}

/// In-memory store for tests and single-process deployments.
///
/// ETags are monotonically increasing counter values. The store can be
/// switched offline to exercise the runtime's retry path.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    entries: RefCell<HashMap<(String, String), StoredRecord>>,
    counter: Cell<u64>,
    available: Cell<bool>,
    reads: Cell<usize>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            counter: Cell::new(0),
            available: Cell::new(true),
            reads: Cell::new(0),
        }
    }

    /// Take the store offline (`false`) or bring it back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }

    /// Number of `get` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Raw record, bypassing availability and read counting.
    pub fn peek(&self, record_type: &str, key: &str) -> Option<StoredRecord> {
        self.entries
            .borrow()
            .get(&(record_type.to_string(), key.to_string()))
            .cloned()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.get() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".into()))
        }
    }

    fn check_etag(
        current: Option<&StoredRecord>,
        expected_etag: Option<&str>,
    ) -> Result<(), StoreError> {
        match (expected_etag, current) {
            (None, _) => Ok(()),
            (Some(expected), Some(existing)) if existing.etag == expected => Ok(()),
            (Some(expected), existing) => Err(StoreError::ETagMismatch {
                expected: expected.to_string(),
                actual: existing.map(|e| e.etag.clone()).unwrap_or_default(),
            }),
        }
    }

    fn next_etag(&self) -> String {
        let val = self.counter.get() + 1;
        self.counter.set(val);
        val.to_string()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait(?Send)]
impl DurableRecordStore for InMemoryRecordStore {
    async fn get(&self, record_type: &str, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        self.check_available()?;
        self.reads.set(self.reads.get() + 1);
        Ok(self.peek(record_type, key))
    }

    async fn put(
        &self,
        record_type: &str,
        key: &str,
        data: Vec<u8>,
        expected_etag: Option<&str>,
    ) -> Result<String, StoreError> {
        self.check_available()?;
        let key = (record_type.to_string(), key.to_string());
        let mut entries = self.entries.borrow_mut();
        Self::check_etag(entries.get(&key), expected_etag)?;

        let etag = self.next_etag();
        entries.insert(
            key,
            StoredRecord {
                data,
                etag: etag.clone(),
            },
        );
        Ok(etag)
    }
}
