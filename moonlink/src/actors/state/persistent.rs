//! Typed persistent state for activations.
//!
//! `PersistentState<T>` is a typed, cached view over a
//! [`DurableRecordStore`] record. It handles serialization, ETag tracking and
//! dirty tracking, and exposes `state()` / `state_mut()` accessors.
//!
//! # Usage
//!
//! Workers load it in their activation hook and keep it as a field:
//!
//! ```rust,ignore
//! async fn on_activate(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
//!     self.state = Some(PersistentState::load(ctx.store().clone(), "url-store", &ctx.id.identity).await?);
//!     Ok(())
//! }
//! ```
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' `IPersistentState<T>`.

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::store::{DurableRecordStore, StoreError};

/// Typed persistent state for one key.
pub struct PersistentState<T> {
    value: T,
    etag: Option<String>,
    record_exists: bool,
    dirty: bool,
    store: Rc<dyn DurableRecordStore>,
    record_type: String,
    key: String,
}

impl<T> std::fmt::Debug for PersistentState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentState")
            .field("record_type", &self.record_type)
            .field("key", &self.key)
            .field("etag", &self.etag)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<T: Serialize + DeserializeOwned + Default> PersistentState<T> {
    /// Load state from the store, or start from `T::default()` when the
    /// record does not exist.
    pub async fn load(
        store: Rc<dyn DurableRecordStore>,
        record_type: &str,
        key: &str,
    ) -> Result<Self, StoreError> {
        let mut state = Self {
            value: T::default(),
            etag: None,
            record_exists: false,
            dirty: false,
            store,
            record_type: record_type.to_string(),
            key: key.to_string(),
        };
        state.read_state().await?;
        Ok(state)
    }

    /// Get a reference to the current state.
    pub fn state(&self) -> &T {
        &self.value
    }

    /// Get a mutable reference to the current state and mark it dirty.
    ///
    /// Changes are only persisted when [`write_state`](Self::write_state) is
    /// called.
    pub fn state_mut(&mut self) -> &mut T {
        self.dirty = true;
        &mut self.value
    }

    /// Whether the record has been written at least once.
    pub fn record_exists(&self) -> bool {
        self.record_exists
    }

    /// The current ETag, or `None` if the record has never been written.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Whether the in-memory value has changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the current value using the cached ETag.
    pub async fn write_state(&mut self) -> Result<(), StoreError> {
        let data =
            serde_json::to_vec(&self.value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let etag = self
            .store
            .put(&self.record_type, &self.key, data, self.etag.as_deref())
            .await?;
        self.etag = Some(etag);
        self.record_exists = true;
        self.dirty = false;
        Ok(())
    }

    /// Persist the current value, overwriting a concurrent writer.
    ///
    /// On an ETag conflict the stored ETag is re-read and the write is
    /// attempted once more with it.
    pub async fn write_state_last_wins(&mut self) -> Result<(), StoreError> {
        match self.write_state().await {
            Err(StoreError::ETagMismatch { expected, actual }) => {
                tracing::warn!(
                    record_type = %self.record_type,
                    key = %self.key,
                    expected = %expected,
                    actual = %actual,
                    "etag conflict, overwriting concurrent write"
                );
                self.etag = self
                    .store
                    .get(&self.record_type, &self.key)
                    .await?
                    .map(|stored| stored.etag);
                self.write_state().await
            }
            other => other,
        }
    }

    /// Persist `value` and make it the current state once the store has
    /// accepted it. On failure the previous value and ETag are kept.
    pub async fn commit(&mut self, value: T) -> Result<(), StoreError> {
        let previous = std::mem::replace(&mut self.value, value);
        let previous_etag = self.etag.clone();
        match self.write_state_last_wins().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.value = previous;
                self.etag = previous_etag;
                Err(e)
            }
        }
    }

    /// Re-read the record from the store, replacing the local value.
    pub async fn read_state(&mut self) -> Result<(), StoreError> {
        let stored = self.store.get(&self.record_type, &self.key).await?;
        match stored {
            Some(entry) => {
                self.value = serde_json::from_slice(&entry.data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                self.etag = Some(entry.etag);
                self.record_exists = true;
            }
            None => {
                self.value = T::default();
                self.etag = None;
                self.record_exists = false;
            }
        }
        self.dirty = false;
        Ok(())
    }
}
