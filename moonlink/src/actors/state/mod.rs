//! Actor state persistence: durable record store and typed persistent state.

pub(crate) mod persistent;
pub(crate) mod store;

pub use persistent::PersistentState;
pub use store::{DurableRecordStore, InMemoryRecordStore, StoreError, StoredRecord};
