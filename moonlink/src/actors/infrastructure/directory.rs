//! Actor directory: maps actor identities to their current activation.
//!
//! Given an `ActorId`, the directory returns the [`ActorAddress`] of the
//! activation that currently owns it. An activation registers itself before
//! it becomes `Active`; the router consults the directory before falling
//! back to placement.
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' `IGrainDirectory`:
//! - `Register(GrainAddress)` → returns existing on conflict
//! - `Lookup(GrainId)` → returns `GrainAddress?`
//! - `Unregister(GrainAddress)` → removes only if activation ID matches
//! - `UnregisterSilos(List<SiloAddress>)` → batch cleanup on node death

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::actors::types::{ActorAddress, ActorId};
use crate::NetworkAddress;

/// Errors from directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory backend could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Directory for resolving actor identities to their activation addresses.
///
/// # Register Semantics
///
/// `register()` never overwrites:
/// - If no entry exists: registers the new address and returns it
/// - If an entry already exists: returns the existing entry unchanged
///
/// The caller compares the returned activation ID with its own. A mismatch
/// means another activation won.
#[async_trait::async_trait(?Send)]
pub trait ActorDirectory: fmt::Debug {
    /// Look up the current address for an actor.
    async fn lookup(&self, id: &ActorId) -> Result<Option<ActorAddress>, DirectoryError>;

    /// Register an activation, returning whichever entry is now current.
    async fn register(&self, address: ActorAddress) -> Result<ActorAddress, DirectoryError>;

    /// Remove an activation from the directory.
    ///
    /// Only removes the entry if the activation ID matches, so a node never
    /// drops a newer activation registered elsewhere. Unknown entries are
    /// not an error.
    async fn unregister(&self, address: &ActorAddress) -> Result<(), DirectoryError>;

    /// Remove all entries hosted on the given nodes.
    ///
    /// Called when nodes are declared dead so their keys can be re-activated
    /// elsewhere. Returns the removed entries.
    async fn unregister_members(
        &self,
        nodes: &[NetworkAddress],
    ) -> Result<Vec<ActorAddress>, DirectoryError>;

    /// List all entries. Order is unspecified.
    async fn list_all(&self) -> Result<Vec<ActorAddress>, DirectoryError>;
}

/// Shared in-memory directory.
///
/// Nodes running in one process share an `Rc<InMemoryDirectory>`, which
/// gives them the strongly consistent registry the runtime expects.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RefCell<HashMap<ActorId, ActorAddress>>,
}

impl InMemoryDirectory {
    /// Create a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered activations.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[async_trait::async_trait(?Send)]
impl ActorDirectory for InMemoryDirectory {
    async fn lookup(&self, id: &ActorId) -> Result<Option<ActorAddress>, DirectoryError> {
        Ok(self.entries.borrow().get(id).cloned())
    }

    async fn register(&self, address: ActorAddress) -> Result<ActorAddress, DirectoryError> {
        let mut entries = self.entries.borrow_mut();
        let current = entries
            .entry(address.actor_id.clone())
            .or_insert(address)
            .clone();
        Ok(current)
    }

    async fn unregister(&self, address: &ActorAddress) -> Result<(), DirectoryError> {
        let mut entries = self.entries.borrow_mut();
        let matches = entries
            .get(&address.actor_id)
            .is_some_and(|existing| existing.activation_id == address.activation_id);
        if matches {
            entries.remove(&address.actor_id);
        }
        Ok(())
    }

    async fn unregister_members(
        &self,
        nodes: &[NetworkAddress],
    ) -> Result<Vec<ActorAddress>, DirectoryError> {
        let mut removed = Vec::new();
        self.entries.borrow_mut().retain(|_, address| {
            if nodes.contains(&address.node) {
                removed.push(address.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<ActorAddress>, DirectoryError> {
        Ok(self.entries.borrow().values().cloned().collect())
    }
}
