//! Membership directory: which nodes are in the cluster, and which are alive.
//!
//! The [`MembershipProvider`] trait gives the runtime a versioned view of the
//! cluster. Placement only considers `Active` members; the directory is
//! purged of entries hosted on members that become `Dead`.
//!
//! # Design
//!
//! - `MembershipProvider` is a trait so implementations can range from a
//!   single-node stub (local development) to a consensus-store-backed table.
//! - [`SharedMembership`] is an `Rc`-shared in-memory table: all nodes in one
//!   process see the same data immediately.
//! - Liveness is heartbeat-based: members silent for longer than the
//!   configured expiration are declared `Dead` by whichever node runs
//!   [`MembershipProvider::expire_silent_members`].
//! - View changes are published through a `tokio::sync::watch` channel
//!   carrying the latest [`MembershipVersion`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::NetworkAddress;

/// Monotonically increasing membership version.
///
/// Every membership change (join, status transition, expiry) bumps the
/// version.
///
/// # Orleans Reference
///
/// Corresponds to Orleans' `MembershipVersion`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct MembershipVersion(pub u64);

impl MembershipVersion {
    /// Create version 0 (initial).
    pub fn new() -> Self {
        Self(0)
    }

    /// Return the next version.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MembershipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Status of a node in the cluster.
///
/// # Orleans Reference
///
/// Corresponds to Orleans' `SiloStatus`, restricted to the states visible to
/// the membership protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Announced but not yet serving.
    Joining,
    /// Fully operational.
    Active,
    /// Draining activations before leaving.
    ShuttingDown,
    /// Left the cluster or declared failed.
    Dead,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joining => write!(f, "Joining"),
            Self::Active => write!(f, "Active"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Dead => write!(f, "Dead"),
        }
    }
}

/// A single member of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Network address of this member.
    pub address: NetworkAddress,
    /// Current lifecycle status.
    pub status: NodeStatus,
    /// Human-readable name (for logging).
    pub name: String,
}

impl ClusterMember {
    /// Create a new cluster member.
    pub fn new(address: NetworkAddress, status: NodeStatus, name: impl Into<String>) -> Self {
        Self {
            address,
            status,
            name: name.into(),
        }
    }

    /// Check if this member can serve requests.
    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }
}

/// Immutable snapshot of cluster membership at a specific version.
///
/// # Orleans Reference
///
/// Corresponds to Orleans' `ClusterMembershipSnapshot`.
#[derive(Debug, Clone, Default)]
pub struct MembershipSnapshot {
    /// All known members, keyed by network address.
    pub members: HashMap<NetworkAddress, ClusterMember>,
    /// Version of this snapshot.
    pub version: MembershipVersion,
}

impl MembershipSnapshot {
    /// Addresses of all members with the given status, sorted.
    pub fn members_with_status(&self, status: NodeStatus) -> Vec<NetworkAddress> {
        let mut addresses: Vec<NetworkAddress> = self
            .members
            .values()
            .filter(|m| m.status == status)
            .map(|m| m.address.clone())
            .collect();
        addresses.sort();
        addresses
    }

    /// Addresses of all active members, sorted so every node derives the
    /// same candidate list from the same version.
    pub fn active_members(&self) -> Vec<NetworkAddress> {
        self.members_with_status(NodeStatus::Active)
    }

    /// Get a specific member by address.
    pub fn get_member(&self, address: &NetworkAddress) -> Option<&ClusterMember> {
        self.members.get(address)
    }

    /// Get the status of a specific member, or `None` if unknown.
    pub fn get_status(&self, address: &NetworkAddress) -> Option<NodeStatus> {
        self.members.get(address).map(|m| m.status)
    }

    /// Whether `address` is an active member.
    pub fn is_active(&self, address: &NetworkAddress) -> bool {
        self.get_status(address) == Some(NodeStatus::Active)
    }
}

/// Errors from membership operations.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// The node was not found in the membership.
    #[error("node not found: {address}")]
    NotFound {
        /// The address that was not found.
        address: NetworkAddress,
    },

    /// A node that was declared dead tried to act as a live member.
    #[error("node {address} was declared dead and must rejoin")]
    DeclaredDead {
        /// The dead node.
        address: NetworkAddress,
    },
}

/// Versioned registry of cluster nodes with heartbeat-based expiry.
///
/// # Orleans Reference
///
/// Combines Orleans' `IClusterMembershipService` (read snapshot, subscribe to
/// updates) with the `MembershipAgent` side that writes the local silo's
/// status and `IAmAlive` timestamp.
#[async_trait::async_trait(?Send)]
pub trait MembershipProvider: fmt::Debug {
    /// Announce a node as `Joining`.
    ///
    /// A node restarting at the same address replaces its previous row.
    async fn join(
        &self,
        address: NetworkAddress,
        name: String,
    ) -> Result<MembershipVersion, MembershipError>;

    /// The current view.
    async fn snapshot(&self) -> MembershipSnapshot;

    /// Addresses of all active members.
    async fn members(&self) -> Vec<NetworkAddress> {
        self.snapshot().await.active_members()
    }

    /// Update the status of a registered node.
    async fn update_status(
        &self,
        address: &NetworkAddress,
        status: NodeStatus,
    ) -> Result<MembershipVersion, MembershipError>;

    /// Record that `address` is still alive.
    async fn heartbeat(&self, address: &NetworkAddress) -> Result<(), MembershipError>;

    /// Declare every live member silent for longer than `expiration` dead.
    ///
    /// Returns the newly dead addresses.
    async fn expire_silent_members(&self, expiration: Duration) -> Vec<NetworkAddress>;

    /// Subscribe to view changes. The channel carries the latest version.
    fn watch(&self) -> watch::Receiver<MembershipVersion>;
}

/// Shared in-memory membership table.
///
/// All nodes in a process share the same `Rc<SharedMembership>`, giving them
/// a consistent view of the cluster.
///
/// # Example
///
/// ```rust,ignore
/// let membership = SharedMembership::new();
/// membership.join(addr_a, "node-a".into()).await?;
/// membership.update_status(&addr_a, NodeStatus::Active).await?;
/// assert_eq!(membership.members().await, vec![addr_a]);
/// ```
#[derive(Debug)]
pub struct SharedMembership {
    inner: RefCell<SharedMembershipInner>,
    notify: watch::Sender<MembershipVersion>,
}

#[derive(Debug)]
struct SharedMembershipInner {
    members: HashMap<NetworkAddress, ClusterMember>,
    last_heartbeat: HashMap<NetworkAddress, Instant>,
    version: MembershipVersion,
}

impl SharedMembership {
    /// Create a new empty shared membership.
    pub fn new() -> Self {
        Self::from_members(HashMap::new(), MembershipVersion::new())
    }

    /// Create a membership pre-populated with active members.
    ///
    /// Each address is registered as `Active` with a generated name.
    pub fn with_members(addresses: Vec<NetworkAddress>) -> Self {
        let version = MembershipVersion(addresses.len() as u64);
        let members = addresses
            .into_iter()
            .enumerate()
            .map(|(i, address)| {
                let member = ClusterMember::new(address.clone(), NodeStatus::Active, format!("node-{i}"));
                (address, member)
            })
            .collect();
        Self::from_members(members, version)
    }

    fn from_members(
        members: HashMap<NetworkAddress, ClusterMember>,
        version: MembershipVersion,
    ) -> Self {
        let now = Instant::now();
        let last_heartbeat = members.keys().map(|a| (a.clone(), now)).collect();
        let (notify, _) = watch::channel(version);
        Self {
            inner: RefCell::new(SharedMembershipInner {
                members,
                last_heartbeat,
                version,
            }),
            notify,
        }
    }

    fn bump(&self, inner: &mut SharedMembershipInner) -> MembershipVersion {
        inner.version = inner.version.next();
        self.notify.send_replace(inner.version);
        inner.version
    }
}

impl Default for SharedMembership {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait(?Send)]
impl MembershipProvider for SharedMembership {
    async fn join(
        &self,
        address: NetworkAddress,
        name: String,
    ) -> Result<MembershipVersion, MembershipError> {
        let mut inner = self.inner.borrow_mut();
        inner.last_heartbeat.insert(address.clone(), Instant::now());
        inner.members.insert(
            address.clone(),
            ClusterMember::new(address, NodeStatus::Joining, name),
        );
        Ok(self.bump(&mut inner))
    }

    async fn snapshot(&self) -> MembershipSnapshot {
        let inner = self.inner.borrow();
        MembershipSnapshot {
            members: inner.members.clone(),
            version: inner.version,
        }
    }

    async fn update_status(
        &self,
        address: &NetworkAddress,
        status: NodeStatus,
    ) -> Result<MembershipVersion, MembershipError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let member = inner
            .members
            .get_mut(address)
            .ok_or_else(|| MembershipError::NotFound {
                address: address.clone(),
            })?;
        if member.status == status {
            return Ok(inner.version);
        }
        if member.status == NodeStatus::Dead {
            return Err(MembershipError::DeclaredDead {
                address: address.clone(),
            });
        }
        member.status = status;
        Ok(self.bump(inner))
    }

    async fn heartbeat(&self, address: &NetworkAddress) -> Result<(), MembershipError> {
        let mut inner = self.inner.borrow_mut();
        match inner.members.get(address).map(|m| m.status) {
            None => Err(MembershipError::NotFound {
                address: address.clone(),
            }),
            Some(NodeStatus::Dead) => Err(MembershipError::DeclaredDead {
                address: address.clone(),
            }),
            Some(_) => {
                inner.last_heartbeat.insert(address.clone(), Instant::now());
                Ok(())
            }
        }
    }

    async fn expire_silent_members(&self, expiration: Duration) -> Vec<NetworkAddress> {
        let mut inner = self.inner.borrow_mut();
        let now = Instant::now();
        let SharedMembershipInner {
            members,
            last_heartbeat,
            ..
        } = &mut *inner;

        let mut expired = Vec::new();
        for member in members.values_mut() {
            if member.status == NodeStatus::Dead {
                continue;
            }
            let silent = last_heartbeat
                .get(&member.address)
                .map_or(true, |seen| now.duration_since(*seen) > expiration);
            if silent {
                member.status = NodeStatus::Dead;
                expired.push(member.address.clone());
            }
        }

        if !expired.is_empty() {
            expired.sort();
            self.bump(&mut inner);
        }
        expired
    }

    fn watch(&self) -> watch::Receiver<MembershipVersion> {
        self.notify.subscribe()
    }
}

/// Membership for a node that never forms a cluster.
///
/// Used in local development: the node is its own and only member, and no
/// external table is contacted.
#[derive(Debug)]
pub struct SingleNodeMembership {
    member: RefCell<Option<ClusterMember>>,
    version: std::cell::Cell<MembershipVersion>,
    notify: watch::Sender<MembershipVersion>,
}

impl SingleNodeMembership {
    /// Create an empty single-node membership.
    pub fn new() -> Self {
        let (notify, _) = watch::channel(MembershipVersion::new());
        Self {
            member: RefCell::new(None),
            version: std::cell::Cell::new(MembershipVersion::new()),
            notify,
        }
    }

    fn bump(&self) -> MembershipVersion {
        let version = self.version.get().next();
        self.version.set(version);
        self.notify.send_replace(version);
        version
    }
}

impl Default for SingleNodeMembership {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait(?Send)]
impl MembershipProvider for SingleNodeMembership {
    async fn join(
        &self,
        address: NetworkAddress,
        name: String,
    ) -> Result<MembershipVersion, MembershipError> {
        *self.member.borrow_mut() = Some(ClusterMember::new(address, NodeStatus::Joining, name));
        Ok(self.bump())
    }

    async fn snapshot(&self) -> MembershipSnapshot {
        let members = self
            .member
            .borrow()
            .iter()
            .map(|m| (m.address.clone(), m.clone()))
            .collect();
        MembershipSnapshot {
            members,
            version: self.version.get(),
        }
    }

    async fn update_status(
        &self,
        address: &NetworkAddress,
        status: NodeStatus,
    ) -> Result<MembershipVersion, MembershipError> {
        let known = self
            .member
            .borrow()
            .as_ref()
            .is_some_and(|m| &m.address == address);
        if !known {
            return Err(MembershipError::NotFound {
                address: address.clone(),
            });
        }
        if let Some(m) = self.member.borrow_mut().as_mut() {
            m.status = status;
        }
        Ok(self.bump())
    }

    async fn heartbeat(&self, address: &NetworkAddress) -> Result<(), MembershipError> {
        match self.member.borrow().as_ref() {
            Some(m) if &m.address == address => Ok(()),
            _ => Err(MembershipError::NotFound {
                address: address.clone(),
            }),
        }
    }

    async fn expire_silent_members(&self, _expiration: Duration) -> Vec<NetworkAddress> {
        Vec::new()
    }

    fn watch(&self) -> watch::Receiver<MembershipVersion> {
        self.notify.subscribe()
    }
}
