//! Placement: per-actor-type hints and cluster-level director.
//!
//! Placement separates two concerns:
//!
//! - **`PlacementStrategy`** — declared per actor type, saying *what* the
//!   actor wants (node-local vs. one owner per key cluster-wide).
//! - **`PlacementDirector`** — interprets the strategy against the current
//!   membership view and returns the owning node.
//!
//! `Hashed` placement uses rendezvous (highest-random-weight) hashing: every
//! node that sees the same active member list picks the same owner, and a
//! membership change only moves the keys of the node that left or joined.
//! Weights come from FNV-1a over a fixed byte encoding of the key and the
//! member, so nodes built with different toolchains agree on owners.
//!
//! # Orleans Reference
//!
//! Orleans' `PlacementStrategy` attribute + `IPlacementDirector`.

use std::fmt;
use std::net::IpAddr;

use crate::actors::ActorId;
use crate::NetworkAddress;

/// Errors from placement operations.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// No active member can host the actor.
    #[error("no candidates available for actor {id}")]
    NoCandidates {
        /// The actor that could not be placed.
        id: ActorId,
    },
}

/// Per-actor-type placement hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementStrategy {
    /// Activate on whichever node receives the call. Never registered in the
    /// directory; every node may host its own instance.
    Local,
    /// One owner per key, chosen by hashing over active members.
    #[default]
    Hashed,
}

/// Cluster-level algorithm that interprets a [`PlacementStrategy`] hint.
#[async_trait::async_trait(?Send)]
pub trait PlacementDirector: fmt::Debug {
    /// Choose the owning node for the given actor.
    ///
    /// # Arguments
    ///
    /// * `strategy` - The per-actor-type placement hint
    /// * `id` - The actor to place
    /// * `active_members` - Addresses of all active cluster members
    /// * `local_address` - This node's own address
    async fn place(
        &self,
        strategy: PlacementStrategy,
        id: &ActorId,
        active_members: &[NetworkAddress],
        local_address: &NetworkAddress,
    ) -> Result<NetworkAddress, PlacementError>;
}

/// Built-in director handling `Local` and `Hashed` strategies.
#[derive(Debug, Default)]
pub struct DefaultPlacementDirector;

impl DefaultPlacementDirector {
    /// Rendezvous weight of `member` for `id`.
    fn weight(id: &ActorId, member: &NetworkAddress) -> u64 {
        let mut data = Vec::with_capacity(id.identity.len() + 27);
        data.extend_from_slice(&id.actor_type.0.to_le_bytes());
        data.extend_from_slice(id.identity.as_bytes());
        data.push(0xff);
        match member.ip {
            IpAddr::V4(ip) => data.extend_from_slice(&ip.octets()),
            IpAddr::V6(ip) => data.extend_from_slice(&ip.octets()),
        }
        data.extend_from_slice(&member.port.to_le_bytes());
        mix64(fnv1a(&data))
    }

    /// Deterministic owner of `id` among `members`.
    pub fn owner_of<'a>(id: &ActorId, members: &'a [NetworkAddress]) -> Option<&'a NetworkAddress> {
        members
            .iter()
            .max_by_key(|member| (Self::weight(id, member), *member))
    }
}

/// FNV-1a 64-bit hash.
fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Murmur3 64-bit finalizer.
fn mix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51afd7ed558ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ceb9fe1a85ec53);
    k ^= k >> 33;
    k
}

#[async_trait::async_trait(?Send)]
impl PlacementDirector for DefaultPlacementDirector {
    async fn place(
        &self,
        strategy: PlacementStrategy,
        id: &ActorId,
        active_members: &[NetworkAddress],
        local_address: &NetworkAddress,
    ) -> Result<NetworkAddress, PlacementError> {
        match strategy {
            PlacementStrategy::Local => Ok(local_address.clone()),
            PlacementStrategy::Hashed => Self::owner_of(id, active_members)
                .cloned()
                .ok_or_else(|| PlacementError::NoCandidates { id: id.clone() }),
        }
    }
}
