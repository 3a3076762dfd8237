//! Core virtual actor types.
//!
//! These types form the messaging contract between callers and activations.
//! The transport treats [`ActorMessage`] and [`ActorResponse`] as opaque
//! payloads; only the owning node's host looks inside.
//!
//! # Design
//!
//! - `ActorType` is a u64 constant per worker kind.
//! - `ActorId` is `ActorType` + a string key (a short token for URL records).
//! - `ActorMessage` carries the target identity, method discriminant, and
//!   serialized body.
//! - `ActorResponse` carries the serialized reply or an [`ActorFault`].
//!
//! # Orleans Reference
//!
//! This follows Orleans' GrainReference pattern: the caller builds a message
//! with identity + method + body, and the hosting silo routes by identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::NetworkAddress;

/// Identifies an actor TYPE.
///
/// A stable identifier for a class of actors, not a specific instance.
///
/// # Convention
///
/// Use a hex constant:
/// ```rust
/// use moonlink::actors::ActorType;
/// const URL_RECORD: ActorType = ActorType(0x0052_4C55);
/// ```
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct ActorType(pub u64);

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Full virtual actor address = type + string key.
///
/// # Examples
///
/// ```rust
/// use moonlink::actors::{ActorId, ActorType};
///
/// let record = ActorId::new(ActorType(0x0052_4C55), "1F3A9C");
/// assert_eq!(record.identity, "1F3A9C");
/// ```
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct ActorId {
    /// The type of actor (selects the handler).
    pub actor_type: ActorType,
    /// The instance key.
    pub identity: String,
}

impl ActorId {
    /// Create a new actor ID.
    pub fn new(actor_type: ActorType, identity: impl Into<String>) -> Self {
        Self {
            actor_type,
            identity: identity.into(),
        }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.actor_type, self.identity)
    }
}

/// Message payload for a virtual actor call.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ActorMessage {
    /// The target actor instance.
    pub target: ActorId,
    /// Method discriminant within the actor type (1, 2, 3, …).
    pub method: u32,
    /// Serialized method-specific request body.
    pub body: Vec<u8>,
    /// Number of times this message has been redirected to another owner.
    pub forward_count: u8,
}

/// Response from a virtual actor.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ActorResponse {
    /// Serialized method-specific response body, or the fault raised while
    /// handling the call.
    pub body: Result<Vec<u8>, ActorFault>,
}

/// Wire form of an actor call failure.
///
/// Only the variants a caller can act upon cross the network; everything
/// else is flattened into [`ActorFault::Internal`].
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ActorFault {
    /// The request body was rejected by the worker.
    InvalidArgument(String),
    /// No record exists for the key.
    NotFound {
        /// The key that was looked up.
        key: String,
    },
    /// Transient routing or persistence failure.
    Unavailable(String),
    /// The activation was mid-transition.
    Retry(String),
    /// Another live activation owns the key.
    NotOwner {
        /// Node hosting the winning activation.
        owner: NetworkAddress,
    },
    /// The method discriminant is not known to the actor type.
    UnknownMethod(u32),
    /// Any other handler failure.
    Internal(String),
}

/// Unique identifier for a specific actor activation.
///
/// A re-activation of the same key (on any node) gets a new id, which is
/// how stale directory entries are told apart from current ones.
///
/// # Orleans Reference
///
/// Corresponds to Orleans' `ActivationId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationId(pub u64);

impl ActivationId {
    /// Create a new activation ID from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// A random activation ID.
    pub fn random() -> Self {
        Self(rand::random::<u64>())
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "act-{:016x}", self.0)
    }
}

/// Full address of an actor activation: identity + owning node + activation.
///
/// This is the value stored in the directory.
///
/// # Orleans Reference
///
/// Corresponds to Orleans' `GrainAddress` (`GrainId`, `SiloAddress`,
/// `ActivationId`). `Register()` returns the existing address on conflict,
/// and callers compare activation IDs to detect that they lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorAddress {
    /// The actor's identity (type + key).
    pub actor_id: ActorId,
    /// The node hosting this activation.
    pub node: NetworkAddress,
    /// Unique identifier for this specific activation.
    pub activation_id: ActivationId,
}

impl ActorAddress {
    /// Create a new actor address.
    pub fn new(actor_id: ActorId, node: NetworkAddress, activation_id: ActivationId) -> Self {
        Self {
            actor_id,
            node,
            activation_id,
        }
    }
}
