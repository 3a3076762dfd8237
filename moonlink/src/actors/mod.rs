//! Virtual actor runtime for moonlink.
//!
//! Every key (a short token) maps to one logical worker that is always
//! addressable. Callers never create or destroy workers: the runtime
//! activates one on the first call, places it on a single node of the
//! cluster, persists its state through a durable store, and deactivates it
//! when it goes idle or its node leaves.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    Caller side                        │
//! │  ActorRouter → Directory → PlacementDirector          │
//! │  retries with backoff, follows NotOwner redirects     │
//! ├───────────────────────────────────────────────────────┤
//! │                    Owner side                         │
//! │  ActorHost → activation task per key (one at a time)  │
//! │  PersistentState<T> over a DurableRecordStore         │
//! ├───────────────────────────────────────────────────────┤
//! │                    Cluster                            │
//! │  MembershipProvider (heartbeats, expiry, watch)       │
//! │  ClusterTransport (node-to-node request/response)     │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Orleans Model
//!
//! Turn-based concurrency: one message at a time per activation. At most
//! one activation per key is registered in the directory; a node whose
//! registration loses to a live owner answers `NotOwner` and the caller
//! follows the redirect.

// --- Core types ---
mod actor_ref;
mod error;
mod lifecycle;
mod types;

pub use actor_ref::ActorRef;
pub use error::ActorError;
pub use lifecycle::{ActivationState, DeactivationReason};
pub use types::{
    ActivationId, ActorAddress, ActorFault, ActorId, ActorMessage, ActorResponse, ActorType,
};

// --- Runtime ---
mod runtime;

pub use runtime::{
    ActorContext, ActorHandler, ActorHost, ActorRouter, RetryPolicy, MAX_FORWARDS,
};

// --- Node lifecycle ---
mod node;

pub use node::{
    ClusterConfig, ClusterConfigBuilder, ClusterConfigError, MoonlinkNode, MoonlinkNodeBuilder,
    NodeConfig, NodeConfigBuilder, NodeError, NodeLifecycle, DEFAULT_CALL_TIMEOUT,
    DEFAULT_DEFUNCT_EXPIRATION, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_TRANSITION_TIMEOUT,
};

// --- Infrastructure ---
mod infrastructure;

pub use infrastructure::{
    ActorDirectory, ClusterMember, ClusterTransport, DefaultPlacementDirector, DirectoryError,
    InMemoryDirectory, InboundRequest, InboundRequests, LocalNetwork, MembershipError,
    MembershipProvider, MembershipSnapshot, MembershipVersion, NodeStatus, PlacementDirector,
    PlacementError, PlacementStrategy, SharedMembership, SingleNodeMembership, TransportError,
};

// --- State persistence ---
mod state;

pub use state::{DurableRecordStore, InMemoryRecordStore, PersistentState, StoreError, StoredRecord};
