//! Actor infrastructure: directory, placement, membership, and transport.

pub(crate) mod directory;
pub(crate) mod membership;
pub(crate) mod placement;
pub(crate) mod transport;

pub use directory::{ActorDirectory, DirectoryError, InMemoryDirectory};
pub use membership::{
    ClusterMember, MembershipError, MembershipProvider, MembershipSnapshot, MembershipVersion,
    NodeStatus, SharedMembership, SingleNodeMembership,
};
pub use placement::{
    DefaultPlacementDirector, PlacementDirector, PlacementError, PlacementStrategy,
};
pub use transport::{ClusterTransport, InboundRequest, InboundRequests, LocalNetwork, TransportError};
