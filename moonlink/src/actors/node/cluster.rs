//! Cluster configuration: shared state for all nodes in a cluster.
//!
//! [`ClusterConfig`] bundles the directory, membership provider, placement
//! director and transport that nodes share. Nodes in one process clone the
//! same `ClusterConfig`, so every `Rc` inside points at the same instance and
//! they all see one directory and one membership view.
//!
//! # Example
//!
//! ```rust,ignore
//! let cluster = ClusterConfig::builder()
//!     .name("moonlink")
//!     .topology(vec![addr_a, addr_b])
//!     .build()?;
//! ```

use std::rc::Rc;

use crate::actors::infrastructure::{
    ActorDirectory, ClusterTransport, DefaultPlacementDirector, InMemoryDirectory, LocalNetwork,
    MembershipProvider, PlacementDirector, SharedMembership,
};
use crate::NetworkAddress;

/// Shared cluster configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    name: Option<String>,
    directory: Rc<dyn ActorDirectory>,
    membership: Rc<dyn MembershipProvider>,
    placement_director: Rc<dyn PlacementDirector>,
    transport: Rc<dyn ClusterTransport>,
}

impl ClusterConfig {
    /// Start building a cluster configuration.
    pub fn builder() -> ClusterConfigBuilder {
        ClusterConfigBuilder::default()
    }

    /// Optional cluster name (for logging and node names).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The shared actor directory.
    pub fn directory(&self) -> &Rc<dyn ActorDirectory> {
        &self.directory
    }

    /// The shared membership provider.
    pub fn membership(&self) -> &Rc<dyn MembershipProvider> {
        &self.membership
    }

    /// The shared placement director.
    pub fn placement_director(&self) -> &Rc<dyn PlacementDirector> {
        &self.placement_director
    }

    /// The node-to-node transport.
    pub fn transport(&self) -> &Rc<dyn ClusterTransport> {
        &self.transport
    }
}

/// Builder for [`ClusterConfig`].
#[derive(Default)]
pub struct ClusterConfigBuilder {
    name: Option<String>,
    directory: Option<Rc<dyn ActorDirectory>>,
    membership: Option<Rc<dyn MembershipProvider>>,
    placement_director: Option<Rc<dyn PlacementDirector>>,
    transport: Option<Rc<dyn ClusterTransport>>,
}

impl ClusterConfigBuilder {
    /// Set the cluster name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the actor directory.
    ///
    /// If not set, defaults to [`InMemoryDirectory`].
    pub fn directory(mut self, directory: Rc<dyn ActorDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Set the membership provider.
    pub fn membership(mut self, membership: Rc<dyn MembershipProvider>) -> Self {
        self.membership = Some(membership);
        self
    }

    /// Convenience: a [`SharedMembership`] seeded with `addresses` as active
    /// members.
    pub fn topology(self, addresses: Vec<NetworkAddress>) -> Self {
        self.membership(Rc::new(SharedMembership::with_members(addresses)))
    }

    /// Set the placement director.
    ///
    /// If not set, defaults to [`DefaultPlacementDirector`].
    pub fn placement_director(mut self, director: Rc<dyn PlacementDirector>) -> Self {
        self.placement_director = Some(director);
        self
    }

    /// Set the transport.
    ///
    /// If not set, defaults to a fresh [`LocalNetwork`].
    pub fn transport(mut self, transport: Rc<dyn ClusterTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the cluster configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if membership is not set (via [`topology()`](Self::topology)
    /// or [`membership()`](Self::membership)).
    pub fn build(self) -> Result<ClusterConfig, ClusterConfigError> {
        let membership = self
            .membership
            .ok_or(ClusterConfigError::MissingMembership)?;

        Ok(ClusterConfig {
            name: self.name,
            directory: self
                .directory
                .unwrap_or_else(|| Rc::new(InMemoryDirectory::new())),
            membership,
            placement_director: self
                .placement_director
                .unwrap_or_else(|| Rc::new(DefaultPlacementDirector)),
            transport: self
                .transport
                .unwrap_or_else(|| Rc::new(LocalNetwork::new())),
        })
    }
}

/// Errors from building a [`ClusterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ClusterConfigError {
    /// No membership provider was provided to the builder.
    #[error("cluster config requires a membership provider (call topology() or membership())")]
    MissingMembership,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_with_topology() {
        let cluster = ClusterConfig::builder()
            .name("moonlink")
            .topology(vec![NetworkAddress::localhost(11111)])
            .build()
            .expect("build should succeed");

        assert_eq!(cluster.name(), Some("moonlink"));
    }

    #[test]
    fn test_builder_missing_membership() {
        let result = ClusterConfig::builder().build();
        assert!(matches!(result, Err(ClusterConfigError::MissingMembership)));
    }

    #[test]
    fn test_builder_defaults() {
        let cluster = ClusterConfig::builder()
            .topology(vec![NetworkAddress::localhost(11111)])
            .build()
            .expect("build should succeed");

        assert!(format!("{:?}", cluster.placement_director()).contains("DefaultPlacementDirector"));
        assert!(format!("{:?}", cluster.transport()).contains("LocalNetwork"));
    }

    #[tokio::test]
    async fn test_topology_members_are_active() {
        let cluster = ClusterConfig::builder()
            .topology(vec![NetworkAddress::localhost(11111)])
            .build()
            .expect("build should succeed");

        let members = cluster.membership().members().await;
        assert_eq!(members, vec![NetworkAddress::localhost(11111)]);
    }

    #[test]
    fn test_clones_share_components() {
        let cluster = ClusterConfig::builder()
            .topology(vec![NetworkAddress::localhost(11111)])
            .build()
            .expect("build should succeed");
        let other = cluster.clone();

        assert!(Rc::ptr_eq(cluster.directory(), other.directory()));
        assert!(Rc::ptr_eq(cluster.transport(), other.transport()));
    }
}
