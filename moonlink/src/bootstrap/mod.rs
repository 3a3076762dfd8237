//! Cluster bootstrap: decide this node's network identity from the
//! environment it was started in.
//!
//! The same binary runs on a managed web platform, inside a container
//! orchestrator, on a developer laptop and on a plain VM. Each environment
//! advertises the address and ports the node must use in a different way.
//! [`ClusterBootstrapResolver`] asks an ordered list of [`SignalDetector`]s
//! and takes the first that claims the environment:
//!
//! | Priority | Detector | Claims when |
//! |----------|----------|-------------|
//! | 1 | [`ManagedPlatform`] | platform IP and two platform ports parse |
//! | 2 | [`ExposedPorts`] | an exposed-ports list is declared |
//! | 3 | [`LocalDevelopment`] | the development flag is set |
//! | 4 | [`ExplicitEndpoint`] | `[endpoint]` has a concrete IP |
//! | 5 | [`WildcardEndpoint`] | `[endpoint]` has an unspecified IP |
//!
//! A detector that owns contradictory signals fails the whole resolution:
//! the node must not join a cluster with a guessed identity.

mod detectors;
mod env;
mod signals;

use std::net::IpAddr;
use std::time::Duration;

pub use detectors::{
    derive_ip, BootstrapSource, Detected, ExplicitEndpoint, ExposedPorts, LocalDevelopment,
    ManagedPlatform, SignalDetector, WildcardEndpoint, DEVELOPMENT_CLIENT_PORT, DEVELOPMENT_ID,
    DEVELOPMENT_PEER_PORT,
};
pub use env::vars;
pub use signals::{EndpointSection, EnvironmentSignals};

use crate::error::ConfigurationError;
use crate::NetworkAddress;

/// Service id used when none is configured.
pub const DEFAULT_SERVICE_ID: &str = "moonlink";

/// Prefix of synthesized cluster ids.
pub const CLUSTER_ID_PREFIX: &str = "cluster-";

/// Where and as whom this node runs. Produced once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    /// Address advertised to peers.
    pub bind_address: IpAddr,
    /// Port for node-to-node traffic.
    pub peer_port: u16,
    /// Port for client traffic.
    pub client_port: u16,
    /// Cluster id shared by the nodes of one deployment.
    pub cluster_id: String,
    /// Service id, stable across deployments.
    pub service_id: String,
    /// Listen on every interface rather than on `bind_address` only. Peers
    /// always address the node by `bind_address`.
    pub listen_on_all_interfaces: bool,
}

impl NetworkIdentity {
    /// Address peers use to reach this node.
    pub fn peer_address(&self) -> NetworkAddress {
        NetworkAddress::new(self.bind_address, self.peer_port)
    }

    /// Address clients use to reach this node.
    pub fn client_address(&self) -> NetworkAddress {
        NetworkAddress::new(self.bind_address, self.client_port)
    }

}

/// How the node finds its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipMode {
    /// Shared membership directory.
    Directory,
    /// Alone, without a membership directory.
    SingleNode,
}

/// Everything startup needs from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    /// The resolved identity.
    pub identity: NetworkIdentity,
    /// Membership mode.
    pub membership: MembershipMode,
    /// The detector that won.
    pub source: BootstrapSource,
    /// How long a silent member stays in the view, when the platform dictates it.
    pub defunct_expiration: Option<Duration>,
}

/// Resolves [`EnvironmentSignals`] into a [`NetworkIdentity`].
#[derive(Debug)]
pub struct ClusterBootstrapResolver {
    detectors: Vec<Box<dyn SignalDetector>>,
}

impl Default for ClusterBootstrapResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ManagedPlatform),
            Box::new(ExposedPorts),
            Box::new(LocalDevelopment),
            Box::new(ExplicitEndpoint),
            Box::new(WildcardEndpoint),
        ])
    }
}

impl ClusterBootstrapResolver {
    /// Resolver asking `detectors` in order.
    pub fn new(detectors: Vec<Box<dyn SignalDetector>>) -> Self {
        Self { detectors }
    }

    /// Resolve the identity only.
    pub fn resolve(
        &self,
        signals: &EnvironmentSignals,
    ) -> Result<NetworkIdentity, ConfigurationError> {
        Ok(self.plan(signals)?.identity)
    }

    /// Resolve the full startup plan.
    pub fn plan(&self, signals: &EnvironmentSignals) -> Result<BootstrapPlan, ConfigurationError> {
        let detected = self.detect(signals)?;
        let (cluster_id, service_id) = match detected.fixed_ids {
            Some(ids) => ids,
            None => cluster_ids(signals),
        };

        let defunct_expiration = if signals.in_container {
            signals.container_start_time_limit.map(|limit| limit * 2)
        } else {
            None
        };

        tracing::info!(
            source = %detected.source,
            address = %detected.bind_address,
            peer_port = detected.peer_port,
            client_port = detected.client_port,
            listen_on_all_interfaces = detected.listen_on_all_interfaces,
            cluster_id = %cluster_id,
            service_id = %service_id,
            "network identity resolved"
        );

        Ok(BootstrapPlan {
            identity: NetworkIdentity {
                bind_address: detected.bind_address,
                peer_port: detected.peer_port,
                client_port: detected.client_port,
                cluster_id,
                service_id,
                listen_on_all_interfaces: detected.listen_on_all_interfaces,
            },
            membership: detected.membership,
            source: detected.source,
            defunct_expiration,
        })
    }

    fn detect(&self, signals: &EnvironmentSignals) -> Result<Detected, ConfigurationError> {
        for detector in &self.detectors {
            if let Some(detected) = detector.try_detect(signals)? {
                return Ok(detected);
            }
            tracing::debug!(detector = ?detector, "bootstrap detector declined");
        }
        Err(ConfigurationError::NoUsableSignal)
    }
}

/// Cluster and service ids: configured values when both are non-empty,
/// otherwise `cluster-<slot>` (or `cluster-single-slot`) and `moonlink`.
pub fn cluster_ids(signals: &EnvironmentSignals) -> (String, String) {
    if let (Some(cluster), Some(service)) = (
        non_blank(&signals.cluster_id),
        non_blank(&signals.service_id),
    ) {
        return (cluster.to_string(), service.to_string());
    }
    let slot = non_blank(&signals.deployment_slot).unwrap_or("single-slot");
    (
        format!("{CLUSTER_ID_PREFIX}{slot}"),
        DEFAULT_SERVICE_ID.to_string(),
    )
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
