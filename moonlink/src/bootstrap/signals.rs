//! Raw inputs to the bootstrap resolver.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

/// The `[endpoint]` settings section: an explicitly configured bind endpoint.
///
/// An unspecified IP (`0.0.0.0` or `::`) means "listen everywhere, advertise
/// a derived address".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EndpointSection {
    /// Configured IP.
    pub ip: IpAddr,
    /// Port for node-to-node traffic.
    pub peer_port: u16,
    /// Port for client traffic.
    pub client_port: u16,
}

/// Everything the environment says about where this node runs.
///
/// Every field is optional: hosting platforms set different, sometimes
/// conflicting, subsets. Values that come from platform variables are kept
/// raw; detectors decide whether they parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSignals {
    /// Private IP assigned by a managed web platform.
    pub platform_ip: Option<String>,
    /// Comma-separated private ports assigned by the platform.
    pub platform_ports: Option<String>,
    /// Virtual network IP delegated by a container orchestrator.
    pub platform_vnet_ip: Option<String>,
    /// Node IP or FQDN reported by a container orchestrator.
    pub node_ip_or_fqdn: Option<String>,
    /// Ports the container declares as exposed, peer port first.
    pub exposed_ports: Option<Vec<u16>>,
    /// Whether the process runs inside a container.
    pub in_container: bool,
    /// Addresses of the container's own interfaces.
    pub container_addresses: Vec<IpAddr>,
    /// Whether this is a local development run.
    pub development: bool,
    /// Deployment slot name, distinguishing side-by-side deployments.
    pub deployment_slot: Option<String>,
    /// Configured cluster id.
    pub cluster_id: Option<String>,
    /// Configured service id.
    pub service_id: Option<String>,
    /// Explicit endpoint from settings.
    pub endpoint: Option<EndpointSection>,
    /// How long the platform waits for a container to start.
    pub container_start_time_limit: Option<Duration>,
}
