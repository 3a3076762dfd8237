//! Signal detectors, one per hosting environment.
//!
//! Each detector looks at [`EnvironmentSignals`] and either claims the
//! environment, declines it, or fails when the signals it owns are
//! contradictory. The resolver asks them in priority order and the first
//! claim wins.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::ConfigurationError;

use super::signals::EnvironmentSignals;
use super::MembershipMode;

/// Peer port of a local development node.
pub const DEVELOPMENT_PEER_PORT: u16 = 11111;
/// Client port of a local development node.
pub const DEVELOPMENT_CLIENT_PORT: u16 = 30000;
/// Cluster and service id of a local development node.
pub const DEVELOPMENT_ID: &str = "dev";

/// Which detector produced the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapSource {
    /// Managed web platform private IP and ports.
    ManagedPlatform,
    /// Container exposed-ports declaration.
    ExposedPorts,
    /// Local development defaults.
    LocalDevelopment,
    /// Explicit `[endpoint]` with a concrete IP.
    ExplicitEndpoint,
    /// Explicit `[endpoint]` with an unspecified IP.
    WildcardEndpoint,
}

impl fmt::Display for BootstrapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManagedPlatform => write!(f, "managed-platform"),
            Self::ExposedPorts => write!(f, "exposed-ports"),
            Self::LocalDevelopment => write!(f, "local-development"),
            Self::ExplicitEndpoint => write!(f, "explicit-endpoint"),
            Self::WildcardEndpoint => write!(f, "wildcard-endpoint"),
        }
    }
}

/// A detector's claim on the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    /// The detector that claimed the environment.
    pub source: BootstrapSource,
    /// Address advertised to peers.
    pub bind_address: IpAddr,
    /// Port for node-to-node traffic.
    pub peer_port: u16,
    /// Port for client traffic.
    pub client_port: u16,
    /// Whether to listen on every interface instead of `bind_address` only.
    pub listen_on_all_interfaces: bool,
    /// How the node finds its peers.
    pub membership: MembershipMode,
    /// Ids forced by the environment, overriding configuration.
    pub fixed_ids: Option<(String, String)>,
}

impl Detected {
    fn endpoint(
        source: BootstrapSource,
        bind_address: IpAddr,
        peer_port: u16,
        client_port: u16,
        listen_on_all_interfaces: bool,
    ) -> Self {
        Self {
            source,
            bind_address,
            peer_port,
            client_port,
            listen_on_all_interfaces,
            membership: MembershipMode::Directory,
            fixed_ids: None,
        }
    }
}

/// One way of recognizing the hosting environment.
pub trait SignalDetector: fmt::Debug {
    /// `Ok(None)` when the environment is not this detector's.
    fn try_detect(
        &self,
        signals: &EnvironmentSignals,
    ) -> Result<Option<Detected>, ConfigurationError>;
}

/// Address to advertise when the environment does not hand one out.
///
/// In order: the delegated virtual network IP, the node IP (when the
/// orchestrator reports an IP rather than a name), the container's first
/// IPv4 non-loopback address, then loopback.
pub fn derive_ip(signals: &EnvironmentSignals) -> Result<IpAddr, ConfigurationError> {
    if let Some(raw) = &signals.platform_vnet_ip {
        return raw
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::InvalidAddress {
                source_name: "platform vnet ip".into(),
                value: raw.clone(),
            });
    }
    if let Some(ip) = signals
        .node_ip_or_fqdn
        .as_deref()
        .and_then(|raw| raw.trim().parse::<IpAddr>().ok())
    {
        return Ok(ip);
    }
    if signals.in_container {
        if let Some(ip) = signals
            .container_addresses
            .iter()
            .find(|ip| ip.is_ipv4() && !ip.is_loopback())
        {
            return Ok(*ip);
        }
    }
    Ok(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Managed web platform with virtual network integration.
#[derive(Debug, Default)]
pub struct ManagedPlatform;

impl SignalDetector for ManagedPlatform {
    fn try_detect(
        &self,
        signals: &EnvironmentSignals,
    ) -> Result<Option<Detected>, ConfigurationError> {
        let Some(ip) = signals
            .platform_ip
            .as_deref()
            .and_then(|raw| raw.trim().parse::<IpAddr>().ok())
        else {
            return Ok(None);
        };
        let Some(raw_ports) = signals.platform_ports.as_deref() else {
            return Ok(None);
        };
        let ports: Vec<&str> = raw_ports.split(',').map(str::trim).collect();
        if ports.len() < 2 {
            return Ok(None);
        }
        match (ports[0].parse::<u16>(), ports[1].parse::<u16>()) {
            (Ok(peer), Ok(client)) => Ok(Some(Detected::endpoint(
                BootstrapSource::ManagedPlatform,
                ip,
                peer,
                client,
                false,
            ))),
            _ => Ok(None),
        }
    }
}

/// Container declaring its exposed ports.
#[derive(Debug, Default)]
pub struct ExposedPorts;

impl SignalDetector for ExposedPorts {
    fn try_detect(
        &self,
        signals: &EnvironmentSignals,
    ) -> Result<Option<Detected>, ConfigurationError> {
        let Some(ports) = &signals.exposed_ports else {
            return Ok(None);
        };
        if ports.len() < 2 {
            return Err(ConfigurationError::InsufficientPorts { found: ports.len() });
        }
        Ok(Some(Detected::endpoint(
            BootstrapSource::ExposedPorts,
            derive_ip(signals)?,
            ports[0],
            ports[1],
            true,
        )))
    }
}

/// Local development: fixed loopback endpoint, single-node membership.
#[derive(Debug, Default)]
pub struct LocalDevelopment;

impl SignalDetector for LocalDevelopment {
    fn try_detect(
        &self,
        signals: &EnvironmentSignals,
    ) -> Result<Option<Detected>, ConfigurationError> {
        if !signals.development {
            return Ok(None);
        }
        Ok(Some(Detected {
            source: BootstrapSource::LocalDevelopment,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            peer_port: DEVELOPMENT_PEER_PORT,
            client_port: DEVELOPMENT_CLIENT_PORT,
            listen_on_all_interfaces: false,
            membership: MembershipMode::SingleNode,
            fixed_ids: Some((DEVELOPMENT_ID.into(), DEVELOPMENT_ID.into())),
        }))
    }
}

/// Explicit `[endpoint]` with a concrete IP, used verbatim.
#[derive(Debug, Default)]
pub struct ExplicitEndpoint;

impl SignalDetector for ExplicitEndpoint {
    fn try_detect(
        &self,
        signals: &EnvironmentSignals,
    ) -> Result<Option<Detected>, ConfigurationError> {
        Ok(signals
            .endpoint
            .filter(|endpoint| !endpoint.ip.is_unspecified())
            .map(|endpoint| {
                Detected::endpoint(
                    BootstrapSource::ExplicitEndpoint,
                    endpoint.ip,
                    endpoint.peer_port,
                    endpoint.client_port,
                    false,
                )
            }))
    }
}

/// Explicit `[endpoint]` with an unspecified IP: listen everywhere and
/// advertise a derived address.
#[derive(Debug, Default)]
pub struct WildcardEndpoint;

impl SignalDetector for WildcardEndpoint {
    fn try_detect(
        &self,
        signals: &EnvironmentSignals,
    ) -> Result<Option<Detected>, ConfigurationError> {
        let Some(endpoint) = signals.endpoint.filter(|e| e.ip.is_unspecified()) else {
            return Ok(None);
        };
        Ok(Some(Detected::endpoint(
            BootstrapSource::WildcardEndpoint,
            derive_ip(signals)?,
            endpoint.peer_port,
            endpoint.client_port,
            true,
        )))
    }
}
