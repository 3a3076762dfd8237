//! Node addressing.
//!
//! A [`NetworkAddress`] names one cluster node: the IP it binds for
//! node-to-node traffic plus the peer port. It is the key of the membership
//! view and the owner field of every directory entry.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// IP address + peer port of a cluster node.
///
/// # Examples
///
/// ```
/// use moonlink::NetworkAddress;
///
/// let addr: NetworkAddress = "10.0.0.4:11111".parse().expect("valid address");
/// assert_eq!(addr.port, 11111);
/// assert_eq!(addr.to_string(), "10.0.0.4:11111");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkAddress {
    /// IP address (IPv4 or IPv6).
    pub ip: IpAddr,
    /// Peer port.
    pub port: u16,
}

impl NetworkAddress {
    /// Create a new network address.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Loopback address on the given port.
    pub fn localhost(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }
}

impl FromStr for NetworkAddress {
    type Err = NetworkAddressParseError;

    /// Parses `ip:port`, with IPv6 in bracket notation (`[::1]:4500`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip_str, port_str) = match s.strip_prefix('[') {
            Some(rest) => {
                let (ip, port) = rest
                    .split_once("]:")
                    .ok_or(NetworkAddressParseError::MissingPort)?;
                (ip, port)
            }
            None => s
                .rsplit_once(':')
                .ok_or(NetworkAddressParseError::MissingPort)?,
        };
        let ip: IpAddr = ip_str
            .parse()
            .map_err(|_| NetworkAddressParseError::InvalidIp)?;
        let port: u16 = port_str
            .parse()
            .map_err(|_| NetworkAddressParseError::InvalidPort)?;
        Ok(Self::new(ip, port))
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// Error parsing a [`NetworkAddress`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkAddressParseError {
    /// The IP address could not be parsed.
    #[error("invalid IP address")]
    InvalidIp,
    /// The port number could not be parsed.
    #[error("invalid port number")]
    InvalidPort,
    /// No port separator found in the input.
    #[error("missing port separator")]
    MissingPort,
}
