//! Reading [`EnvironmentSignals`] from process environment and settings.

use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::settings::Settings;

use super::signals::EnvironmentSignals;

/// Environment variables consulted at startup.
pub mod vars {
    /// Private IP of a managed web platform instance.
    pub const PLATFORM_IP: &str = "WEBSITE_PRIVATE_IP";
    /// Comma-separated private ports of a managed web platform instance.
    pub const PLATFORM_PORTS: &str = "WEBSITE_PRIVATE_PORTS";
    /// Delegated virtual network IP of an orchestrated container.
    pub const PLATFORM_VNET_IP: &str = "Fabric_NET-0-[Delegated]";
    /// Node IP or FQDN of an orchestrated container.
    pub const NODE_IP_OR_FQDN: &str = "Fabric_NodeIPOrFQDN";
    /// Comma-separated exposed ports, peer port first.
    pub const EXPOSED_PORTS: &str = "MOONLINK_EXPOSED_PORTS";
    /// Set to `true` inside a container.
    pub const RUNNING_IN_CONTAINER: &str = "MOONLINK_RUNNING_IN_CONTAINER";
    /// Set to `true` inside a container by .NET base images.
    pub const DOTNET_RUNNING_IN_CONTAINER: &str = "DOTNET_RUNNING_IN_CONTAINER";
    /// `Development` for a local development run.
    pub const ENVIRONMENT: &str = "MOONLINK_ENVIRONMENT";
    /// Deployment slot id on Windows hosts.
    pub const DEPLOYMENT_ID: &str = "WEBSITE_DEPLOYMENT_ID";
    /// Site name, used as the slot id elsewhere.
    pub const SITE_NAME: &str = "WEBSITE_SITE_NAME";
    /// Container start time limit in seconds.
    pub const CONTAINER_START_TIME_LIMIT: &str = "WEBSITES_CONTAINER_START_TIME_LIMIT";
    /// Host name, resolved to find the container's own addresses.
    pub const HOSTNAME: &str = "HOSTNAME";
}

impl EnvironmentSignals {
    /// Signals from the process environment and `settings`.
    ///
    /// Inside a container, the host name is resolved to fill
    /// [`container_addresses`](Self::container_addresses).
    pub fn from_env(settings: &Settings) -> Result<Self, ConfigurationError> {
        let mut signals = Self::from_lookup(settings, |name| std::env::var(name).ok())?;
        if signals.in_container {
            signals.container_addresses = host_addresses();
        }
        Ok(signals)
    }

    /// Signals from `settings` and a variable lookup function.
    ///
    /// Empty variables count as unset. Settings win over the environment for
    /// exposed ports.
    pub fn from_lookup<F>(settings: &Settings, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let is_true = |name: &str| {
            var(name).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
        };

        let exposed_ports = match &settings.bootstrap.exposed_ports {
            Some(ports) => Some(ports.clone()),
            None => var(vars::EXPOSED_PORTS)
                .map(|raw| parse_ports(vars::EXPOSED_PORTS, &raw))
                .transpose()?,
        };

        let slot_var = if cfg!(windows) {
            vars::DEPLOYMENT_ID
        } else {
            vars::SITE_NAME
        };

        let container_start_time_limit = var(vars::CONTAINER_START_TIME_LIMIT).and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(
                        variable = vars::CONTAINER_START_TIME_LIMIT,
                        value = %raw,
                        "ignoring unparsable container start time limit"
                    );
                    None
                }
            }
        });

        Ok(Self {
            platform_ip: var(vars::PLATFORM_IP),
            platform_ports: var(vars::PLATFORM_PORTS),
            platform_vnet_ip: var(vars::PLATFORM_VNET_IP),
            node_ip_or_fqdn: var(vars::NODE_IP_OR_FQDN),
            exposed_ports,
            in_container: is_true(vars::RUNNING_IN_CONTAINER)
                || is_true(vars::DOTNET_RUNNING_IN_CONTAINER),
            container_addresses: Vec::new(),
            development: var(vars::ENVIRONMENT)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("development")),
            deployment_slot: var(slot_var),
            cluster_id: settings.cluster.cluster_id.clone(),
            service_id: settings.cluster.service_id.clone(),
            endpoint: settings.endpoint,
            container_start_time_limit,
        })
    }
}

fn parse_ports(source_name: &str, raw: &str) -> Result<Vec<u16>, ConfigurationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<u16>().map_err(|_| ConfigurationError::InvalidPort {
                source_name: source_name.to_string(),
                value: p.to_string(),
            })
        })
        .collect()
}

fn host_addresses() -> Vec<IpAddr> {
    let host = std::env::var(vars::HOSTNAME)
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());
    let Some(host) = host else {
        return Vec::new();
    };
    match (host.as_str(), 0).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "cannot resolve container host name");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_reads_platform_variables() {
        let signals = EnvironmentSignals::from_lookup(
            &Settings::default(),
            lookup(&[
                (vars::PLATFORM_IP, "10.0.0.4"),
                (vars::PLATFORM_PORTS, "11111,30000"),
                (vars::DOTNET_RUNNING_IN_CONTAINER, " TRUE "),
                (vars::CONTAINER_START_TIME_LIMIT, "230"),
                (vars::ENVIRONMENT, "Production"),
            ]),
        )
        .expect("signals");
        assert_eq!(signals.platform_ip.as_deref(), Some("10.0.0.4"));
        assert_eq!(signals.platform_ports.as_deref(), Some("11111,30000"));
        assert!(signals.in_container);
        assert!(!signals.development);
        assert_eq!(
            signals.container_start_time_limit,
            Some(Duration::from_secs(230))
        );
    }

    #[test]
    fn test_empty_variables_are_unset() {
        let signals = EnvironmentSignals::from_lookup(
            &Settings::default(),
            lookup(&[(vars::PLATFORM_IP, ""), (vars::SITE_NAME, " ")]),
        )
        .expect("signals");
        assert_eq!(signals, EnvironmentSignals::default());
    }

    #[test]
    fn test_exposed_ports_from_env() {
        let signals = EnvironmentSignals::from_lookup(
            &Settings::default(),
            lookup(&[(vars::EXPOSED_PORTS, "11111, 30000")]),
        )
        .expect("signals");
        assert_eq!(signals.exposed_ports, Some(vec![11111, 30000]));

        let err = EnvironmentSignals::from_lookup(
            &Settings::default(),
            lookup(&[(vars::EXPOSED_PORTS, "11111,http")]),
        )
        .expect_err("bad port");
        assert!(matches!(err, ConfigurationError::InvalidPort { value, .. } if value == "http"));
    }

    #[test]
    fn test_settings_win_for_exposed_ports() {
        let settings =
            Settings::parse("[bootstrap]\nexposed_ports = [20000, 40000]\n").expect("settings");
        let signals = EnvironmentSignals::from_lookup(
            &settings,
            lookup(&[(vars::EXPOSED_PORTS, "11111,30000")]),
        )
        .expect("signals");
        assert_eq!(signals.exposed_ports, Some(vec![20000, 40000]));
    }

    #[test]
    fn test_development_flag() {
        let signals = EnvironmentSignals::from_lookup(
            &Settings::default(),
            lookup(&[(vars::ENVIRONMENT, "development")]),
        )
        .expect("signals");
        assert!(signals.development);
    }
}
