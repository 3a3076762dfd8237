//! End-to-end bootstrap: settings file + environment variables → plan.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use moonlink::bootstrap::{
    vars, BootstrapSource, ClusterBootstrapResolver, EnvironmentSignals, MembershipMode,
};
use moonlink::settings::Settings;
use moonlink::ConfigurationError;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| map.get(name).cloned()
}

fn ip(raw: &str) -> IpAddr {
    raw.parse().expect("ip")
}

const EXPLICIT: &str = r#"
[cluster]
cluster_id = "prod"
service_id = "shortener"

[endpoint]
ip = "192.168.1.5"
peer_port = 22222
client_port = 40000
"#;

#[test]
fn test_managed_platform_wins_over_settings() {
    let settings = Settings::parse(EXPLICIT).expect("settings");
    let signals = EnvironmentSignals::from_lookup(
        &settings,
        env(&[
            (vars::PLATFORM_IP, "10.0.0.4"),
            (vars::PLATFORM_PORTS, "11111,30000"),
        ]),
    )
    .expect("signals");

    let plan = ClusterBootstrapResolver::default()
        .plan(&signals)
        .expect("plan");
    assert_eq!(plan.source, BootstrapSource::ManagedPlatform);
    assert_eq!(plan.identity.bind_address, ip("10.0.0.4"));
    assert_eq!(plan.identity.peer_port, 11111);
    assert_eq!(plan.identity.client_port, 30000);
    assert!(!plan.identity.listen_on_all_interfaces);
    assert_eq!(plan.identity.cluster_id, "prod");
    assert_eq!(plan.identity.service_id, "shortener");
}

#[test]
fn test_explicit_endpoint_used_verbatim() {
    let settings = Settings::parse(EXPLICIT).expect("settings");
    let signals = EnvironmentSignals::from_lookup(&settings, env(&[])).expect("signals");

    let identity = ClusterBootstrapResolver::default()
        .resolve(&signals)
        .expect("resolve");
    assert_eq!(identity.peer_address().to_string(), "192.168.1.5:22222");
    assert_eq!(identity.client_address().to_string(), "192.168.1.5:40000");
    assert!(!identity.listen_on_all_interfaces);
}

#[test]
fn test_container_with_exposed_ports() {
    let signals = EnvironmentSignals::from_lookup(
        &Settings::default(),
        env(&[
            (vars::EXPOSED_PORTS, "11111,30000"),
            (vars::RUNNING_IN_CONTAINER, "true"),
            (vars::NODE_IP_OR_FQDN, "10.1.0.7"),
            (vars::SITE_NAME, "moonlink-blue"),
            (vars::DEPLOYMENT_ID, "moonlink-blue"),
            (vars::CONTAINER_START_TIME_LIMIT, "230"),
        ]),
    )
    .expect("signals");

    let plan = ClusterBootstrapResolver::default()
        .plan(&signals)
        .expect("plan");
    assert_eq!(plan.source, BootstrapSource::ExposedPorts);
    assert_eq!(plan.membership, MembershipMode::Directory);
    assert_eq!(plan.identity.bind_address, ip("10.1.0.7"));
    assert!(plan.identity.listen_on_all_interfaces);
    assert_eq!(plan.identity.peer_address().to_string(), "10.1.0.7:11111");
    assert_eq!(plan.identity.cluster_id, "cluster-moonlink-blue");
    assert_eq!(plan.identity.service_id, "moonlink");
    assert_eq!(plan.defunct_expiration, Some(Duration::from_secs(460)));
}

#[test]
fn test_single_exposed_port_is_fatal() {
    let settings = Settings::parse("[bootstrap]\nexposed_ports = [11111]\n").expect("settings");
    let signals = EnvironmentSignals::from_lookup(&settings, env(&[])).expect("signals");

    let err = ClusterBootstrapResolver::default()
        .resolve(&signals)
        .expect_err("one port");
    assert_eq!(err, ConfigurationError::InsufficientPorts { found: 1 });
    assert!(err.to_string().contains("at least 2"));
}

#[test]
fn test_development_run() {
    let signals = EnvironmentSignals::from_lookup(
        &Settings::default(),
        env(&[(vars::ENVIRONMENT, "Development")]),
    )
    .expect("signals");

    let plan = ClusterBootstrapResolver::default()
        .plan(&signals)
        .expect("plan");
    assert_eq!(plan.source, BootstrapSource::LocalDevelopment);
    assert_eq!(plan.membership, MembershipMode::SingleNode);
    assert_eq!(plan.identity.peer_address().to_string(), "127.0.0.1:11111");
    assert_eq!(plan.identity.client_port, 30000);
    assert_eq!(plan.identity.cluster_id, "dev");
}

#[test]
fn test_nothing_to_go_on() {
    let signals =
        EnvironmentSignals::from_lookup(&Settings::default(), env(&[])).expect("signals");
    assert_eq!(
        ClusterBootstrapResolver::default().resolve(&signals),
        Err(ConfigurationError::NoUsableSignal)
    );
}
