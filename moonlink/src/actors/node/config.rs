//! Per-node configuration for [`MoonlinkNode`](super::MoonlinkNode).
//!
//! Separates node-level settings (address, state store, timeouts)
//! from cluster-level settings ([`ClusterConfig`](super::ClusterConfig)).

use std::rc::Rc;
use std::time::Duration;

use crate::actors::runtime::RetryPolicy;
use crate::actors::state::{DurableRecordStore, InMemoryRecordStore};
use crate::NetworkAddress;

/// How long an activation may sit idle before it is deactivated.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
/// Bound on activation and deactivation hooks.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on a routed call, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// How often a node reports itself alive.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long a silent member stays in the view before it is declared dead.
pub const DEFAULT_DEFUNCT_EXPIRATION: Duration = Duration::from_secs(60);

/// Per-node configuration for a [`MoonlinkNode`](super::MoonlinkNode).
///
/// # Example
///
/// ```rust,ignore
/// // Single-node: address inferred from topology
/// let config = NodeConfig::default();
///
/// // Multi-node: specify which address this node binds to
/// let config = NodeConfig::for_address(addr);
///
/// // Full control via builder
/// let config = NodeConfig::builder()
///     .address(addr)
///     .state_store(store)
///     .idle_timeout(Duration::from_secs(60))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct NodeConfig {
    address: Option<NetworkAddress>,
    state_store: Rc<dyn DurableRecordStore>,
    idle_timeout: Duration,
    transition_timeout: Duration,
    call_timeout: Duration,
    retry: RetryPolicy,
    heartbeat_interval: Duration,
    defunct_expiration: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfigBuilder::default().build()
    }
}

impl NodeConfig {
    /// Create a node config with only the address set.
    pub fn for_address(address: NetworkAddress) -> Self {
        Self::builder().address(address).build()
    }

    /// Start building a node configuration.
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    /// The node's network address, if explicitly set.
    pub fn address(&self) -> Option<&NetworkAddress> {
        self.address.as_ref()
    }

    /// The durable store activations persist to.
    pub fn state_store(&self) -> Rc<dyn DurableRecordStore> {
        self.state_store.clone()
    }

    /// Idle timeout for activations.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Timeout for activation and deactivation hooks.
    pub fn transition_timeout(&self) -> Duration {
        self.transition_timeout
    }

    /// Timeout for a routed call.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Retry policy for routed calls.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Interval between heartbeats.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Silence after which a member is declared dead.
    pub fn defunct_expiration(&self) -> Duration {
        self.defunct_expiration
    }
}

/// Builder for [`NodeConfig`].
#[derive(Debug, Clone, Default)]
pub struct NodeConfigBuilder {
    address: Option<NetworkAddress>,
    state_store: Option<Rc<dyn DurableRecordStore>>,
    idle_timeout: Option<Duration>,
    transition_timeout: Option<Duration>,
    call_timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    heartbeat_interval: Option<Duration>,
    defunct_expiration: Option<Duration>,
}

impl NodeConfigBuilder {
    /// Set the node's network address.
    pub fn address(mut self, address: NetworkAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the durable store. Nodes of one cluster must share it.
    pub fn state_store(mut self, store: Rc<dyn DurableRecordStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Set the activation idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the activation and deactivation hook timeout.
    pub fn transition_timeout(mut self, timeout: Duration) -> Self {
        self.transition_timeout = Some(timeout);
        self
    }

    /// Set the routed call timeout.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set the heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Set how long a silent member survives before being declared dead.
    pub fn defunct_expiration(mut self, expiration: Duration) -> Self {
        self.defunct_expiration = Some(expiration);
        self
    }

    /// Build the node configuration (infallible).
    pub fn build(self) -> NodeConfig {
        NodeConfig {
            address: self.address,
            state_store: self
                .state_store
                .unwrap_or_else(|| Rc::new(InMemoryRecordStore::new())),
            idle_timeout: self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
            transition_timeout: self
                .transition_timeout
                .unwrap_or(DEFAULT_TRANSITION_TIMEOUT),
            call_timeout: self.call_timeout.unwrap_or(DEFAULT_CALL_TIMEOUT),
            retry: self.retry.unwrap_or_default(),
            heartbeat_interval: self
                .heartbeat_interval
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL),
            defunct_expiration: self
                .defunct_expiration
                .unwrap_or(DEFAULT_DEFUNCT_EXPIRATION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = NodeConfig::default();
        assert!(config.address().is_none());
        assert_eq!(config.idle_timeout(), Duration::from_secs(7200));
        assert_eq!(config.transition_timeout(), Duration::from_secs(5));
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.defunct_expiration(), Duration::from_secs(60));
        assert_eq!(config.retry(), &RetryPolicy::default());
    }

    #[test]
    fn test_for_address() {
        let config = NodeConfig::for_address(NetworkAddress::localhost(11111));
        assert_eq!(config.address(), Some(&NetworkAddress::localhost(11111)));
    }

    #[test]
    fn test_clone_shares_store() {
        let config = NodeConfig::default();
        let copy = config.clone();
        assert!(Rc::ptr_eq(&config.state_store(), &copy.state_store()));
    }

    #[test]
    fn test_builder_overrides() {
        let config = NodeConfig::builder()
            .idle_timeout(Duration::from_secs(60))
            .retry(RetryPolicy::no_retry())
            .defunct_expiration(Duration::from_secs(10))
            .build();
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry().max_attempts, 1);
        assert_eq!(config.defunct_expiration(), Duration::from_secs(10));
    }
}
