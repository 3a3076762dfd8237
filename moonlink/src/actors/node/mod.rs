//! Node lifecycle: configuration, cluster setup, and node management.

pub(crate) mod cluster;
pub(crate) mod config;
pub(crate) mod lifecycle;

pub use cluster::{ClusterConfig, ClusterConfigBuilder, ClusterConfigError};
pub use config::{
    NodeConfig, NodeConfigBuilder, DEFAULT_CALL_TIMEOUT, DEFAULT_DEFUNCT_EXPIRATION,
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_IDLE_TIMEOUT, DEFAULT_TRANSITION_TIMEOUT,
};
pub use lifecycle::{MoonlinkNode, MoonlinkNodeBuilder, NodeError, NodeLifecycle};
