//! Health surface: local dispatch probe, cluster size check and node check.
//!
//! Three independent checks, each returning a [`HealthStatus`]:
//!
//! - [`probe_local_dispatch`] pings the node-local [`LocalHealthCheck`]
//!   actor through the router, proving that local activation and dispatch
//!   work.
//! - [`ClusterHealth::check`] compares the number of active members with a
//!   configured minimum.
//! - [`NodeHealth::check`] reports this node's own membership status and the
//!   interval since the previous check. The previous check time is explicit
//!   [`HealthCheckState`] owned by the caller.

use std::time::Duration;

use tokio::time::Instant;

use crate::actors::{
    ActorContext, ActorError, ActorHandler, ActorId, ActorRouter, ActorType, MembershipSnapshot,
    NodeStatus, PlacementStrategy,
};
use crate::NetworkAddress;

/// Actor type of [`LocalHealthCheck`].
pub const LOCAL_HEALTH_CHECK_ACTOR: ActorType = ActorType(0x4845_4C54);

/// Method discriminants of [`LocalHealthCheck`].
pub mod health_methods {
    /// No-op round trip.
    pub const PING: u32 = 1;
}

/// Stateless, node-local actor answering pings.
///
/// Uses [`PlacementStrategy::Local`]: every node hosts its own instance and
/// nothing is registered in the directory.
#[derive(Debug, Default)]
pub struct LocalHealthCheck;

#[async_trait::async_trait(?Send)]
impl ActorHandler for LocalHealthCheck {
    fn actor_type() -> ActorType {
        LOCAL_HEALTH_CHECK_ACTOR
    }

    fn placement_strategy() -> PlacementStrategy {
        PlacementStrategy::Local
    }

    async fn dispatch(
        &mut self,
        _ctx: &ActorContext,
        method: u32,
        _body: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        match method {
            health_methods::PING => Ok(serde_json::to_vec(&())?),
            _ => Err(ActorError::UnknownMethod(method)),
        }
    }
}

/// Ping the node-local health actor.
pub async fn ping(router: &ActorRouter) -> Result<(), ActorError> {
    router
        .invoke(
            &ActorId::new(LOCAL_HEALTH_CHECK_ACTOR, "0"),
            health_methods::PING,
            &(),
        )
        .await
}

/// Outcome of a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Everything as expected.
    Healthy,
    /// Serving, but below expectations.
    Degraded(String),
    /// Not serving.
    Unhealthy(String),
}

impl HealthStatus {
    /// Whether the status is [`HealthStatus::Healthy`].
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Local dispatch probe: `Healthy` when a ping round-trips.
pub async fn probe_local_dispatch(router: &ActorRouter) -> HealthStatus {
    match ping(router).await {
        Ok(()) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "local health check actor failed");
            HealthStatus::Unhealthy(format!("local dispatch failed: {e}"))
        }
    }
}

/// Cluster size check.
pub struct ClusterHealth;

impl ClusterHealth {
    /// `Unhealthy` with no active member, `Degraded` below `min_members`,
    /// otherwise `Healthy`.
    pub fn check(view: &MembershipSnapshot, min_members: usize) -> HealthStatus {
        let count = view.active_members().len();
        if count == 0 {
            HealthStatus::Unhealthy("no active node in the cluster".into())
        } else if count < min_members {
            HealthStatus::Degraded(format!("currently only {count} node(s)"))
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Time of the previous [`NodeHealth::check`].
#[derive(Debug, Clone, Default)]
pub struct HealthCheckState {
    last_check: Option<Instant>,
}

impl HealthCheckState {
    /// State for a node that has never been checked.
    pub fn new() -> Self {
        Self::default()
    }

    /// When the previous check ran.
    pub fn last_check(&self) -> Option<Instant> {
        self.last_check
    }
}

/// Result of a [`NodeHealth::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHealthReport {
    /// The verdict.
    pub status: HealthStatus,
    /// Time since the previous check, `None` on the first one.
    pub since_last_check: Option<Duration>,
}

/// Health of one node as seen in the membership view.
#[derive(Debug, Clone)]
pub struct NodeHealth {
    address: NetworkAddress,
}

impl NodeHealth {
    /// Checker for the node at `address`.
    pub fn new(address: NetworkAddress) -> Self {
        Self { address }
    }

    /// Check the node against `view` and record `now` as the last check.
    pub fn check(
        &self,
        state: &mut HealthCheckState,
        view: &MembershipSnapshot,
        now: Instant,
    ) -> NodeHealthReport {
        let since_last_check = state
            .last_check
            .replace(now)
            .map(|previous| now.saturating_duration_since(previous));

        let status = match view.get_status(&self.address) {
            Some(NodeStatus::Active) => HealthStatus::Healthy,
            Some(status) => HealthStatus::Degraded(format!("node {} is {status}", self.address)),
            None => HealthStatus::Unhealthy(format!("node {} is not a member", self.address)),
        };
        NodeHealthReport {
            status,
            since_last_check,
        }
    }
}
