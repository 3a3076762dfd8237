//! MoonlinkNode: unified actor runtime for a single node.
//!
//! [`MoonlinkNode`] ties together transport, directory, membership, and actor
//! hosting into a single entry point. It creates the host and router
//! internally and manages the full lifecycle.
//!
//! # Builder API
//!
//! ```rust,ignore
//! let cluster = ClusterConfig::builder()
//!     .name("moonlink")
//!     .topology(vec![addr.clone()])
//!     .build()?;
//!
//! let node = MoonlinkNode::new(cluster, NodeConfig::default())
//!     .register::<UrlRecordWorker>()
//!     .start()
//!     .await?;
//!
//! node.shutdown().await?;
//! ```
//!
//! # Lifecycle
//!
//! 1. **Initializing**: address bound, node joined as `Joining`
//! 2. **Active**: inbound loop, heartbeats and view watcher running
//! 3. **Stopping**: activations flushed, directory entries dropped
//! 4. **Stopped**: marked `Dead`, transport unbound
//!
//! # Orleans Reference
//!
//! The heartbeat and view watcher loops play the part of Orleans'
//! `MembershipAgent` and `GrainDirectoryHandoffManager`: report liveness,
//! declare silent silos dead, and drop or move grains whose owner changed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::actors::actor_ref::ActorRef;
use crate::actors::error::ActorError;
use crate::actors::infrastructure::{
    InboundRequests, MembershipError, MembershipProvider, NodeStatus, PlacementStrategy,
    TransportError,
};
use crate::actors::lifecycle::DeactivationReason;
use crate::actors::runtime::{ActorHandler, ActorHost, ActorRouter};
use crate::actors::types::{ActorFault, ActorResponse};
use crate::NetworkAddress;

use super::cluster::ClusterConfig;
use super::config::NodeConfig;

/// Lifecycle state of a [`MoonlinkNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycle {
    /// Joined but not yet serving.
    Initializing,
    /// Serving requests and processing actor messages.
    Active,
    /// Shutting down: flushing activations.
    Stopping,
    /// No longer part of the cluster.
    Stopped,
}

/// Unified actor runtime for a single node.
pub struct MoonlinkNode {
    host: Rc<ActorHost>,
    router: Rc<ActorRouter>,
    cluster: ClusterConfig,
    address: NetworkAddress,
    status: Cell<NodeLifecycle>,
    tasks: RefCell<Vec<JoinHandle<()>>>,
}

impl MoonlinkNode {
    /// Create a builder for a node in the given cluster.
    ///
    /// # Arguments
    ///
    /// * `cluster` - Shared cluster configuration (directory, membership, transport)
    /// * `config` - Per-node settings (address, store, timeouts)
    #[allow(clippy::new_ret_no_self)]
    pub fn new(cluster: ClusterConfig, config: NodeConfig) -> MoonlinkNodeBuilder {
        MoonlinkNodeBuilder {
            cluster,
            config,
            registrations: Vec::new(),
        }
    }

    /// Get a typed actor reference by identity.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let record: UrlRecordRef = node.actor_ref("1F3A");
    /// record.write(Some("example.com")).await?;
    /// ```
    pub fn actor_ref<R: ActorRef>(&self, identity: impl Into<String>) -> R {
        R::from_router(identity, &self.router)
    }

    /// The router for calls originating on this node.
    pub fn router(&self) -> &Rc<ActorRouter> {
        &self.router
    }

    /// The host holding this node's activations.
    pub fn host(&self) -> &Rc<ActorHost> {
        &self.host
    }

    /// This node's network address.
    pub fn address(&self) -> &NetworkAddress {
        &self.address
    }

    /// Current lifecycle status.
    pub fn status(&self) -> NodeLifecycle {
        self.status.get()
    }

    /// The cluster configuration this node belongs to.
    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    /// Gracefully leave the cluster.
    ///
    /// Moves the node through `ShuttingDown` → `Dead` in the membership
    /// view, deactivates every activation (flushing state), drops this
    /// node's directory entries, then unbinds the transport.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        if self.status.get() == NodeLifecycle::Stopped {
            return Ok(());
        }
        self.status.set(NodeLifecycle::Stopping);
        tracing::info!(node = %self.address, "shutting down");

        let membership = self.cluster.membership();
        if let Err(e) = membership
            .update_status(&self.address, NodeStatus::ShuttingDown)
            .await
        {
            tracing::warn!(node = %self.address, error = %e, "could not announce shutdown");
        }

        self.host.close();
        self.abort_tasks();
        let flushed = self
            .host
            .deactivate_all(DeactivationReason::NodeShutdown)
            .await;
        tracing::debug!(node = %self.address, activations = flushed, "activations deactivated");

        if let Err(e) = self
            .cluster
            .directory()
            .unregister_members(std::slice::from_ref(&self.address))
            .await
        {
            tracing::warn!(node = %self.address, error = %e, "could not clean directory");
        }

        let marked = membership
            .update_status(&self.address, NodeStatus::Dead)
            .await;
        self.cluster.transport().unbind(&self.address);
        self.status.set(NodeLifecycle::Stopped);
        tracing::info!(node = %self.address, "stopped");
        marked.map(|_| ()).map_err(NodeError::from)
    }

    /// Stop the node abruptly, as if its process died.
    ///
    /// Nothing is announced: the membership row and directory entries stay
    /// until the rest of the cluster notices the silence.
    pub fn kill(&self) {
        tracing::warn!(node = %self.address, "killing node");
        self.host.close();
        self.abort_tasks();
        self.cluster.transport().unbind(&self.address);
        self.status.set(NodeLifecycle::Stopped);
    }

    fn abort_tasks(&self) {
        for task in self.tasks.borrow_mut().drain(..) {
            task.abort();
        }
    }
}

impl Drop for MoonlinkNode {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Builder for [`MoonlinkNode`].
///
/// Collects configuration and actor registrations, then creates the node
/// during [`start()`](Self::start).
pub struct MoonlinkNodeBuilder {
    cluster: ClusterConfig,
    config: NodeConfig,
    registrations: Vec<fn(&ActorHost)>,
}

impl MoonlinkNodeBuilder {
    /// Register an actor handler type.
    pub fn register<H: ActorHandler>(mut self) -> Self {
        self.registrations.push(ActorHost::register::<H>);
        self
    }

    /// Build and start the node.
    ///
    /// Binds the transport, joins the membership view, starts the inbound
    /// loop and background tasks, then marks the node `Active`. Must run
    /// inside a `LocalSet`.
    ///
    /// If no address was set in [`NodeConfig`], it is inferred from a
    /// single-member topology.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is missing or already bound, or if
    /// the membership provider rejects the node.
    pub async fn start(self) -> Result<MoonlinkNode, NodeError> {
        let membership = self.cluster.membership().clone();
        let address = match self.config.address() {
            Some(address) => address.clone(),
            None => {
                let mut members = membership.members().await;
                if members.len() != 1 {
                    return Err(NodeError::MissingAddress);
                }
                members.pop().ok_or(NodeError::MissingAddress)?
            }
        };

        let inbound = self.cluster.transport().bind(&address)?;

        let node_name = self
            .cluster
            .name()
            .map(|name| format!("{name}-{address}"))
            .unwrap_or_else(|| format!("node-{address}"));
        if let Err(e) = membership.join(address.clone(), node_name).await {
            self.cluster.transport().unbind(&address);
            return Err(e.into());
        }

        let host = Rc::new(ActorHost::new(address.clone(), &self.cluster, &self.config));
        for register in &self.registrations {
            register(&host);
        }
        let router = Rc::new(ActorRouter::new(host.clone(), &self.cluster, &self.config));

        let node = MoonlinkNode {
            host: host.clone(),
            router,
            cluster: self.cluster.clone(),
            address: address.clone(),
            status: Cell::new(NodeLifecycle::Initializing),
            tasks: RefCell::new(Vec::new()),
        };

        node.tasks
            .borrow_mut()
            .push(tokio::task::spawn_local(serve_inbound(host.clone(), inbound)));

        membership
            .update_status(&address, NodeStatus::Active)
            .await?;
        node.status.set(NodeLifecycle::Active);

        let mut tasks = node.tasks.borrow_mut();
        tasks.push(tokio::task::spawn_local(heartbeat_loop(
            membership.clone(),
            address.clone(),
            self.config.heartbeat_interval(),
            self.config.defunct_expiration(),
        )));
        tasks.push(tokio::task::spawn_local(watch_view(
            host,
            self.cluster,
            address.clone(),
        )));
        drop(tasks);

        tracing::info!(node = %address, "node active");
        Ok(node)
    }
}

/// Answer requests arriving over the transport, one task per request.
async fn serve_inbound(host: Rc<ActorHost>, mut inbound: InboundRequests) {
    while let Some(request) = inbound.recv().await {
        let host = host.clone();
        tokio::task::spawn_local(async move {
            let body = host
                .handle(request.message)
                .await
                .map_err(|e| ActorFault::from(&e));
            let _ = request.reply.send(ActorResponse { body });
        });
    }
}

/// Report liveness and declare silent members dead.
async fn heartbeat_loop(
    membership: Rc<dyn MembershipProvider>,
    address: NetworkAddress,
    interval: Duration,
    expiration: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = membership.heartbeat(&address).await {
            tracing::error!(node = %address, error = %e, "heartbeat rejected, stopping");
            return;
        }
        for dead in membership.expire_silent_members(expiration).await {
            tracing::warn!(node = %address, dead = %dead, "declared silent member dead");
        }
    }
}

/// React to membership changes: drop directory entries of dead nodes and
/// deactivate keys this node no longer owns.
async fn watch_view(host: Rc<ActorHost>, cluster: ClusterConfig, address: NetworkAddress) {
    let mut changes = cluster.membership().watch();
    while changes.changed().await.is_ok() {
        let version = *changes.borrow_and_update();
        if let Err(e) = rebalance(&host, &cluster, &address).await {
            tracing::warn!(node = %address, %version, error = %e, "view change handling failed");
        }
    }
}

async fn rebalance(
    host: &ActorHost,
    cluster: &ClusterConfig,
    address: &NetworkAddress,
) -> Result<(), ActorError> {
    let snapshot = cluster.membership().snapshot().await;
    let dead = snapshot.members_with_status(NodeStatus::Dead);
    if !dead.is_empty() {
        cluster.directory().unregister_members(&dead).await?;
    }
    if !snapshot.is_active(address) {
        return Ok(());
    }

    let members = snapshot.active_members();
    for id in host.activation_ids() {
        if host.placement_for(id.actor_type) != Some(PlacementStrategy::Hashed) {
            continue;
        }
        let owner = cluster
            .placement_director()
            .place(PlacementStrategy::Hashed, &id, &members, address)
            .await?;
        if owner != *address {
            tracing::info!(actor = %id, owner = %owner, "ownership moved");
            host.deactivate(&id, DeactivationReason::OwnershipLost).await;
        }
    }
    Ok(())
}

/// Errors from [`MoonlinkNode`] operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Network address could not be determined.
    ///
    /// Set it via [`NodeConfig::for_address`] or use a single-member topology.
    #[error("node requires an address (set in NodeConfig or use single-member topology)")]
    MissingAddress,

    /// Binding the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The membership provider rejected the node.
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),
}
