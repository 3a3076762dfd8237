//! Actor router: caller-side resolution and request dispatch.
//!
//! The `ActorRouter` resolves `ActorId → NetworkAddress` using the directory
//! and placement director, then delivers the call either to the local
//! [`ActorHost`] or over the [`ClusterTransport`].
//!
//! # Flow
//!
//! 1. Node-local actor types always resolve to this node
//! 2. A directory entry wins while its node is an active member
//! 3. A stale entry (dead or unknown node) is dropped
//! 4. Otherwise the placement director picks the owner from active members
//! 5. `NotOwner` replies redirect the call, up to [`MAX_FORWARDS`] times
//! 6. Retryable failures back off per [`RetryPolicy`] and resolve again
//!
//! The whole call, retries included, is bounded by the call timeout.
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' `GrainReference` / `OutsideRuntimeClient`:
//! the caller-side proxy that resolves grain location and sends messages.

use std::rc::Rc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::actors::error::ActorError;
use crate::actors::infrastructure::{
    ActorDirectory, ClusterTransport, MembershipProvider, PlacementDirector, PlacementStrategy,
};
use crate::actors::node::{ClusterConfig, NodeConfig};
use crate::actors::types::{ActorId, ActorMessage};
use crate::NetworkAddress;

use super::host::ActorHost;
use super::retry::RetryPolicy;

/// How many `NotOwner` redirects a single attempt follows.
pub const MAX_FORWARDS: u8 = 3;

/// Caller-side actor request router.
///
/// # Example
///
/// ```rust,ignore
/// let router = ActorRouter::new(host, &cluster, &config);
///
/// let record: UrlRecord = router
///     .invoke(&ActorId::new(URL_RECORD_ACTOR, "1F3A"), READ, &())
///     .await?;
/// ```
pub struct ActorRouter {
    local_address: NetworkAddress,
    host: Rc<ActorHost>,
    directory: Rc<dyn ActorDirectory>,
    membership: Rc<dyn MembershipProvider>,
    placement: Rc<dyn PlacementDirector>,
    transport: Rc<dyn ClusterTransport>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ActorRouter {
    /// Create a router delivering local calls to `host`.
    pub fn new(host: Rc<ActorHost>, cluster: &ClusterConfig, config: &NodeConfig) -> Self {
        Self {
            local_address: host.local_address().clone(),
            host,
            directory: cluster.directory().clone(),
            membership: cluster.membership().clone(),
            placement: cluster.placement_director().clone(),
            transport: cluster.transport().clone(),
            retry: config.retry().clone(),
            call_timeout: config.call_timeout(),
        }
    }

    /// Call `method` on `target` with a JSON-encoded request and decode the
    /// reply.
    pub async fn invoke<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        target: &ActorId,
        method: u32,
        request: &Req,
    ) -> Result<Resp, ActorError> {
        let body = serde_json::to_vec(request)?;
        let reply = self.invoke_raw(target, method, body).await?;
        Ok(serde_json::from_slice(&reply)?)
    }

    /// Call `method` on `target` with a pre-encoded body.
    pub async fn invoke_raw(
        &self,
        target: &ActorId,
        method: u32,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, ActorError> {
        match tokio::time::timeout(self.call_timeout, self.call_with_retry(target, method, body))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(actor = %target, method, timeout = ?self.call_timeout, "call timed out");
                Err(ActorError::Timeout(self.call_timeout))
            }
        }
    }

    async fn call_with_retry(
        &self,
        target: &ActorId,
        method: u32,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, ActorError> {
        let mut failures = 0;
        loop {
            let error = match self.attempt(target, method, body.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };
            failures += 1;
            match self.retry.backoff(failures) {
                Some(delay) => {
                    tracing::debug!(actor = %target, attempt = failures, ?delay, error = %error, "retrying call");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::warn!(actor = %target, attempts = failures, error = %error, "giving up");
                    return Err(ActorError::Unavailable(format!(
                        "{target} still unavailable after {failures} attempts: {error}"
                    )));
                }
            }
        }
    }

    /// One attempt: resolve against the current view, then follow redirects.
    async fn attempt(
        &self,
        target: &ActorId,
        method: u32,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, ActorError> {
        let mut owner = self.resolve(target).await?;
        let mut message = ActorMessage {
            target: target.clone(),
            method,
            body,
            forward_count: 0,
        };
        loop {
            match self.deliver(&owner, message.clone()).await {
                Err(ActorError::NotOwner { owner: next }) => {
                    if message.forward_count >= MAX_FORWARDS {
                        return Err(ActorError::TooManyForwards {
                            forwards: message.forward_count,
                        });
                    }
                    message.forward_count += 1;
                    tracing::debug!(actor = %target, from = %owner, to = %next, "following redirect");
                    owner = next;
                }
                other => return other,
            }
        }
    }

    /// Resolve the node that should handle calls for `target`.
    pub async fn resolve(&self, target: &ActorId) -> Result<NetworkAddress, ActorError> {
        let strategy = self
            .host
            .placement_for(target.actor_type)
            .unwrap_or_default();
        if strategy == PlacementStrategy::Local {
            return Ok(self.local_address.clone());
        }

        let snapshot = self.membership.snapshot().await;
        if let Some(entry) = self.directory.lookup(target).await? {
            if snapshot.is_active(&entry.node) {
                return Ok(entry.node);
            }
            tracing::warn!(
                actor = %target,
                node = %entry.node,
                activation = %entry.activation_id,
                "dropping directory entry of inactive node"
            );
            self.directory.unregister(&entry).await?;
        }

        let members = snapshot.active_members();
        Ok(self
            .placement
            .place(strategy, target, &members, &self.local_address)
            .await?)
    }

    async fn deliver(
        &self,
        owner: &NetworkAddress,
        message: ActorMessage,
    ) -> Result<Vec<u8>, ActorError> {
        if *owner == self.local_address {
            return self.host.handle(message).await;
        }
        let response = self.transport.send(owner, message).await?;
        response.body.map_err(ActorError::from)
    }
}
