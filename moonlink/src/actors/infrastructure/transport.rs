//! Node-to-node RPC: deliver an [`ActorMessage`] to the owning node and wait
//! for its [`ActorResponse`].
//!
//! The runtime only needs reliable point-to-point request/response, so the
//! seam is a small trait. [`LocalNetwork`] implements it for nodes sharing a
//! process: every message and response goes through a `serde_json` encode
//! and decode, the way it would on a socket, and individual nodes can be
//! partitioned away to exercise failover.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::{mpsc, oneshot};

use crate::actors::types::{ActorMessage, ActorResponse};
use crate::NetworkAddress;

/// A request delivered to a node, with the channel to answer on.
#[derive(Debug)]
pub struct InboundRequest {
    /// The decoded message.
    pub message: ActorMessage,
    /// Where the response goes.
    pub reply: oneshot::Sender<ActorResponse>,
}

/// Stream of requests addressed to a bound node.
pub type InboundRequests = mpsc::UnboundedReceiver<InboundRequest>;

/// Errors from the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The destination is not bound or not reachable.
    #[error("node {0} is unreachable")]
    Unreachable(NetworkAddress),

    /// Another node already listens on the address.
    #[error("address {0} is already bound")]
    AddressInUse(NetworkAddress),

    /// The destination accepted the request but never answered.
    #[error("request to {0} was dropped before a reply")]
    ReplyDropped(NetworkAddress),

    /// Encoding or decoding the payload failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Reliable point-to-point RPC between cluster nodes.
#[async_trait::async_trait(?Send)]
pub trait ClusterTransport: fmt::Debug {
    /// Start accepting requests addressed to `address`.
    fn bind(&self, address: &NetworkAddress) -> Result<InboundRequests, TransportError>;

    /// Stop accepting requests for `address`.
    fn unbind(&self, address: &NetworkAddress);

    /// Send `message` to `to` and wait for the response.
    async fn send(
        &self,
        to: &NetworkAddress,
        message: ActorMessage,
    ) -> Result<ActorResponse, TransportError>;
}

/// In-process network shared by all nodes of a test or single-process
/// deployment.
#[derive(Debug, Default)]
pub struct LocalNetwork {
    endpoints: RefCell<HashMap<NetworkAddress, mpsc::UnboundedSender<InboundRequest>>>,
    partitioned: RefCell<HashSet<NetworkAddress>>,
}

impl LocalNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cut `address` off: requests to it fail as unreachable and replies
    /// from it are lost.
    pub fn partition(&self, address: &NetworkAddress) {
        tracing::warn!(node = %address, "partitioning node");
        self.partitioned.borrow_mut().insert(address.clone());
    }

    /// Reconnect a partitioned node.
    pub fn heal(&self, address: &NetworkAddress) {
        tracing::info!(node = %address, "healing node");
        self.partitioned.borrow_mut().remove(address);
    }

    /// Whether `address` is currently partitioned.
    pub fn is_partitioned(&self, address: &NetworkAddress) -> bool {
        self.partitioned.borrow().contains(address)
    }

    fn through_wire<T: serde::Serialize + serde::de::DeserializeOwned>(
        value: &T,
    ) -> Result<T, TransportError> {
        let bytes = serde_json::to_vec(value)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait::async_trait(?Send)]
impl ClusterTransport for LocalNetwork {
    fn bind(&self, address: &NetworkAddress) -> Result<InboundRequests, TransportError> {
        let mut endpoints = self.endpoints.borrow_mut();
        if endpoints.get(address).is_some_and(|tx| !tx.is_closed()) {
            return Err(TransportError::AddressInUse(address.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        endpoints.insert(address.clone(), tx);
        Ok(rx)
    }

    fn unbind(&self, address: &NetworkAddress) {
        self.endpoints.borrow_mut().remove(address);
    }

    async fn send(
        &self,
        to: &NetworkAddress,
        message: ActorMessage,
    ) -> Result<ActorResponse, TransportError> {
        if self.is_partitioned(to) {
            return Err(TransportError::Unreachable(to.clone()));
        }
        let endpoint = self
            .endpoints
            .borrow()
            .get(to)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable(to.clone()))?;

        let (reply, response) = oneshot::channel();
        let request = InboundRequest {
            message: Self::through_wire(&message)?,
            reply,
        };
        endpoint
            .send(request)
            .map_err(|_| TransportError::Unreachable(to.clone()))?;

        let response = response
            .await
            .map_err(|_| TransportError::ReplyDropped(to.clone()))?;
        if self.is_partitioned(to) {
            return Err(TransportError::Unreachable(to.clone()));
        }
        Self::through_wire(&response)
    }
}
