//! Errors surfaced by actor calls.

use std::time::Duration;

use crate::error::ValidationError;
use crate::NetworkAddress;

use super::infrastructure::{DirectoryError, MembershipError, PlacementError, TransportError};
use super::state::StoreError;
use super::types::{ActorFault, ActorType};

/// Errors from invoking a virtual actor.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// The worker rejected the request body.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No record exists for the key.
    #[error("url key does not exist: {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// Transient routing or persistence failure; safe to retry.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete before its deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The activation was mid-transition.
    #[error("activation in transition: {0}")]
    Retry(String),

    /// Another live activation owns the key.
    #[error("key is owned by {owner}")]
    NotOwner {
        /// Node hosting the winning activation.
        owner: NetworkAddress,
    },

    /// The message bounced between owners too many times.
    #[error("gave up after {forwards} ownership redirects")]
    TooManyForwards {
        /// Redirects followed before giving up.
        forwards: u8,
    },

    /// The method discriminant is not recognized by the actor type.
    #[error("unknown method: {0}")]
    UnknownMethod(u32),

    /// No handler is registered for the actor type on this node.
    #[error("actor type {0} is not registered")]
    UnregisteredType(ActorType),

    /// A remote handler failed with an error that has no local variant.
    #[error("handler error: {0}")]
    Handler(String),

    /// Directory lookup or registration failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Placement failed.
    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),

    /// Membership update failed.
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),

    /// Durable store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Request or response body could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ActorError {
    /// Whether the router may retry the call against a refreshed view.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActorError::Unavailable(_)
                | ActorError::Retry(_)
                | ActorError::Directory(DirectoryError::Unavailable(_))
                | ActorError::Placement(PlacementError::NoCandidates { .. })
                | ActorError::Store(StoreError::Unavailable(_))
        )
    }
}

impl From<ValidationError> for ActorError {
    fn from(e: ValidationError) -> Self {
        ActorError::InvalidArgument(e.to_string())
    }
}

impl From<TransportError> for ActorError {
    fn from(e: TransportError) -> Self {
        ActorError::Unavailable(e.to_string())
    }
}

impl From<&ActorError> for ActorFault {
    fn from(e: &ActorError) -> Self {
        match e {
            ActorError::InvalidArgument(msg) => ActorFault::InvalidArgument(msg.clone()),
            ActorError::NotFound { key } => ActorFault::NotFound { key: key.clone() },
            ActorError::NotOwner { owner } => ActorFault::NotOwner {
                owner: owner.clone(),
            },
            ActorError::UnknownMethod(method) => ActorFault::UnknownMethod(*method),
            ActorError::Retry(msg) => ActorFault::Retry(msg.clone()),
            other if other.is_retryable() => ActorFault::Unavailable(other.to_string()),
            other => ActorFault::Internal(other.to_string()),
        }
    }
}

impl From<ActorFault> for ActorError {
    fn from(fault: ActorFault) -> Self {
        match fault {
            ActorFault::InvalidArgument(msg) => ActorError::InvalidArgument(msg),
            ActorFault::NotFound { key } => ActorError::NotFound { key },
            ActorFault::Unavailable(msg) => ActorError::Unavailable(msg),
            ActorFault::Retry(msg) => ActorError::Retry(msg),
            ActorFault::NotOwner { owner } => ActorError::NotOwner { owner },
            ActorFault::UnknownMethod(method) => ActorError::UnknownMethod(method),
            ActorFault::Internal(msg) => ActorError::Handler(msg),
        }
    }
}
