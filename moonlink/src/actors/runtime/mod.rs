//! Actor runtime: host-side activations and caller-side routing.

pub(crate) mod host;
pub(crate) mod retry;
pub(crate) mod router;

pub use host::{ActorContext, ActorHandler, ActorHost};
pub use retry::RetryPolicy;
pub use router::{ActorRouter, MAX_FORWARDS};
