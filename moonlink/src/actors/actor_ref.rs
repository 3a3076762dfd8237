//! Typed actor reference construction trait.
//!
//! [`ActorRef`] enables the `node.actor_ref::<UrlRecordRef>("1F3A")` pattern:
//! a small typed facade over [`ActorRouter::invoke`] per worker type.

use std::rc::Rc;

use super::runtime::ActorRouter;

/// Trait for constructing typed actor references from a router.
pub trait ActorRef: Sized {
    /// Create a reference to the actor with the given identity.
    fn from_router(identity: impl Into<String>, router: &Rc<ActorRouter>) -> Self;
}
