//! ActorHost: server-side runtime for virtual actors.
//!
//! The host owns this node's activations. Each activation is a local task
//! draining its own mailbox, so calls on one key run one at a time while
//! different keys proceed independently.
//!
//! # Orleans Model
//!
//! Turn-based concurrency: one message at a time per activation. An
//! activation is created on the first message for its key, claims the key in
//! the directory, loads its state, processes messages until it goes idle or
//! is told to stop, then flushes and unregisters.
//!
//! ```text
//!           first message
//! Unloaded ───────────────▶ Activating ──claim + on_activate──▶ Active
//!    ▲                          │ failure / lost race             │ idle, explicit,
//!    │                          ▼                                 │ shutdown, moved
//!    └──────────────────── Deactivating ◀─────────────────────────┘
//!                     flush + unregister
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let host = Rc::new(ActorHost::new(address, &cluster, &config));
//! host.register::<UrlRecordWorker>();
//! let reply = host.handle(message).await?;
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::actors::error::ActorError;
use crate::actors::infrastructure::{ActorDirectory, MembershipProvider, PlacementStrategy};
use crate::actors::lifecycle::{ActivationState, DeactivationReason};
use crate::actors::node::{ClusterConfig, NodeConfig};
use crate::actors::state::DurableRecordStore;
use crate::actors::types::{
    ActivationId, ActorAddress, ActorFault, ActorId, ActorMessage, ActorType,
};
use crate::NetworkAddress;

/// Context provided to actor hooks and methods.
pub struct ActorContext {
    /// The identity of the actor being invoked.
    pub id: ActorId,
    /// The activation currently serving this identity.
    pub activation_id: ActivationId,
    store: Rc<dyn DurableRecordStore>,
}

impl ActorContext {
    /// The durable store for loading and persisting actor state.
    pub fn store(&self) -> &Rc<dyn DurableRecordStore> {
        &self.store
    }
}

/// Trait implemented by each actor type.
///
/// The host creates an instance via `Default::default()` when a key is
/// activated, calls [`on_activate`](Self::on_activate), then routes every
/// message through [`dispatch`](Self::dispatch) until deactivation.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Counter { value: i64 }
///
/// #[async_trait::async_trait(?Send)]
/// impl ActorHandler for Counter {
///     fn actor_type() -> ActorType { ActorType(0xC0_FFEE) }
///
///     async fn dispatch(&mut self, _ctx: &ActorContext, method: u32, body: &[u8])
///         -> Result<Vec<u8>, ActorError>
///     {
///         match method {
///             1 => { self.value += serde_json::from_slice::<i64>(body)?; Ok(serde_json::to_vec(&self.value)?) }
///             _ => Err(ActorError::UnknownMethod(method)),
///         }
///     }
/// }
/// ```
#[async_trait::async_trait(?Send)]
pub trait ActorHandler: Default + 'static {
    /// The actor type ID.
    fn actor_type() -> ActorType;

    /// Where activations of this type live.
    fn placement_strategy() -> PlacementStrategy {
        PlacementStrategy::Hashed
    }

    /// Called once after the activation claimed its key, before any message.
    /// Load prior state here.
    async fn on_activate(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    /// Called once before the activation is discarded. Flush dirty state
    /// here.
    async fn on_deactivate(
        &mut self,
        _ctx: &ActorContext,
        _reason: DeactivationReason,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    /// Dispatch a method call.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Context with the actor's identity and the state store
    /// * `method` - Method discriminant (1, 2, 3, …)
    /// * `body` - Serialized method-specific request body
    async fn dispatch(
        &mut self,
        ctx: &ActorContext,
        method: u32,
        body: &[u8],
    ) -> Result<Vec<u8>, ActorError>;
}

struct Envelope {
    method: u32,
    body: Vec<u8>,
    reply: oneshot::Sender<Result<Vec<u8>, ActorError>>,
}

enum Control {
    Deactivate {
        reason: DeactivationReason,
        done: oneshot::Sender<()>,
    },
}

/// Host-side handle on one running activation.
struct ActivationSlot {
    activation_id: ActivationId,
    state: Rc<Cell<ActivationState>>,
    mailbox: mpsc::UnboundedSender<Envelope>,
    control: mpsc::UnboundedSender<Control>,
}

/// Type-erases actor handler types inside the host.
trait ActivationFactory {
    fn placement(&self) -> PlacementStrategy;

    fn spawn(
        &self,
        host: Rc<ActorHost>,
        ctx: ActorContext,
        state: Rc<Cell<ActivationState>>,
        mailbox: mpsc::UnboundedReceiver<Envelope>,
        control: mpsc::UnboundedReceiver<Control>,
    );
}

struct TypedFactory<H: ActorHandler> {
    _marker: PhantomData<H>,
}

impl<H: ActorHandler> ActivationFactory for TypedFactory<H> {
    fn placement(&self) -> PlacementStrategy {
        H::placement_strategy()
    }

    fn spawn(
        &self,
        host: Rc<ActorHost>,
        ctx: ActorContext,
        state: Rc<Cell<ActivationState>>,
        mailbox: mpsc::UnboundedReceiver<Envelope>,
        control: mpsc::UnboundedReceiver<Control>,
    ) {
        tokio::task::spawn_local(run_activation::<H>(host, ctx, state, mailbox, control));
    }
}

/// Server-side runtime for virtual actors on one node.
pub struct ActorHost {
    local_address: NetworkAddress,
    directory: Rc<dyn ActorDirectory>,
    membership: Rc<dyn MembershipProvider>,
    store: Rc<dyn DurableRecordStore>,
    idle_timeout: Duration,
    transition_timeout: Duration,
    registry: RefCell<HashMap<ActorType, Rc<dyn ActivationFactory>>>,
    activations: RefCell<HashMap<ActorId, ActivationSlot>>,
    accepting: Cell<bool>,
}

impl ActorHost {
    /// Create a host for the node at `local_address`.
    pub fn new(local_address: NetworkAddress, cluster: &ClusterConfig, config: &NodeConfig) -> Self {
        Self {
            local_address,
            directory: cluster.directory().clone(),
            membership: cluster.membership().clone(),
            store: config.state_store(),
            idle_timeout: config.idle_timeout(),
            transition_timeout: config.transition_timeout(),
            registry: RefCell::new(HashMap::new()),
            activations: RefCell::new(HashMap::new()),
            accepting: Cell::new(true),
        }
    }

    /// Register an actor type. Later registrations of the same type win.
    pub fn register<H: ActorHandler>(&self) {
        tracing::debug!(actor_type = %H::actor_type(), "registering actor type");
        self.registry.borrow_mut().insert(
            H::actor_type(),
            Rc::new(TypedFactory::<H> {
                _marker: PhantomData,
            }),
        );
    }

    /// Placement strategy of a registered actor type.
    pub fn placement_for(&self, actor_type: ActorType) -> Option<PlacementStrategy> {
        self.registry
            .borrow()
            .get(&actor_type)
            .map(|factory| factory.placement())
    }

    /// This node's address.
    pub fn local_address(&self) -> &NetworkAddress {
        &self.local_address
    }

    /// Lifecycle state of the activation for `id`, `Unloaded` if none.
    pub fn activation_state(&self, id: &ActorId) -> ActivationState {
        self.activations
            .borrow()
            .get(id)
            .map_or(ActivationState::Unloaded, |slot| slot.state.get())
    }

    /// Number of activations currently held.
    pub fn activation_count(&self) -> usize {
        self.activations.borrow().len()
    }

    /// Identities of all activations currently held.
    pub fn activation_ids(&self) -> Vec<ActorId> {
        self.activations.borrow().keys().cloned().collect()
    }

    /// Stop accepting new messages.
    pub fn close(&self) {
        self.accepting.set(false);
    }

    /// Deliver a message to the activation for its target, creating the
    /// activation if needed, and wait for the reply.
    pub async fn handle(self: &Rc<Self>, message: ActorMessage) -> Result<Vec<u8>, ActorError> {
        if !self.accepting.get() {
            return Err(ActorError::Unavailable(format!(
                "node {} is shutting down",
                self.local_address
            )));
        }
        let target = message.target;
        let (reply, response) = oneshot::channel();
        self.enqueue(
            target.clone(),
            Envelope {
                method: message.method,
                body: message.body,
                reply,
            },
        )?;

        response
            .await
            .map_err(|_| ActorError::Retry(format!("activation of {target} went away")))?
    }

    fn enqueue(self: &Rc<Self>, id: ActorId, envelope: Envelope) -> Result<(), ActorError> {
        let mut activations = self.activations.borrow_mut();
        if let Some(slot) = activations.get(&id) {
            if slot.state.get() == ActivationState::Deactivating {
                return Err(ActorError::Retry(format!("{id} is deactivating")));
            }
            return slot
                .mailbox
                .send(envelope)
                .map_err(|_| ActorError::Retry(format!("{id} is deactivating")));
        }

        let factory = self
            .registry
            .borrow()
            .get(&id.actor_type)
            .cloned()
            .ok_or(ActorError::UnregisteredType(id.actor_type))?;

        let activation_id = ActivationId::random();
        let state = Rc::new(Cell::new(ActivationState::Unloaded));
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        mailbox_tx
            .send(envelope)
            .map_err(|_| ActorError::Retry(format!("{id} mailbox closed")))?;

        let ctx = ActorContext {
            id: id.clone(),
            activation_id,
            store: self.store.clone(),
        };
        factory.spawn(self.clone(), ctx, state.clone(), mailbox_rx, control_rx);
        activations.insert(
            id,
            ActivationSlot {
                activation_id,
                state,
                mailbox: mailbox_tx,
                control: control_tx,
            },
        );
        Ok(())
    }

    /// Deactivate the activation for `id`, waiting until it has flushed and
    /// unregistered. Returns `false` if there was nothing to deactivate.
    pub async fn deactivate(&self, id: &ActorId, reason: DeactivationReason) -> bool {
        let control = match self.activations.borrow().get(id) {
            Some(slot) => slot.control.clone(),
            None => return false,
        };
        let (done, finished) = oneshot::channel();
        if control.send(Control::Deactivate { reason, done }).is_err() {
            return false;
        }
        finished.await.is_ok()
    }

    /// Deactivate every activation on this node.
    pub async fn deactivate_all(&self, reason: DeactivationReason) -> usize {
        let mut count = 0;
        for id in self.activation_ids() {
            if self.deactivate(&id, reason).await {
                count += 1;
            }
        }
        count
    }

    fn remove_slot(&self, id: &ActorId, activation_id: ActivationId) {
        let mut activations = self.activations.borrow_mut();
        if activations
            .get(id)
            .is_some_and(|slot| slot.activation_id == activation_id)
        {
            activations.remove(id);
        }
    }

    /// Claim `address` in the directory, replacing entries left behind by
    /// dead nodes or earlier activations on this node.
    async fn claim(&self, address: &ActorAddress) -> Result<(), ActorError> {
        let current = self.directory.register(address.clone()).await?;
        if current.activation_id == address.activation_id {
            return Ok(());
        }

        let snapshot = self.membership.snapshot().await;
        if current.node != self.local_address && snapshot.is_active(&current.node) {
            return Err(ActorError::NotOwner {
                owner: current.node,
            });
        }

        tracing::warn!(
            actor = %address.actor_id,
            stale_node = %current.node,
            stale_activation = %current.activation_id,
            "replacing stale directory entry"
        );
        self.directory.unregister(&current).await?;
        let current = self.directory.register(address.clone()).await?;
        if current.activation_id == address.activation_id {
            Ok(())
        } else {
            Err(ActorError::NotOwner {
                owner: current.node,
            })
        }
    }
}

/// Lifecycle of a single activation.
async fn run_activation<H: ActorHandler>(
    host: Rc<ActorHost>,
    ctx: ActorContext,
    state: Rc<Cell<ActivationState>>,
    mut mailbox: mpsc::UnboundedReceiver<Envelope>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let address = ActorAddress::new(
        ctx.id.clone(),
        host.local_address.clone(),
        ctx.activation_id,
    );
    let registered = H::placement_strategy() == PlacementStrategy::Hashed;
    let mut actor = H::default();

    state.set(ActivationState::Activating);
    tracing::debug!(actor = %ctx.id, activation = %ctx.activation_id, "activating");

    let activation = async {
        if registered {
            host.claim(&address).await?;
        }
        actor.on_activate(&ctx).await
    };
    let failure = match tokio::time::timeout(host.transition_timeout, activation).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(_) => Some(ActorError::Retry(format!(
            "activation of {} did not complete within {:?}",
            ctx.id, host.transition_timeout
        ))),
    };

    if let Some(error) = failure {
        let reason = match error {
            ActorError::NotOwner { .. } => DeactivationReason::ActivationRace,
            _ => DeactivationReason::ActivationFailed,
        };
        tracing::warn!(actor = %ctx.id, error = %error, ?reason, "activation failed");
        state.set(ActivationState::Deactivating);
        let fault = ActorFault::from(&error);
        mailbox.close();
        while let Ok(envelope) = mailbox.try_recv() {
            let _ = envelope.reply.send(Err(fault.clone().into()));
        }
        if registered && reason != DeactivationReason::ActivationRace {
            if let Err(e) = host.directory.unregister(&address).await {
                tracing::warn!(actor = %ctx.id, error = %e, "failed to unregister");
            }
        }
        host.remove_slot(&ctx.id, ctx.activation_id);
        state.set(ActivationState::Unloaded);
        return;
    }

    state.set(ActivationState::Active);
    tracing::info!(actor = %ctx.id, activation = %ctx.activation_id, "activated");

    let mut waiting = Vec::new();
    let reason = loop {
        tokio::select! {
            biased;
            Some(command) = control.recv() => match command {
                Control::Deactivate { reason, done } => {
                    waiting.push(done);
                    break reason;
                }
            },
            envelope = mailbox.recv() => match envelope {
                Some(envelope) => {
                    tracing::debug!(actor = %ctx.id, method = envelope.method, "dispatch");
                    let result = actor.dispatch(&ctx, envelope.method, &envelope.body).await;
                    let _ = envelope.reply.send(result);
                }
                None => break DeactivationReason::NodeShutdown,
            },
            _ = tokio::time::sleep(host.idle_timeout) => break DeactivationReason::IdleTimeout,
        }
    };

    state.set(ActivationState::Deactivating);
    tracing::info!(actor = %ctx.id, activation = %ctx.activation_id, ?reason, "deactivating");

    mailbox.close();
    while let Ok(envelope) = mailbox.try_recv() {
        let _ = envelope
            .reply
            .send(Err(ActorError::Retry(format!("{} is deactivating", ctx.id))));
    }

    match tokio::time::timeout(host.transition_timeout, actor.on_deactivate(&ctx, reason)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(actor = %ctx.id, error = %e, "deactivation hook failed"),
        Err(_) => tracing::error!(
            actor = %ctx.id,
            timeout = ?host.transition_timeout,
            "deactivation hook did not complete in time"
        ),
    }
    if registered {
        if let Err(e) = host.directory.unregister(&address).await {
            tracing::warn!(actor = %ctx.id, error = %e, "failed to unregister");
        }
    }

    host.remove_slot(&ctx.id, ctx.activation_id);
    state.set(ActivationState::Unloaded);

    control.close();
    while let Ok(Control::Deactivate { done, .. }) = control.try_recv() {
        waiting.push(done);
    }
    for done in waiting {
        let _ = done.send(());
    }
}
