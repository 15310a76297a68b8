// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor contract
//!
//! This module defines what tenants implement ([`Actor`]), how actors are
//! addressed ([`ActorRef`]), what they see while running ([`ActorContext`])
//! and how the runtime builds them from a name ([`ActorFactory`]).
//!

use crate::{
    ActorPath, Error, Message, SupervisionDirective, system::ActorSystem,
};

use async_trait::async_trait;
use tracing::debug;

use std::{
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

/// Unit of business logic driven by the runtime.
///
/// The runtime never calls two methods of the same actor concurrently: every
/// call is made by the actor's own message pump (`pre_start` is made by the
/// creator, before the actor is visible to anybody else).
#[async_trait]
pub trait Actor: Send + 'static {
    /// Handles one message. The pump awaits the returned future to
    /// completion before dequeuing the next message.
    ///
    /// An `Err` is passed to [`Actor::on_failure`] together with the message.
    async fn on_receive(
        &mut self,
        message: &Message,
        ctx: &mut ActorContext,
    ) -> Result<(), Error>;

    /// Called before the actor is registered. An error aborts the creation.
    async fn pre_start(&mut self, _ctx: &mut ActorContext) -> Result<(), Error> {
        Ok(())
    }

    /// Called once the actor is unregistered, and on restart. Errors are
    /// logged and never propagated.
    async fn post_stop(&mut self, _ctx: &mut ActorContext) -> Result<(), Error> {
        Ok(())
    }

    /// Decides how the pump reacts to a failed `on_receive`.
    fn on_failure(
        &mut self,
        cause: &Error,
        _message: &Message,
    ) -> SupervisionDirective {
        debug!("Handling failure: {:?}", cause);
        SupervisionDirective::default()
    }
}

/// Builds actor instances from the name they are created under.
///
/// Construction must not have side effects besides storing the name; setup
/// belongs in `pre_start`.
pub trait ActorFactory: Send + Sync {
    fn create(&self, name: &str) -> Result<Box<dyn Actor>, Error>;
}

impl<F, A> ActorFactory for F
where
    F: Fn(&str) -> A + Send + Sync,
    A: Actor,
{
    fn create(&self, name: &str) -> Result<Box<dyn Actor>, Error> {
        Ok(Box::new(self(name)))
    }
}

/// Handle to an actor, local or hosted by another service.
///
/// A reference is only a capability to send: it does not own the actor.
/// Two references with the same path are equal and interchangeable.
#[derive(Clone, Debug)]
pub enum ActorRef {
    /// Actor registered in this service.
    Local(ActorPath),
    /// Actor reached through the broker.
    Remote(ActorPath),
}

impl ActorRef {
    pub fn path(&self) -> &ActorPath {
        match self {
            ActorRef::Local(path) | ActorRef::Remote(path) => path,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ActorRef::Local(_))
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

impl Display for ActorRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ActorRef::Local(path) => write!(f, "LocalActorRef({})", path),
            ActorRef::Remote(path) => write!(f, "RemoteActorRef({})", path),
        }
    }
}

/// Execution context handed to every actor invocation.
///
/// The sender is bound by the message pump for the duration of one
/// `on_receive` call and cleared right after, whatever the outcome.
#[derive(Clone)]
pub struct ActorContext {
    /// Reference to the actor owning this context.
    myself: ActorRef,
    /// Sender of the message being handled.
    sender: Option<ActorRef>,
    /// Owning runtime.
    system: ActorSystem,
}

impl ActorContext {
    pub(crate) fn new(myself: ActorRef, system: ActorSystem) -> Self {
        Self {
            myself,
            sender: None,
            system,
        }
    }

    /// Sends a message with this actor as the sender.
    pub async fn tell(&self, to: &ActorRef, message: Message) {
        self.system.tell(to, message, Some(&self.myself)).await;
    }

    /// Sends a message back to the sender of the current message. Returns
    /// `false` when there is nobody to reply to.
    pub async fn reply(&self, message: Message) -> bool {
        match &self.sender {
            Some(sender) => {
                self.system.tell(sender, message, Some(&self.myself)).await;
                true
            }
            None => false,
        }
    }

    /// Reference to this actor.
    pub fn self_ref(&self) -> &ActorRef {
        &self.myself
    }

    /// Sender of the message currently being handled, if any.
    pub fn sender(&self) -> Option<&ActorRef> {
        self.sender.as_ref()
    }

    /// Creates another actor in the same runtime.
    pub async fn actor_of(
        &self,
        factory: &dyn ActorFactory,
        name: &str,
    ) -> Result<ActorRef, Error> {
        self.system.actor_of(factory, name).await
    }

    /// Creates an actor from a registered type identifier.
    pub async fn actor_of_type(
        &self,
        actor_type: &str,
        name: &str,
    ) -> Result<ActorRef, Error> {
        self.system.actor_of_type(actor_type, name).await
    }

    /// Resolves a path to a local or remote reference.
    pub fn actor_selection(&self, path: &str) -> Result<ActorRef, Error> {
        self.system.actor_selection(path)
    }

    /// Stops a local actor. Remote references are ignored.
    pub fn stop(&self, actor: &ActorRef) {
        self.system.stop(actor);
    }

    /// Owning runtime.
    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    pub(crate) fn set_sender(&mut self, sender: Option<ActorRef>) {
        self.sender = sender;
    }

    pub(crate) fn clear_sender(&mut self) {
        self.sender = None;
    }
}
