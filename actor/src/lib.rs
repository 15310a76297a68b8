// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor Bridge
//!
//! A lightweight actor runtime for services that must exchange messages both
//! in process and across service boundaries. Every service runs one
//! [`ActorSystem`]; actors are addressed as `<service>/<name>` and a `tell`
//! is transparently delivered either to a local mailbox or, through a topic
//! exchange broker, to the runtime of another service.
//!
//! ## Overview
//!
//! An actor is a unit of private state plus a message handler. The runtime
//! guarantees that:
//!
//! - messages from one producer to one actor are handled in send order;
//! - an actor never handles two messages at the same time;
//! - a failing handler never takes its worker down, the actor decides what
//!   happens next through a [`SupervisionDirective`].
//!
//! Delivery is fire and forget. Sending to an unknown actor, or receiving an
//! envelope that cannot be decoded, is logged and the message is dropped.
//! Callers that need an answer build it into their protocol: the target
//! replies to the sender, or an in-process caller passes a [`ReplyTo`] slot.
//!
//! ## Components
//!
//! - [`ActorSystem`]: naming, creation, selection and routing for one service.
//! - [`LocalDispatcher`]: registry of local actors, one mailbox and one
//!   message pump per actor.
//! - [`RemoteBridge`]: JSON envelopes over a [`Broker`]; each service owns a
//!   durable `<service>.messages` queue bound with `<service>.*`.
//! - [`InMemoryBroker`]: topic broker living in process memory, so several
//!   services can be simulated in one test.
//!
//! ## Getting Started
//!
//! ```ignore
//! use actor::{Actor, ActorContext, ActorSystem, Error, Message, SystemConfig};
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Actor for Echo {
//!     async fn on_receive(
//!         &mut self,
//!         message: &Message,
//!         ctx: &mut ActorContext,
//!     ) -> Result<(), Error> {
//!         let reply = Message::new(
//!             "ECHO_REPLY",
//!             message.payload().clone(),
//!             None,
//!             None,
//!         )?;
//!         ctx.reply(reply).await;
//!         Ok(())
//!     }
//! }
//!
//! let system = ActorSystem::create(SystemConfig::new("echoes"))?;
//! let echo = system.actor_of(&|_: &str| Echo, "echo").await?;
//! system.tell(&echo, Message::of("PING", "hi")?, None).await;
//! system.close().await;
//! ```
//!
//! ## Remote delivery
//!
//! ```ignore
//! let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
//! let rooms = ActorSystem::connect(SystemConfig::new("rooms"), broker.clone()).await?;
//! let dj = ActorSystem::connect(SystemConfig::new("djactor"), broker).await?;
//!
//! // Any path of another service resolves to a remote reference.
//! let target = rooms.actor_selection("djactor/dj-1")?;
//! rooms.tell(&target, Message::of("PLAY", json!({"track": "t1"}))?, None).await;
//! ```
//!

mod actor;
mod config;
mod dispatcher;
mod error;
mod mailbox;
mod message;
mod path;
mod remote;
mod supervision;
mod system;

pub use actor::{Actor, ActorContext, ActorFactory, ActorRef};
pub use config::{RemoteConfig, SystemConfig};
pub use dispatcher::LocalDispatcher;
pub use error::Error;
pub use mailbox::{Envelope, MailboxReceiver, MailboxSender, Poll, mailbox};
pub use message::{Message, Payload, ReplyTo};
pub use path::ActorPath;
pub use remote::{
    Broker, Deliveries, InMemoryBroker, RemoteBridge, RemoteEnvelope,
};
pub use supervision::SupervisionDirective;
pub use system::ActorSystem;
