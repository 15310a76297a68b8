// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Actor runtime with transparent local and cross-service delivery.
//! Re-exports the public API of the `actor` crate.

pub use actor::{
    Actor, ActorContext, ActorFactory, ActorPath, ActorRef, ActorSystem,
    Broker, Deliveries, Error as ActorError, InMemoryBroker, LocalDispatcher,
    Message, Payload, RemoteBridge, RemoteConfig, RemoteEnvelope, ReplyTo,
    SupervisionDirective, SystemConfig,
};
