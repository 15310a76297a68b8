// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!
//! Every fallible operation of the runtime returns this error type. Delivery
//! drops are deliberately absent: a message sent to an unknown actor, or an
//! inbound envelope that cannot be decoded, is logged and discarded.
//!

use crate::ActorPath;

use thiserror::Error;

/// Error type for the actor system.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// An actor is already registered under this path.
    #[error("Actor {0} already exists.")]
    Exists(ActorPath),
    /// No local actor is registered under this path.
    #[error("Actor {0} not found.")]
    NotFound(ActorPath),
    /// The actor could not be instantiated or its `pre_start` hook failed.
    #[error("Failed to create actor {0}: {1}")]
    Create(ActorPath, Box<Error>),
    /// The path does not have the expected `service/name` shape.
    #[error("Invalid actor path: {0}")]
    InvalidPath(String),
    /// The message could not be built.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    /// A handler panicked while processing a message or running a hook.
    #[error("Actor panicked: {0}")]
    Panic(String),
    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The broker rejected a single publish or consume operation.
    #[error("Broker error: {0}")]
    Broker(String),
    /// The broker topology could not be declared.
    #[error("Broker setup failed: {0}")]
    BrokerSetup(String),
    /// An error occurred while sending a message to an actor mailbox.
    #[error("An error occurred while sending a message to actor: {0}.")]
    Send(String),
    /// No factory is registered for this actor type.
    #[error("Unknown actor type: {0}")]
    UnknownActorType(String),
    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The actor system is shut down and accepts no new work.
    #[error("The actor system is stopped.")]
    Stopped,
    /// Error that does not compromise the operation of the system.
    #[error("Error: {0}")]
    Functional(String),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}
