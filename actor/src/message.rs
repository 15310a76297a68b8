// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Messages
//!
//! A [`Message`] is the immutable unit exchanged between actors: a type tag,
//! a payload, a correlation id and the optional path of the sender. Payloads
//! are JSON values so they can cross the broker unchanged; in-process
//! exchanges may also carry arbitrary Rust values (for instance a
//! [`ReplyTo`] slot) which never leave the service.
//!

use crate::{ActorRef, Error};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use std::{
    any::Any,
    fmt::{self, Debug, Display, Formatter},
    sync::{Arc, Mutex},
};

/// Body of a message.
#[derive(Clone)]
pub enum Payload {
    /// JSON payload, allowed on the wire.
    Json(Value),
    /// In-process value. Sending it to a remote actor fails.
    Local(Arc<dyn Any + Send + Sync>),
}

impl Payload {
    /// Returns the JSON value, if this payload has one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Local(_) => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Payload::Local(_))
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(value) => write!(f, "Json({})", value),
            Payload::Local(_) => write!(f, "Local(..)"),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Immutable envelope exchanged between actors.
///
/// Every constructor call yields a new logical message: unless a correlation
/// id is supplied, a fresh UUID v4 is generated.
#[derive(Clone, Debug)]
pub struct Message {
    message_type: String,
    payload: Payload,
    correlation_id: String,
    sender_path: Option<String>,
}

impl Message {
    /// Builds a message from its parts.
    ///
    /// A missing or blank `correlation_id` is replaced by a new UUID.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMessage` if `message_type` is blank.
    pub fn new(
        message_type: impl Into<String>,
        payload: Payload,
        correlation_id: Option<String>,
        sender_path: Option<String>,
    ) -> Result<Self, Error> {
        let message_type = message_type.into();
        if message_type.trim().is_empty() {
            return Err(Error::InvalidMessage(
                "message type cannot be blank".to_owned(),
            ));
        }
        let correlation_id = correlation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(Self {
            message_type,
            payload,
            correlation_id,
            sender_path,
        })
    }

    /// Message with a JSON payload.
    pub fn of<P: Serialize>(
        message_type: &str,
        payload: P,
    ) -> Result<Self, Error> {
        let value = serde_json::to_value(payload)?;
        Self::new(message_type, Payload::Json(value), None, None)
    }

    /// Message with a JSON payload that records the sender's path.
    pub fn from_sender<P: Serialize>(
        message_type: &str,
        payload: P,
        sender: &ActorRef,
    ) -> Result<Self, Error> {
        let value = serde_json::to_value(payload)?;
        Self::new(
            message_type,
            Payload::Json(value),
            None,
            Some(sender.path().to_string()),
        )
    }

    /// Message with a `null` payload.
    pub fn empty(message_type: &str) -> Result<Self, Error> {
        Self::new(message_type, Payload::Json(Value::Null), None, None)
    }

    /// Message carrying an in-process value.
    pub fn local<T: Any + Send + Sync>(
        message_type: &str,
        value: T,
    ) -> Result<Self, Error> {
        Self::new(message_type, Payload::Local(Arc::new(value)), None, None)
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn sender_path(&self) -> Option<&str> {
        self.sender_path.as_deref()
    }

    /// Decodes the JSON payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the payload is local or does not
    /// match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match &self.payload {
            Payload::Json(value) => Ok(T::deserialize(value)?),
            Payload::Local(_) => Err(Error::Serialization(format!(
                "payload of {} is not JSON",
                self.message_type
            ))),
        }
    }

    /// Borrows the in-process payload as `T`.
    pub fn local_payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        match &self.payload {
            Payload::Local(value) => value.downcast_ref::<T>(),
            Payload::Json(_) => None,
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message{{type='{}', correlationId='{}'}}",
            self.message_type, self.correlation_id
        )
    }
}

/// One-shot reply slot passed as a local payload.
///
/// The asking side keeps the receiver and sends `Message::local(.., reply)`;
/// the handling actor answers with [`ReplyTo::reply`]. Only the first reply is
/// delivered.
pub struct ReplyTo<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T: Send + 'static> ReplyTo<T> {
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                slot: Mutex::new(Some(sender)),
            },
            receiver,
        )
    }

    /// Completes the reply. Returns `false` if it was already completed or
    /// the asking side has gone away.
    pub fn reply(&self, value: T) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match sender {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }
}
