// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{ActorPath, ActorRef, Error, Message, Payload};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire form of a message sent to another service.
///
/// ```json
/// {"messageType":"PLAY","payload":{"track":"t1"},"correlationId":"...",
///  "senderPath":"rooms/room-1","targetPath":"djactor/dj-1"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEnvelope {
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Written as `null` when there is no sender.
    #[serde(default)]
    pub sender_path: Option<String>,
    pub target_path: String,
}

impl RemoteEnvelope {
    /// Wraps an outbound message. The sender is the explicit reference when
    /// given, else the path recorded in the message.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the payload is a local value.
    pub fn wrap(
        target: &ActorPath,
        message: &Message,
        sender: Option<&ActorRef>,
    ) -> Result<Self, Error> {
        let payload = match message.payload() {
            Payload::Json(value) => value.clone(),
            Payload::Local(_) => {
                return Err(Error::Serialization(format!(
                    "local payload of {} cannot be sent to {}",
                    message.message_type(),
                    target
                )));
            }
        };
        let sender_path = sender
            .map(|sender| sender.path().to_string())
            .or_else(|| message.sender_path().map(str::to_owned));
        Ok(Self {
            message_type: message.message_type().to_owned(),
            payload,
            correlation_id: Some(message.correlation_id().to_owned()),
            sender_path,
            target_path: target.to_string(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// # Errors
    ///
    /// Returns `Error::Serialization` on malformed JSON or missing required
    /// fields, `Error::InvalidMessage` if the message type is blank.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let envelope: RemoteEnvelope = serde_json::from_slice(bytes)?;
        if envelope.message_type.trim().is_empty() {
            return Err(Error::InvalidMessage(
                "message type cannot be blank".to_owned(),
            ));
        }
        Ok(envelope)
    }

    pub fn target(&self) -> ActorPath {
        ActorPath::from(&self.target_path)
    }

    /// Sender reference seen by the receiving actor.
    pub fn sender(&self) -> Option<ActorRef> {
        self.sender_path
            .as_ref()
            .map(|path| ActorRef::Remote(ActorPath::from(path)))
    }

    /// Rebuilds the message. A missing correlation id is regenerated.
    pub fn into_message(self) -> Result<Message, Error> {
        Message::new(
            self.message_type,
            Payload::Json(self.payload),
            self.correlation_id,
            self.sender_path,
        )
    }
}
