// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Remote bridge
//!
//! Connects one runtime to the broker. On connect it declares the shared
//! topic exchange and the service's durable inbound queue, binds the queue
//! with `<service>.*` and starts a listener task. The listener decodes every
//! delivery and hands it to the local dispatcher; deliveries that cannot be
//! decoded are logged and dropped, never redelivered.
//!

use super::{Broker, Deliveries, RemoteEnvelope};
use crate::{
    ActorPath, ActorRef, Error, Message, config::RemoteConfig,
    dispatcher::LocalDispatcher,
};

use futures::StreamExt;
use tokio::{select, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use std::sync::{Arc, Mutex};

/// Broker-side half of an actor runtime.
pub struct RemoteBridge {
    service: String,
    exchange: String,
    broker: Arc<dyn Broker>,
    token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteBridge {
    /// Declares the topology of `service` and starts listening.
    ///
    /// # Errors
    ///
    /// Returns `Error::BrokerSetup` if any declaration fails or the queue
    /// cannot be consumed.
    pub async fn connect(
        service: &str,
        config: &RemoteConfig,
        broker: Arc<dyn Broker>,
        dispatcher: LocalDispatcher,
        token: CancellationToken,
    ) -> Result<Self, Error> {
        let queue = config.queue_for(service);
        let setup = async {
            broker.declare_exchange(&config.exchange).await?;
            broker.declare_queue(&queue, true).await?;
            broker
                .bind(&queue, &config.exchange, &config.binding_for(service))
                .await?;
            broker.consume(&queue).await
        };
        let deliveries = setup.await.map_err(|e| {
            error!("Failed to set up remote bridge for {}: {}", service, e);
            Error::BrokerSetup(e.to_string())
        })?;
        info!(
            "Remote bridge for service {} listening on queue {}",
            service, queue
        );

        let listener = tokio::spawn(
            listen(deliveries, dispatcher, token.clone(), queue)
                .in_current_span(),
        );

        Ok(Self {
            service: service.to_owned(),
            exchange: config.exchange.clone(),
            broker,
            token,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Publishes a message for an actor of another service.
    ///
    /// # Errors
    ///
    /// `Error::InvalidPath` unless the target is exactly `service/name`
    /// (checked before touching the broker), `Error::Serialization` for local
    /// payloads, `Error::Broker` if the publish fails.
    pub async fn send(
        &self,
        target: &ActorPath,
        message: &Message,
        sender: Option<&ActorRef>,
    ) -> Result<(), Error> {
        let routing_key = target.routing_key()?;
        let body = RemoteEnvelope::wrap(target, message, sender)?.to_bytes()?;
        self.broker
            .publish(&self.exchange, &routing_key, body)
            .await?;
        info!(
            "Sent {} from {} to remote actor {}",
            message, self.service, target
        );
        Ok(())
    }

    /// Stops the listener and waits for it to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|error| error.into_inner())
            .take();
        if let Some(listener) = listener {
            if let Err(error) = listener.await {
                error!("Remote listener of {} failed: {}", self.service, error);
            }
        }
    }
}

async fn listen(
    mut deliveries: Deliveries,
    dispatcher: LocalDispatcher,
    token: CancellationToken,
    queue: String,
) {
    loop {
        let body = select! {
            biased;
            _ = token.cancelled() => break,
            body = deliveries.next() => match body {
                Some(body) => body,
                None => {
                    warn!("Deliveries of queue {} ended", queue);
                    break;
                }
            },
        };
        match decode(&body) {
            Ok((target, message, sender)) => {
                debug!("Received {} for {}", message, target);
                dispatcher.dispatch(&target, message, sender);
            }
            Err(error) => {
                error!("Failed to process remote message from {}: {}", queue, error);
            }
        }
    }
    debug!("Remote listener stopped for queue {}", queue);
}

fn decode(body: &[u8]) -> Result<(ActorPath, Message, Option<ActorRef>), Error> {
    let envelope = RemoteEnvelope::from_bytes(body)?;
    let target = envelope.target();
    let sender = envelope.sender();
    Ok((target, envelope.into_message()?, sender))
}
