// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! In-process topic broker.
//!
//! Several runtimes sharing one [`InMemoryBroker`] behave like services
//! connected to the same message broker, which is how cross-service delivery
//! is exercised without any network.
//!

use super::broker::{Broker, Deliveries};
use crate::Error;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use std::sync::Arc;

struct Binding {
    queue: String,
    pattern: String,
}

struct Queue {
    sender: mpsc::UnboundedSender<Vec<u8>>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

#[derive(Default)]
struct Inner {
    exchanges: DashMap<String, Vec<Binding>>,
    queues: DashMap<String, Queue>,
}

/// Topic exchange broker living in process memory.
///
/// Cloning yields another handle to the same broker. Queues are always kept
/// in memory, whether declared durable or not, for the broker's lifetime.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(&self, exchange: &str) -> Result<(), Error> {
        self.inner.exchanges.entry(exchange.to_owned()).or_default();
        debug!("Exchange declared: {}", exchange);
        Ok(())
    }

    async fn declare_queue(
        &self,
        queue: &str,
        durable: bool,
    ) -> Result<(), Error> {
        self.inner.queues.entry(queue.to_owned()).or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            Queue {
                sender,
                receiver: Arc::new(Mutex::new(receiver)),
            }
        });
        debug!("Queue declared: {} (durable: {})", queue, durable);
        Ok(())
    }

    async fn bind(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), Error> {
        if !self.inner.queues.contains_key(queue) {
            return Err(Error::Broker(format!("queue {} not declared", queue)));
        }
        let mut bindings =
            self.inner.exchanges.get_mut(exchange).ok_or_else(|| {
                Error::Broker(format!("exchange {} not declared", exchange))
            })?;
        let exists = bindings
            .iter()
            .any(|binding| binding.queue == queue && binding.pattern == pattern);
        if !exists {
            bindings.push(Binding {
                queue: queue.to_owned(),
                pattern: pattern.to_owned(),
            });
        }
        debug!("Queue {} bound to {} with {}", queue, exchange, pattern);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> Result<(), Error> {
        let mut targets: Vec<String> = {
            let bindings = self.inner.exchanges.get(exchange).ok_or_else(|| {
                Error::Broker(format!("exchange {} not declared", exchange))
            })?;
            bindings
                .iter()
                .filter(|binding| topic_matches(&binding.pattern, routing_key))
                .map(|binding| binding.queue.clone())
                .collect()
        };
        targets.sort();
        targets.dedup();

        if targets.is_empty() {
            trace!("Unroutable message discarded: {}", routing_key);
        }
        for queue in targets {
            if let Some(queue) = self.inner.queues.get(&queue) {
                let _ = queue.sender.send(body.clone());
            }
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Deliveries, Error> {
        let receiver = self
            .inner
            .queues
            .get(queue)
            .map(|queue| queue.receiver.clone())
            .ok_or_else(|| {
                Error::Broker(format!("queue {} not declared", queue))
            })?;
        let deliveries = futures::stream::unfold(receiver, |receiver| async move {
            let body = receiver.lock().await.recv().await;
            body.map(|body| (body, receiver))
        });
        Ok(Box::pin(deliveries))
    }
}

/// AMQP topic matching.
pub(crate) fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    words_match(&pattern, &key)
}

fn words_match(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            words_match(rest, key)
                || (!key.is_empty() && words_match(pattern, &key[1..]))
        }
        (Some((&"*", rest)), Some((_, key_rest))) => words_match(rest, key_rest),
        (Some((word, rest)), Some((next, key_rest))) => {
            word == next && words_match(rest, key_rest)
        }
        _ => false,
    }
}
