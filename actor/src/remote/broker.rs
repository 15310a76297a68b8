// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::Error;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of message bodies delivered to a queue.
pub type Deliveries = BoxStream<'static, Vec<u8>>;

/// Minimal topic-exchange broker contract used by the remote bridge.
///
/// Declarations are idempotent. Routing keys and binding patterns are `.`
/// separated words; in patterns `*` matches exactly one word and `#` matches
/// zero or more.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declares a topic exchange.
    async fn declare_exchange(&self, exchange: &str) -> Result<(), Error>;

    /// Declares a queue. Durable queues keep messages until consumed.
    async fn declare_queue(&self, queue: &str, durable: bool)
    -> Result<(), Error>;

    /// Routes messages published to `exchange` whose key matches `pattern`
    /// into `queue`.
    async fn bind(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), Error>;

    /// Publishes a message. Messages no binding matches are discarded.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> Result<(), Error>;

    /// Starts consuming a queue, with automatic acknowledgement.
    async fn consume(&self, queue: &str) -> Result<Deliveries, Error>;
}
