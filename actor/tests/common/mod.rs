// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

// Shared helpers for the integration tests.

#![allow(dead_code)]

use actor::{
    Actor, ActorContext, ActorRef, ActorSystem, Error, Message, SystemConfig,
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use std::time::Duration;

pub type Received = (Message, Option<ActorRef>);

/// Actor forwarding every message, with its sender, to the test.
pub struct Recorder {
    forward: mpsc::UnboundedSender<Received>,
}

impl Recorder {
    pub fn new(forward: mpsc::UnboundedSender<Received>) -> Self {
        Self { forward }
    }
}

#[async_trait]
impl Actor for Recorder {
    async fn on_receive(
        &mut self,
        message: &Message,
        ctx: &mut ActorContext,
    ) -> Result<(), Error> {
        let _ = self.forward.send((message.clone(), ctx.sender().cloned()));
        Ok(())
    }
}

/// Creates a recorder actor named `name` and the receiver of what it sees.
pub async fn recorder(
    system: &ActorSystem,
    name: &str,
) -> (ActorRef, mpsc::UnboundedReceiver<Received>) {
    let (forward, receiver) = mpsc::unbounded_channel();
    let factory = move |_: &str| Recorder::new(forward.clone());
    let recorder = system.actor_of(&factory, name).await.unwrap();
    (recorder, receiver)
}

/// Actor replying `ECHO_REPLY` with the same payload to whoever sent.
pub struct Echo;

#[async_trait]
impl Actor for Echo {
    async fn on_receive(
        &mut self,
        message: &Message,
        ctx: &mut ActorContext,
    ) -> Result<(), Error> {
        let reply =
            Message::new("ECHO_REPLY", message.payload().clone(), None, None)?;
        ctx.reply(reply).await;
        Ok(())
    }
}

/// Prints runtime logs selected by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Local runtime with a short poll interval.
pub fn system(service: &str) -> ActorSystem {
    ActorSystem::create(config(service)).unwrap()
}

pub fn config(service: &str) -> SystemConfig {
    init_tracing();
    SystemConfig::new(service)
        .with_poll_interval(Duration::from_millis(20))
        .with_shutdown_timeout(Duration::from_secs(2))
}

/// Next message, failing the test after two seconds.
pub async fn next(receiver: &mut mpsc::UnboundedReceiver<Received>) -> Received {
    tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

/// True if nothing arrives within `wait`.
pub async fn nothing_within<T>(
    receiver: &mut mpsc::UnboundedReceiver<T>,
    wait: Duration,
) -> bool {
    tokio::time::timeout(wait, receiver.recv()).await.is_err()
}

/// Polls `condition` until it holds or two seconds elapse.
pub async fn eventually<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
