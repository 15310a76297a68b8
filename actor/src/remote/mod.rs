// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Remote delivery
//!
//! Messages addressed to actors of other services travel through a topic
//! exchange as JSON [`RemoteEnvelope`]s. Each service owns one durable queue
//! bound with `<service>.*`; the routing key of a message is
//! `<target service>.<target name>`.
//!

mod bridge;
mod broker;
mod envelope;
mod memory;

pub use bridge::RemoteBridge;
pub use broker::{Broker, Deliveries};
pub use envelope::RemoteEnvelope;
pub use memory::InMemoryBroker;
