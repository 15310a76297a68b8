// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Configuration
//!
//! Settings of one actor runtime, loadable from TOML. Every field has a
//! default, so an empty document is a valid configuration.
//!

use crate::Error;

use serde::{Deserialize, Serialize};
use tracing::debug;

use std::{path::Path, time::Duration};

/// Configuration of an [`ActorSystem`](crate::ActorSystem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Name of the service hosting the runtime. First segment of every local
    /// actor path.
    pub service_name: String,
    /// Upper bound, in milliseconds, of one mailbox wait of a message pump.
    pub poll_interval_ms: u64,
    /// Milliseconds shutdown waits for running pumps before aborting them.
    pub shutdown_timeout_ms: u64,
    /// Broker topology.
    pub remote: RemoteConfig,
}

/// Broker topology used by the remote bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Topic exchange shared by every service.
    pub exchange: String,
    /// Appended to the service name to form its inbound queue.
    pub queue_suffix: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            service_name: "default".to_owned(),
            poll_interval_ms: 250,
            shutdown_timeout_ms: 5_000,
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            exchange: "actor.exchange".to_owned(),
            queue_suffix: ".messages".to_owned(),
        }
    }
}

impl RemoteConfig {
    /// Inbound queue of `service`.
    pub fn queue_for(&self, service: &str) -> String {
        format!("{}{}", service, self.queue_suffix)
    }

    /// Binding pattern matching every actor of `service`.
    pub fn binding_for(&self, service: &str) -> String {
        format!("{}.*", service)
    }
}

impl SystemConfig {
    /// Default configuration for `service_name`.
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = remote;
        self
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the document is malformed or the service
    /// name is blank.
    pub fn from_toml_str(toml: &str) -> Result<Self, Error> {
        let config: SystemConfig = toml::from_str(toml)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks that the service name can be the first segment of actor paths
    /// and the first word of routing keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the name is blank or contains `/` or `.`.
    pub fn validate(&self) -> Result<(), Error> {
        if self.service_name.trim().is_empty() {
            return Err(Error::Config("service_name cannot be blank".to_owned()));
        }
        if self.service_name.contains('/') || self.service_name.contains('.') {
            return Err(Error::Config(format!(
                "service_name '{}' cannot contain '/' or '.'",
                self.service_name
            )));
        }
        Ok(())
    }
}
