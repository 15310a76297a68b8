// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor system
//!
//! The [`ActorSystem`] is the runtime of one service. It names local actors
//! `<service>/<name>`, creates them, resolves paths to references and routes
//! every `tell` either to the local dispatcher or to the remote bridge.
//!
//! A system is a cheap handle: clones share the same registry, bridge and
//! type table. Several systems can live in one process, each with its own
//! service name, and talk to each other through a shared broker.
//!

use crate::{
    Actor, ActorContext, ActorFactory, ActorPath, ActorRef, Error, Message,
    config::SystemConfig,
    dispatcher::{LocalDispatcher, guard},
    remote::{Broker, RemoteBridge},
};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use std::{panic::AssertUnwindSafe, sync::Arc};

/// Runtime hosting the actors of one service.
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    service_name: String,
    config: SystemConfig,
    dispatcher: LocalDispatcher,
    bridge: Option<RemoteBridge>,
    /// Factories by actor type identifier.
    types: DashMap<String, Arc<dyn ActorFactory>>,
    token: CancellationToken,
}

impl ActorSystem {
    /// Creates a local-only runtime. Remote references told through it are
    /// dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the service name is not usable in paths.
    pub fn create(config: SystemConfig) -> Result<Self, Error> {
        config.validate()?;
        let token = CancellationToken::new();
        let dispatcher = Self::dispatcher_for(&config, &token);
        Ok(Self::assemble(config, dispatcher, None, token))
    }

    /// Creates a runtime connected to `broker`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the service name is not usable in paths,
    /// `Error::BrokerSetup` if the broker topology cannot be declared. The
    /// runtime is not created in either case.
    pub async fn connect(
        config: SystemConfig,
        broker: Arc<dyn Broker>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let token = CancellationToken::new();
        let dispatcher = Self::dispatcher_for(&config, &token);
        let bridge = RemoteBridge::connect(
            &config.service_name,
            &config.remote,
            broker,
            dispatcher.clone(),
            token.child_token(),
        )
        .await?;
        Ok(Self::assemble(config, dispatcher, Some(bridge), token))
    }

    fn dispatcher_for(
        config: &SystemConfig,
        token: &CancellationToken,
    ) -> LocalDispatcher {
        LocalDispatcher::new(
            config.poll_interval(),
            config.shutdown_timeout(),
            token.child_token(),
        )
    }

    fn assemble(
        config: SystemConfig,
        dispatcher: LocalDispatcher,
        bridge: Option<RemoteBridge>,
        token: CancellationToken,
    ) -> Self {
        info!("Actor system started for service {}", config.service_name);
        Self {
            inner: Arc::new(SystemInner {
                service_name: config.service_name.clone(),
                config,
                dispatcher,
                bridge,
                types: DashMap::new(),
                token,
            }),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &LocalDispatcher {
        &self.inner.dispatcher
    }

    /// Remote bridge, if the runtime was connected to a broker.
    pub fn bridge(&self) -> Option<&RemoteBridge> {
        self.inner.bridge.as_ref()
    }

    /// Path a local actor named `name` gets in this service.
    fn local_path(&self, name: &str) -> Result<ActorPath, Error> {
        if name.trim().is_empty() || name.contains('/') {
            return Err(Error::InvalidPath(format!(
                "invalid actor name '{}'",
                name
            )));
        }
        Ok(ActorPath::from(self.service_name()) / name)
    }

    /// Creates, starts and registers a local actor.
    ///
    /// The actor is built by `factory`, then its `pre_start` hook runs. Only
    /// if both succeed is the actor registered and able to receive messages.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPath` if `name` is empty or contains `/`.
    /// - `Error::Exists` if an actor already has this path, including one
    ///   stopped but not yet through `post_stop`.
    /// - `Error::Create` wrapping the cause if construction or `pre_start`
    ///   fails.
    /// - `Error::Stopped` after `close`.
    pub async fn actor_of(
        &self,
        factory: &dyn ActorFactory,
        name: &str,
    ) -> Result<ActorRef, Error> {
        let path = self.local_path(name)?;
        if !self.inner.dispatcher.is_running() {
            return Err(Error::Stopped);
        }
        if self.inner.dispatcher.occupied(&path) {
            error!("Actor '{}' already exists!", &path);
            return Err(Error::Exists(path));
        }

        let created =
            std::panic::catch_unwind(AssertUnwindSafe(|| factory.create(name)))
                .unwrap_or_else(|_| {
                    Err(Error::Panic(format!("factory of {} panicked", name)))
                });
        let actor = created.map_err(|e| {
            error!("Failed to instantiate actor {}: {}", &path, e);
            Error::Create(path.clone(), Box::new(e))
        })?;

        self.start(path, actor).await
    }

    async fn start(
        &self,
        path: ActorPath,
        mut actor: Box<dyn Actor>,
    ) -> Result<ActorRef, Error> {
        let myself = ActorRef::Local(path.clone());
        let mut ctx = ActorContext::new(myself.clone(), self.clone());

        if let Err(e) = guard(actor.pre_start(&mut ctx)).await {
            error!("preStart failed for actor {}: {}", &path, e);
            return Err(Error::Create(path, Box::new(e)));
        }

        if let Err((e, mut actor, mut ctx)) =
            self.inner.dispatcher.try_register(path.clone(), actor, ctx)
        {
            // Started but never registered: undo what pre_start set up.
            if let Err(cleanup) = guard(actor.post_stop(&mut ctx)).await {
                error!("Error in postStop for actor {}: {}", &path, cleanup);
            }
            return Err(e);
        }
        info!("Actor created: {}", &path);
        Ok(myself)
    }

    /// Makes `factory` available under `actor_type` for
    /// [`ActorSystem::actor_of_type`]. A later registration replaces an
    /// earlier one.
    pub fn register_actor_type<F>(&self, actor_type: &str, factory: F)
    where
        F: ActorFactory + 'static,
    {
        self.inner
            .types
            .insert(actor_type.to_owned(), Arc::new(factory));
        debug!("Actor type registered: {}", actor_type);
    }

    /// Creates an actor from a registered type identifier.
    ///
    /// # Errors
    ///
    /// As [`ActorSystem::actor_of`]; an unknown type yields `Error::Create`
    /// wrapping `Error::UnknownActorType`.
    pub async fn actor_of_type(
        &self,
        actor_type: &str,
        name: &str,
    ) -> Result<ActorRef, Error> {
        let path = self.local_path(name)?;
        let factory = self
            .inner
            .types
            .get(actor_type)
            .map(|factory| factory.value().clone());
        match factory {
            Some(factory) => self.actor_of(factory.as_ref(), name).await,
            None => {
                error!("Unknown actor type {} for {}", actor_type, &path);
                Err(Error::Create(
                    path,
                    Box::new(Error::UnknownActorType(actor_type.to_owned())),
                ))
            }
        }
    }

    /// Resolves a path to a reference.
    ///
    /// A bare name, without any `/`, is taken as local to this service.
    /// Anything else must be a well formed `service/name` path. Local paths
    /// must be registered; paths of other services always resolve to a
    /// remote reference, whether the actor exists or not.
    ///
    /// # Errors
    ///
    /// `Error::InvalidPath` for an empty name or a path with blank segments,
    /// `Error::NotFound` for an unknown local actor.
    pub fn actor_selection(&self, path: &str) -> Result<ActorRef, Error> {
        let resolved = if path.contains('/') {
            ActorPath::from(path)
        } else {
            ActorPath::from(self.service_name()) / path
        };
        if !resolved.is_well_formed() {
            return Err(Error::InvalidPath(format!(
                "invalid actor path '{}'",
                path
            )));
        }

        if !resolved.belongs_to(self.service_name()) {
            return Ok(ActorRef::Remote(resolved));
        }
        if self.inner.dispatcher.contains(&resolved) {
            Ok(ActorRef::Local(resolved))
        } else {
            warn!("Actor not found: {}", &resolved);
            Err(Error::NotFound(resolved))
        }
    }

    /// Sends a message, locally or through the broker. Delivery failures are
    /// logged, never returned.
    pub async fn tell(
        &self,
        to: &ActorRef,
        message: Message,
        sender: Option<&ActorRef>,
    ) {
        match to {
            ActorRef::Local(path) => {
                self.inner.dispatcher.dispatch(path, message, sender.cloned())
            }
            ActorRef::Remote(path) => match &self.inner.bridge {
                Some(bridge) => {
                    if let Err(e) = bridge.send(path, &message, sender).await {
                        error!(
                            "Failed to send {} to remote actor {}: {}",
                            message, path, e
                        );
                    }
                }
                None => {
                    warn!(
                        "No remote bridge in service {}, dropping {} for {}",
                        self.service_name(),
                        message,
                        path
                    );
                }
            },
        }
    }

    /// Stops a local actor. Remote references are ignored: a service cannot
    /// stop another service's actors.
    pub fn stop(&self, actor: &ActorRef) {
        match actor {
            ActorRef::Local(path) => {
                if self.inner.dispatcher.contains(path) {
                    self.inner.dispatcher.unregister(path);
                    info!("Actor stopped: {}", path);
                } else {
                    debug!("Actor {} already stopped", path);
                }
            }
            ActorRef::Remote(path) => {
                debug!("Ignoring stop of remote actor {}", path);
            }
        }
    }

    /// Waits until a stopped local actor has run `post_stop` and its path is
    /// free again. Returns at once for unknown paths and remote references.
    ///
    /// An actor must not await its own termination from its handler: the
    /// handler would wait for itself.
    pub async fn terminated(&self, actor: &ActorRef) {
        if let ActorRef::Local(path) = actor {
            self.inner.dispatcher.released(path).await;
        }
    }

    /// Stops every local actor and the broker listener. Calling it again is
    /// harmless.
    pub async fn close(&self) {
        self.inner.dispatcher.shutdown().await;
        if let Some(bridge) = &self.inner.bridge {
            bridge.shutdown().await;
        }
        self.inner.token.cancel();
        info!("Actor system closed for service {}", self.service_name());
    }
}
