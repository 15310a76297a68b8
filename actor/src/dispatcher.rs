// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Local dispatcher
//!
//! The dispatcher owns every actor registered in this service. Each actor
//! gets a mailbox and exactly one message pump: a task that dequeues one
//! message at a time and awaits the actor's handler before taking the next.
//! The pump is the only code that ever touches the actor instance, which is
//! what makes actor state single-writer.
//!
//! The registry maps paths to the sending half of each mailbox and to the
//! cancellation token of the pump. It is a concurrent map, so operations on
//! different actors never serialize on a global lock.
//!
//! ## Pump states
//!
//! ```text
//! Waiting --message--> Processing --ok / resume / restart / escalate--> Waiting
//!    |                      |
//!    +--cancelled/closed--> +--stop directive--> Stopped
//! ```
//!
//! Waiting polls the mailbox with a bounded interval so the pump rechecks its
//! registration periodically even when no message arrives.
//!
//! Stopping an actor only cancels its pump. The registration stays in the
//! map as a stopping entry: it receives no messages and is no longer reported
//! by `contains`, but its path cannot be taken again until the pump has run
//! `post_stop` and removed it. `released` waits for that moment.
//!

use crate::{
    Actor, ActorContext, ActorPath, ActorRef, Error, Message,
    SupervisionDirective,
    mailbox::{Envelope, MailboxReceiver, MailboxSender, Poll, mailbox},
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::FutureExt;
use tokio::{select, task::JoinSet, time};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// Registry entry of a running actor.
struct Registration {
    /// Enqueueing half of the actor's mailbox.
    mailbox: MailboxSender,
    /// Cancels the actor's pump. Once cancelled the entry is stopping.
    token: CancellationToken,
    /// Cancelled after `post_stop` ran and the entry was removed.
    released: CancellationToken,
    /// Distinguishes successive actors registered under the same path.
    id: u64,
}

type Registry = Arc<DashMap<ActorPath, Registration>>;

/// Registry and driver of the actors hosted by this service.
#[derive(Clone)]
pub struct LocalDispatcher {
    /// Running actors by path.
    actors: Registry,
    /// Message pump tasks.
    pumps: Arc<Mutex<JoinSet<()>>>,
    /// Cancelled on shutdown. Every pump token is a child of it.
    token: CancellationToken,
    next_id: Arc<AtomicU64>,
    /// Upper bound of a single mailbox wait.
    poll_interval: Duration,
    /// How long shutdown waits for pumps before aborting them.
    shutdown_timeout: Duration,
}

impl LocalDispatcher {
    pub fn new(
        poll_interval: Duration,
        shutdown_timeout: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            actors: Arc::new(DashMap::new()),
            pumps: Arc::new(Mutex::new(JoinSet::new())),
            token,
            next_id: Arc::new(AtomicU64::new(1)),
            poll_interval,
            shutdown_timeout,
        }
    }

    /// Registers an actor, creates its mailbox and starts its message pump.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// `Error::Exists` if the path is taken or still stopping, `Error::Stopped`
    /// after shutdown. A rejected actor is handed back together with its
    /// context so the caller can still run its `post_stop`.
    pub(crate) fn try_register(
        &self,
        path: ActorPath,
        actor: Box<dyn Actor>,
        ctx: ActorContext,
    ) -> Result<(), (Error, Box<dyn Actor>, ActorContext)> {
        if self.token.is_cancelled() {
            return Err((Error::Stopped, actor, ctx));
        }
        let (sender, receiver) = mailbox();
        let token = self.token.child_token();
        let released = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        match self.actors.entry(path.clone()) {
            Entry::Occupied(entry) => {
                if entry.get().token.is_cancelled() {
                    error!("Actor '{}' is still stopping!", &path);
                } else {
                    error!("Actor '{}' already registered!", &path);
                }
                return Err((Error::Exists(path), actor, ctx));
            }
            Entry::Vacant(entry) => {
                entry.insert(Registration {
                    mailbox: sender,
                    token: token.clone(),
                    released: released.clone(),
                    id,
                });
            }
        }

        let pump = MessagePump {
            path: path.clone(),
            actor,
            ctx,
            receiver,
            token,
            released,
            id,
            actors: self.actors.clone(),
            poll_interval: self.poll_interval,
        };
        {
            let mut pumps =
                self.pumps.lock().unwrap_or_else(|error| error.into_inner());
            while pumps.try_join_next().is_some() {}
            pumps.spawn(pump.run().in_current_span());
        }

        debug!("Actor registered: {}", &path);
        Ok(())
    }

    /// Stops an actor. Its pump runs `post_stop` and then frees the path.
    /// Unknown or already stopping paths are ignored.
    pub fn unregister(&self, path: &ActorPath) {
        match self.actors.get(path) {
            Some(registration) if !registration.token.is_cancelled() => {
                registration.token.cancel();
                debug!("Actor unregistered: {}", path);
            }
            Some(_) => debug!("Actor {} is already stopping.", path),
            None => debug!("Actor {} is not registered.", path),
        }
    }

    /// Resolves once no actor is registered or stopping under `path`.
    pub async fn released(&self, path: &ActorPath) {
        let released = match self.actors.get(path) {
            Some(registration) => registration.released.clone(),
            None => return,
        };
        released.cancelled().await;
    }

    /// Enqueues a message for a local actor.
    ///
    /// Fire and forget: if the actor is unknown the message is dropped with a
    /// warning and nothing is reported to the caller.
    pub fn dispatch(
        &self,
        path: &ActorPath,
        message: Message,
        sender: Option<ActorRef>,
    ) {
        let result = match self.actors.get(path) {
            Some(registration) if registration.token.is_cancelled() => {
                warn!("Cannot dispatch to stopping actor: {}", path);
                return;
            }
            Some(registration) => registration.mailbox.enqueue(message, sender),
            None => {
                warn!("Cannot dispatch to unknown actor: {}", path);
                debug!("Available actors: {:?}", self.paths());
                return;
            }
        };
        if let Err(error) = result {
            warn!("Dropping message for actor {}: {}", path, error);
        }
    }

    /// True if a running actor is registered under `path`.
    pub fn contains(&self, path: &ActorPath) -> bool {
        self.actors
            .get(path)
            .map(|registration| !registration.token.is_cancelled())
            .unwrap_or(false)
    }

    /// True if `path` is taken by a running or stopping actor.
    pub(crate) fn occupied(&self, path: &ActorPath) -> bool {
        self.actors.contains_key(path)
    }

    /// Paths of all running actors.
    pub fn paths(&self) -> Vec<ActorPath> {
        self.actors
            .iter()
            .filter(|entry| !entry.token.is_cancelled())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actors
            .iter()
            .filter(|entry| !entry.token.is_cancelled())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True until `shutdown` is called.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stops every pump. Pumps get `shutdown_timeout` to finish the message
    /// in hand and run `post_stop`; the ones still busy are aborted.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let mut pumps = {
            let mut guard =
                self.pumps.lock().unwrap_or_else(|error| error.into_inner());
            std::mem::take(&mut *guard)
        };
        let drained = time::timeout(self.shutdown_timeout, async {
            while pumps.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "Aborting {} message pumps still running after {:?}",
                pumps.len(),
                self.shutdown_timeout
            );
            pumps.abort_all();
        }
        for registration in self.actors.iter() {
            registration.released.cancel();
        }
        self.actors.clear();
        debug!("Local dispatcher stopped.");
    }
}

/// Runs a lifecycle future, turning a panic into `Error::Panic`.
pub(crate) async fn guard<F>(future: F) -> Result<(), Error>
where
    F: Future<Output = Result<(), Error>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(Error::Panic(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

enum PumpState {
    Waiting,
    Processing(Envelope),
    Stopped,
}

/// Sequential worker of one actor.
struct MessagePump {
    path: ActorPath,
    actor: Box<dyn Actor>,
    ctx: ActorContext,
    receiver: MailboxReceiver,
    token: CancellationToken,
    released: CancellationToken,
    id: u64,
    actors: Registry,
    poll_interval: Duration,
}

impl MessagePump {
    async fn run(mut self) {
        debug!("Message pump started for {}", &self.path);

        let mut state = PumpState::Waiting;
        loop {
            state = match state {
                PumpState::Waiting => self.wait().await,
                PumpState::Processing(envelope) => self.process(envelope).await,
                PumpState::Stopped => break,
            };
        }

        self.receiver.close();
        self.token.cancel();
        if let Err(error) = guard(self.actor.post_stop(&mut self.ctx)).await {
            error!("Error in postStop for actor {}: {}", &self.path, error);
        }
        self.actors
            .remove_if(&self.path, |_, registration| registration.id == self.id);
        self.released.cancel();
        debug!("Message pump stopped for {}", &self.path);
    }

    fn is_registered(&self) -> bool {
        self.actors
            .get(&self.path)
            .map(|registration| {
                registration.id == self.id && !registration.token.is_cancelled()
            })
            .unwrap_or(false)
    }

    async fn wait(&mut self) -> PumpState {
        select! {
            biased;
            _ = self.token.cancelled() => PumpState::Stopped,
            poll = self.receiver.poll(self.poll_interval) => match poll {
                Poll::Message(envelope) if !self.token.is_cancelled() => {
                    PumpState::Processing(envelope)
                }
                Poll::Message(envelope) => {
                    debug!(
                        "Actor {} is stopped, dropping {}",
                        &self.path, envelope.message
                    );
                    PumpState::Stopped
                }
                Poll::Empty if self.is_registered() => PumpState::Waiting,
                Poll::Empty | Poll::Closed => PumpState::Stopped,
            },
        }
    }

    async fn process(&mut self, envelope: Envelope) -> PumpState {
        let Envelope { message, sender } = envelope;

        self.ctx.set_sender(sender);
        let result =
            guard(self.actor.on_receive(&message, &mut self.ctx)).await;
        self.ctx.clear_sender();

        let cause = match result {
            Ok(()) => return PumpState::Waiting,
            Err(cause) => cause,
        };
        error!(
            "Actor '{}' failed while handling message type={}: {}",
            &self.path,
            message.message_type(),
            cause
        );

        let actor = &mut self.actor;
        let directive = std::panic::catch_unwind(AssertUnwindSafe(|| {
            actor.on_failure(&cause, &message)
        }))
        .unwrap_or_else(|_| {
            error!("Failure handler of actor {} panicked", &self.path);
            SupervisionDirective::Stop
        });
        self.apply(directive, &cause).await
    }

    async fn apply(
        &mut self,
        directive: SupervisionDirective,
        cause: &Error,
    ) -> PumpState {
        match directive {
            SupervisionDirective::Resume => {
                debug!("Actor {} resumed after failure", &self.path);
                PumpState::Waiting
            }
            SupervisionDirective::Restart => {
                info!("Actor {} restarting after failure", &self.path);
                self.restart().await;
                PumpState::Waiting
            }
            SupervisionDirective::Stop => {
                info!("Actor {} stopping after failure", &self.path);
                self.token.cancel();
                PumpState::Stopped
            }
            SupervisionDirective::Escalate => {
                error!(
                    "Actor {} escalated failure: {}",
                    &self.path, cause
                );
                PumpState::Waiting
            }
        }
    }

    /// `post_stop` then `pre_start` on the same instance. Failures are logged.
    async fn restart(&mut self) {
        let result = match guard(self.actor.post_stop(&mut self.ctx)).await {
            Ok(()) => guard(self.actor.pre_start(&mut self.ctx)).await,
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            error!("Failed to restart actor {}: {}", &self.path, error);
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::{ActorSystem, SystemConfig};

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    /// Forwards handled message types; fails on `FAIL`, panics on `BOOM`.
    /// `SLOW` is forwarded before the handler sleeps.
    struct Faulty {
        directive: SupervisionDirective,
        seen: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Actor for Faulty {
        async fn on_receive(
            &mut self,
            message: &Message,
            _ctx: &mut ActorContext,
        ) -> Result<(), Error> {
            match message.message_type() {
                "FAIL" => Err(Error::Functional("bad message".to_owned())),
                "BOOM" => panic!("handler exploded"),
                "SLOW" => {
                    let _ = self.seen.send("SLOW".to_owned());
                    time::sleep(Duration::from_millis(100)).await;
                    Ok(())
                }
                other => {
                    let _ = self.seen.send(other.to_owned());
                    Ok(())
                }
            }
        }

        async fn post_stop(
            &mut self,
            _ctx: &mut ActorContext,
        ) -> Result<(), Error> {
            let _ = self.seen.send("post_stop".to_owned());
            Ok(())
        }

        fn on_failure(
            &mut self,
            _cause: &Error,
            _message: &Message,
        ) -> SupervisionDirective {
            self.directive
        }
    }

    fn register(
        system: &ActorSystem,
        path: &ActorPath,
        directive: SupervisionDirective,
        seen: mpsc::UnboundedSender<String>,
    ) -> Result<(), Error> {
        let ctx = ActorContext::new(ActorRef::Local(path.clone()), system.clone());
        system
            .dispatcher()
            .try_register(path.clone(), Box::new(Faulty { directive, seen }), ctx)
            .map_err(|(error, ..)| error)
    }

    fn setup(
        directive: SupervisionDirective,
    ) -> (ActorSystem, ActorPath, mpsc::UnboundedReceiver<String>) {
        let system = ActorSystem::create(
            SystemConfig::new("test")
                .with_poll_interval(Duration::from_millis(20)),
        )
        .unwrap();
        let (seen, receiver) = mpsc::unbounded_channel();
        let path = ActorPath::from("test/faulty");
        register(&system, &path, directive, seen).unwrap();
        (system, path, receiver)
    }

    fn message(message_type: &str) -> Message {
        Message::empty(message_type).unwrap()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_dispatch_to_unknown_actor_is_dropped() {
        let (system, _path, _receiver) = setup(SupervisionDirective::Resume);
        system
            .dispatcher()
            .dispatch(&ActorPath::from("test/ghost"), message("PING"), None);
        assert!(logs_contain("Cannot dispatch to unknown actor: test/ghost"));
        assert!(logs_contain("Available actors: [test/faulty]"));
        system.close().await;
    }

    #[tokio::test]
    async fn test_register_twice() {
        let (system, path, _receiver) = setup(SupervisionDirective::Resume);
        let (seen, _other) = mpsc::unbounded_channel();
        let result =
            register(&system, &path, SupervisionDirective::Resume, seen);
        assert_eq!(result, Err(Error::Exists(path)));
        system.close().await;
    }

    #[tokio::test]
    async fn test_stopping_path_is_not_free() {
        let (system, path, mut receiver) = setup(SupervisionDirective::Resume);
        let dispatcher = system.dispatcher();
        dispatcher.dispatch(&path, message("SLOW"), None);
        assert_eq!(receiver.recv().await.unwrap(), "SLOW");

        dispatcher.unregister(&path);
        assert!(!dispatcher.contains(&path));
        assert!(dispatcher.paths().is_empty());
        let (seen, mut other) = mpsc::unbounded_channel();
        assert_eq!(
            register(&system, &path, SupervisionDirective::Resume, seen.clone()),
            Err(Error::Exists(path.clone()))
        );
        dispatcher.dispatch(&path, message("LATE"), None);

        dispatcher.released(&path).await;
        assert_eq!(receiver.recv().await.unwrap(), "post_stop");
        register(&system, &path, SupervisionDirective::Resume, seen).unwrap();
        dispatcher.dispatch(&path, message("NEXT"), None);
        assert_eq!(other.recv().await.unwrap(), "NEXT");
        system.close().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_escalate_is_logged_and_resumes() {
        let (system, path, mut receiver) = setup(SupervisionDirective::Escalate);
        let dispatcher = system.dispatcher();
        dispatcher.dispatch(&path, message("FAIL"), None);
        dispatcher.dispatch(&path, message("AFTER"), None);

        assert_eq!(receiver.recv().await.unwrap(), "AFTER");
        assert!(logs_contain("Actor test/faulty escalated failure"));
        assert!(dispatcher.contains(&path));
        system.close().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_panicking_handler_keeps_pump_alive() {
        let (system, path, mut receiver) = setup(SupervisionDirective::Resume);
        let dispatcher = system.dispatcher();
        dispatcher.dispatch(&path, message("BOOM"), None);
        dispatcher.dispatch(&path, message("AFTER"), None);

        assert_eq!(receiver.recv().await.unwrap(), "AFTER");
        assert!(logs_contain("Actor panicked: handler exploded"));
        system.close().await;
    }

    #[tokio::test]
    async fn test_unregister_runs_post_stop_once() {
        let (system, path, mut receiver) = setup(SupervisionDirective::Resume);
        let dispatcher = system.dispatcher();
        dispatcher.unregister(&path);
        dispatcher.unregister(&path);
        assert!(!dispatcher.contains(&path));

        assert_eq!(receiver.recv().await.unwrap(), "post_stop");
        dispatcher.dispatch(&path, message("LATE"), None);
        system.close().await;
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_pump() {
        let (system, path, mut receiver) = setup(SupervisionDirective::Resume);
        system.close().await;

        assert!(!system.dispatcher().is_running());
        assert!(system.dispatcher().is_empty());
        assert_eq!(receiver.recv().await.unwrap(), "post_stop");
        assert_eq!(
            register(
                &system,
                &path,
                SupervisionDirective::Resume,
                mpsc::unbounded_channel().0,
            ),
            Err(Error::Stopped)
        );
    }
}
