// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox
//!
//! Unbounded FIFO queue of `(message, sender)` pairs owned by one actor. The
//! sending half is kept in the dispatcher registry; the receiving half is
//! owned by the actor's message pump.
//!
//! The queue is deliberately unbounded: there is no back-pressure on
//! producers, enqueueing never blocks.
//!

use crate::{ActorRef, Error, Message};

use tokio::{sync::mpsc, time};
use tracing::debug;

use std::time::Duration;

/// A queued message with the reference of the actor that sent it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub message: Message,
    pub sender: Option<ActorRef>,
}

/// Result of waiting on a mailbox for a bounded time.
#[derive(Debug)]
pub enum Poll {
    /// The next message, in enqueue order.
    Message(Envelope),
    /// Nothing arrived before the poll interval elapsed.
    Empty,
    /// Every sender is gone; nothing will ever arrive.
    Closed,
}

/// Creates a new mailbox.
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (MailboxSender { sender }, MailboxReceiver { receiver })
}

/// Enqueueing half of a mailbox.
#[derive(Clone)]
pub struct MailboxSender {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl MailboxSender {
    /// Appends a message to the queue.
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` if the pump has dropped the receiving half.
    pub fn enqueue(
        &self,
        message: Message,
        sender: Option<ActorRef>,
    ) -> Result<(), Error> {
        self.sender
            .send(Envelope { message, sender })
            .map_err(|error| {
                debug!("Failed to enqueue message! {}", error);
                Error::Send(error.to_string())
            })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Dequeueing half of a mailbox.
pub struct MailboxReceiver {
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl MailboxReceiver {
    /// Waits at most `timeout` for the next message.
    pub async fn poll(&mut self, timeout: Duration) -> Poll {
        match time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(envelope)) => Poll::Message(envelope),
            Ok(None) => Poll::Closed,
            Err(_) => Poll::Empty,
        }
    }

    /// Stops accepting messages. Already queued messages can still be polled.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[tokio::test]
    async fn test_mailbox_is_fifo() {
        let (sender, mut receiver) = mailbox();
        for i in 0..5 {
            sender.enqueue(Message::of("N", i).unwrap(), None).unwrap();
        }
        for i in 0..5 {
            match receiver.poll(Duration::from_millis(50)).await {
                Poll::Message(envelope) => {
                    assert_eq!(envelope.message.payload_as::<i32>().unwrap(), i);
                    assert!(envelope.sender.is_none());
                }
                other => panic!("unexpected poll result: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_poll_times_out_when_empty() {
        let (_sender, mut receiver) = mailbox();
        assert!(matches!(
            receiver.poll(Duration::from_millis(10)).await,
            Poll::Empty
        ));
    }

    #[tokio::test]
    async fn test_poll_reports_closed_mailbox() {
        let (sender, mut receiver) = mailbox();
        let recorder = ActorRef::Remote("other/recorder".into());
        sender
            .enqueue(Message::empty("LAST").unwrap(), Some(recorder.clone()))
            .unwrap();
        drop(sender);
        match receiver.poll(Duration::from_millis(10)).await {
            Poll::Message(envelope) => assert_eq!(envelope.sender, Some(recorder)),
            other => panic!("unexpected poll result: {:?}", other),
        }
        assert!(matches!(
            receiver.poll(Duration::from_millis(10)).await,
            Poll::Closed
        ));
    }

    #[test]
    fn test_enqueue_fails_on_closed_mailbox() {
        let (sender, mut receiver) = mailbox();
        receiver.close();
        assert!(sender.is_closed());
        assert!(matches!(
            sender.enqueue(Message::empty("X").unwrap(), None),
            Err(Error::Send(_))
        ));
    }
}
