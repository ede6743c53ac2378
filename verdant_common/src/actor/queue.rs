//! Per-actor inbox.
//!
//! Many producers, one consumer: the owning run loop. Control requests and
//! typed events share one FIFO so a `Shutdown` queued after a `Start` is
//! seen after it.

use super::ActorError;
use tokio::sync::mpsc;

/// Requests every actor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Reset,
    Shutdown,
}

#[derive(Debug)]
pub(crate) enum Envelope<E> {
    Control(Control),
    Event(E),
}

/// Producer handle for an actor's inbox.
///
/// Sending only enqueues; the owning loop applies the request on its next
/// pass.
#[derive(Debug)]
pub struct EventSender<E> {
    actor: String,
    tx: mpsc::UnboundedSender<Envelope<E>>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<E> EventSender<E> {
    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn send(&self, event: E) -> Result<(), ActorError> {
        self.push(Envelope::Event(event))
    }

    pub fn reset(&self) -> Result<(), ActorError> {
        self.push(Envelope::Control(Control::Reset))
    }

    pub fn shutdown(&self) -> Result<(), ActorError> {
        self.push(Envelope::Control(Control::Shutdown))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, envelope: Envelope<E>) -> Result<(), ActorError> {
        self.tx
            .send(envelope)
            .map_err(|_| ActorError::QueueClosed(self.actor.clone()))
    }
}

/// Consumer side, owned by the actor's core.
#[derive(Debug)]
pub(crate) struct Inbox<E> {
    sender: EventSender<E>,
    rx: mpsc::UnboundedReceiver<Envelope<E>>,
}

impl<E> Inbox<E> {
    pub(crate) fn new(actor: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: EventSender {
                actor: actor.to_string(),
                tx,
            },
            rx,
        }
    }

    pub(crate) fn sender(&self) -> EventSender<E> {
        self.sender.clone()
    }

    /// Wait for the next entry. Never yields `None` while `self` holds a sender.
    pub(crate) async fn recv(&mut self) -> Option<Envelope<E>> {
        self.rx.recv().await
    }

    pub(crate) fn try_recv(&mut self) -> Option<Envelope<E>> {
        self.rx.try_recv().ok()
    }
}
