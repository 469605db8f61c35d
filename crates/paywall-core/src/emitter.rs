//! Ready-gated emitter with a typed handler table.
//!
//! Sends issued before [`Emitter::set_ready`] are held in a FIFO buffer and
//! flushed exactly once, in call order, on the first readiness transition.
//! Inbound events are validated by the underlying [`MessageChannel`] and
//! dispatched to every handler registered for their kind.
//!
//! # Handler isolation
//!
//! A handler that returns an error or panics is logged and skipped. Remaining
//! handlers for the same dispatch still run, and the ready flag and buffer are
//! never touched by dispatch.

use std::{
    collections::{BTreeMap, VecDeque},
    error::Error,
    panic::{AssertUnwindSafe, catch_unwind},
};

use paywall_proto::{Message, MessageKind};

use crate::{
    channel::MessageChannel,
    error::ChannelError,
    transport::{RawEvent, Transport},
};

/// Error a handler may report. Logged, never propagated.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Boxed inbound message handler.
pub type Handler = Box<dyn FnMut(&Message) -> Result<(), HandlerError> + Send>;

/// Revocable registration returned by [`Emitter::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: MessageKind,
    id: u64,
}

impl Subscription {
    /// Kind the handler is registered for.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }
}

/// Emitter over a [`MessageChannel`].
pub struct Emitter<T> {
    channel: MessageChannel<T>,
    ready: bool,
    buffer: VecDeque<Message>,
    handlers: BTreeMap<MessageKind, Vec<(u64, Handler)>>,
    next_handler: u64,
}

impl<T: Transport> Emitter<T> {
    /// Emitter in the not-ready state.
    pub fn new(channel: MessageChannel<T>) -> Self {
        Self {
            channel,
            ready: false,
            buffer: VecDeque::new(),
            handlers: BTreeMap::new(),
            next_handler: 0,
        }
    }

    /// Whether the peer has signalled readiness.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Messages waiting for readiness, oldest first.
    pub fn buffered(&self) -> impl ExactSizeIterator<Item = &Message> {
        self.buffer.iter()
    }

    /// The underlying channel.
    pub fn channel(&self) -> &MessageChannel<T> {
        &self.channel
    }

    /// Send `message`, or buffer it until ready.
    ///
    /// # Errors
    ///
    /// Only once ready, if the channel fails to post.
    pub fn send(&mut self, message: Message) -> Result<(), ChannelError> {
        if !self.ready {
            tracing::trace!(kind = %message.kind(), queued = self.buffer.len(), "buffering send");
            self.buffer.push_back(message);
            return Ok(());
        }
        self.channel.post(&message)
    }

    /// Register `handler` for inbound `kind`.
    pub fn on<F>(&mut self, kind: MessageKind, handler: F) -> Subscription
    where
        F: FnMut(&Message) -> Result<(), HandlerError> + Send + 'static,
    {
        self.add_handler(kind, Box::new(handler))
    }

    /// Register an already boxed handler for inbound `kind`.
    pub fn add_handler(&mut self, kind: MessageKind, handler: Handler) -> Subscription {
        let id = self.next_handler;
        self.next_handler += 1;
        self.handlers.entry(kind).or_default().push((id, handler));
        Subscription { kind, id }
    }

    /// Revoke a registration. Returns `false` if it was already revoked.
    pub fn off(&mut self, subscription: Subscription) -> bool {
        let Some(handlers) = self.handlers.get_mut(&subscription.kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.handlers.remove(&subscription.kind);
        }
        removed
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Validate, decode and dispatch an inbound event.
    ///
    /// Events from a foreign origin and malformed envelopes are dropped and
    /// yield `None`. A valid message with no handler for its kind is returned
    /// undispatched.
    pub fn receive(&mut self, event: &RawEvent) -> Option<Message> {
        let message = match self.channel.accept(event) {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(origin = %event.origin, %error, "dropping inbound event");
                return None;
            },
        };

        let kind = message.kind();
        let Some(handlers) = self.handlers.get_mut(&kind) else {
            tracing::debug!(%kind, "no handler registered");
            return Some(message);
        };

        for (id, handler) in handlers.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| handler(&message))) {
                Ok(Ok(())) => {},
                Ok(Err(error)) => {
                    tracing::warn!(%kind, handler = id, %error, "handler failed");
                },
                Err(_) => {
                    tracing::warn!(%kind, handler = id, "handler panicked");
                },
            }
        }

        Some(message)
    }

    /// Mark the peer ready and flush the buffer. Returns `true` on the first
    /// call only; later calls are no-ops.
    pub fn set_ready(&mut self) -> bool {
        if self.ready {
            return false;
        }
        self.ready = true;

        let count = self.buffer.len();
        while let Some(message) = self.buffer.pop_front() {
            if let Err(error) = self.channel.post(&message) {
                tracing::warn!(kind = %message.kind(), %error, "failed to flush buffered send");
            }
        }
        tracing::debug!(flushed = count, origin = self.channel.expected_origin(), "emitter ready");
        true
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("ready", &self.ready)
            .field("buffered", &self.buffer.len())
            .field("handlers", &self.handlers.values().map(Vec::len).sum::<usize>())
            .finish_non_exhaustive()
    }
}
