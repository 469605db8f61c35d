//! The connection to the embedded checkout surface.
//!
//! A host page owns exactly one [`ChildConnection`]. It is created lazily
//! when the checkout first loads and is never recreated while alive: a second
//! `open` fails with [`ConnectionError::AlreadyOpen`] and callers reuse the
//! live one.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────────┐  open(url)  ┌────────────┐  Handshake  ┌───────┐
//! │ Unconnected │────────────>│ Connecting │────────────>│ Ready │
//! └─────────────┘             └────────────┘             └───────┘
//!        ^                          │                        │
//!        └──────────── close ───────┴────────────────────────┘
//! ```
//!
//! While `Connecting`, sends are buffered by the emitter. The surface's
//! handshake flips the emitter ready, which flushes the buffer in order.

use std::time::{Duration, Instant};

use paywall_proto::{Message, MessageKind};

use crate::{
    channel::{MessageChannel, origin_of},
    emitter::{Emitter, HandlerError, Subscription},
    error::ConnectionError,
    transport::{RawEvent, Transport},
};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No surface yet
    Unconnected,
    /// Surface created, handshake outstanding
    Connecting,
    /// Handshake received, sends go straight out
    Ready,
}

/// Connection to the embedded surface.
#[derive(Debug)]
pub struct ChildConnection<T> {
    state: ConnectionState,
    emitter: Option<Emitter<T>>,
    url: Option<String>,
    opened_at: Option<Instant>,
    ready_at: Option<Instant>,
}

impl<T> Default for ChildConnection<T> {
    fn default() -> Self {
        Self {
            state: ConnectionState::Unconnected,
            emitter: None,
            url: None,
            opened_at: None,
            ready_at: None,
        }
    }
}

impl<T: Transport> ChildConnection<T> {
    /// Unconnected connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// URL of the surface, once opened.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Time from `open` to handshake, once ready.
    pub fn handshake_latency(&self) -> Option<Duration> {
        Some(self.ready_at?.saturating_duration_since(self.opened_at?))
    }

    /// The emitter, once opened.
    pub fn emitter(&self) -> Option<&Emitter<T>> {
        self.emitter.as_ref()
    }

    /// Bind to the surface loaded from `url` over `transport`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::AlreadyOpen` if a surface is already attached
    /// - `ConnectionError::InvalidUrl` if `url` has no tuple origin
    pub fn open(&mut self, url: &str, transport: T, now: Instant) -> Result<(), ConnectionError> {
        if let Some(existing) = &self.url {
            return Err(ConnectionError::AlreadyOpen(existing.clone()));
        }
        let origin = surface_origin(url)?;

        tracing::debug!(url, %origin, "opening surface connection");
        self.emitter = Some(Emitter::new(MessageChannel::new(transport, origin)));
        self.url = Some(url.to_string());
        self.opened_at = Some(now);
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Handle an inbound event. A handshake marks the connection ready and
    /// flushes buffered sends.
    ///
    /// Returns the decoded message, or `None` if it was dropped.
    pub fn receive(&mut self, event: &RawEvent, now: Instant) -> Option<Message> {
        let Some(emitter) = self.emitter.as_mut() else {
            tracing::debug!(origin = %event.origin, "no surface connection, dropping event");
            return None;
        };

        let message = emitter.receive(event)?;
        if matches!(message, Message::Handshake) && emitter.set_ready() {
            self.state = ConnectionState::Ready;
            self.ready_at = Some(now);
            tracing::info!(latency = ?self.handshake_latency(), "surface handshake complete");
        }
        Some(message)
    }

    /// Send to the surface, buffered until the handshake.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotOpen` if no surface is attached
    /// - `ConnectionError::Channel` if an immediate post fails
    pub fn send(&mut self, message: Message) -> Result<(), ConnectionError> {
        let emitter = self.emitter.as_mut().ok_or(ConnectionError::NotOpen)?;
        emitter.send(message)?;
        Ok(())
    }

    /// Register a handler for inbound `kind`.
    ///
    /// # Errors
    ///
    /// `ConnectionError::NotOpen` if no surface is attached.
    pub fn on<F>(&mut self, kind: MessageKind, handler: F) -> Result<Subscription, ConnectionError>
    where
        F: FnMut(&Message) -> Result<(), HandlerError> + Send + 'static,
    {
        let emitter = self.emitter.as_mut().ok_or(ConnectionError::NotOpen)?;
        Ok(emitter.on(kind, handler))
    }

    /// Revoke a handler registration.
    pub fn off(&mut self, subscription: Subscription) -> bool {
        self.emitter.as_mut().is_some_and(|emitter| emitter.off(subscription))
    }

    /// Detach from the surface. Buffered sends are discarded.
    pub fn close(&mut self) {
        if let Some(emitter) = self.emitter.take() {
            tracing::debug!(discarded = emitter.buffered().len(), "closing surface connection");
        }
        *self = Self::default();
    }
}

/// Origin a surface loaded from `url` would post from.
///
/// Checked before creating the surface so a bad URL never leaves one behind.
///
/// # Errors
///
/// `ConnectionError::InvalidUrl` if `url` has no tuple origin.
pub fn surface_origin(url: &str) -> Result<String, ConnectionError> {
    origin_of(url).ok_or_else(|| ConnectionError::InvalidUrl {
        url: url.to_string(),
        reason: "no origin".to_string(),
    })
}
