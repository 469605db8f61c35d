//! Origin-checked, typed channel between two contexts.
//!
//! A [`MessageChannel`] is bound to one expected origin at construction.
//! Outbound messages are encoded and posted restricted to that origin;
//! inbound events are accepted only when they carry it.

use paywall_proto::Message;
use url::Url;

use crate::{
    error::ChannelError,
    transport::{RawEvent, Transport},
};

/// Typed channel over a [`Transport`].
#[derive(Debug)]
pub struct MessageChannel<T> {
    transport: T,
    expected_origin: String,
}

impl<T: Transport> MessageChannel<T> {
    /// Channel to the context serving `expected_origin`.
    pub fn new(transport: T, expected_origin: impl Into<String>) -> Self {
        Self { transport, expected_origin: expected_origin.into() }
    }

    /// Origin this channel exchanges messages with.
    pub fn expected_origin(&self) -> &str {
        &self.expected_origin
    }

    /// Encode and post `message` to the peer.
    ///
    /// # Errors
    ///
    /// - `ChannelError::Protocol` if the message cannot be encoded
    /// - `ChannelError::Transport` if the transport refuses it
    pub fn post(&mut self, message: &Message) -> Result<(), ChannelError> {
        let data = message.encode()?;
        self.transport.post(data, &self.expected_origin)?;
        Ok(())
    }

    /// Validate and decode an inbound event.
    ///
    /// # Errors
    ///
    /// - `ChannelError::UnexpectedOrigin` if the event is from another origin
    /// - `ChannelError::Protocol` if the envelope is malformed
    pub fn accept(&self, event: &RawEvent) -> Result<Message, ChannelError> {
        if event.origin != self.expected_origin {
            return Err(ChannelError::UnexpectedOrigin {
                expected: self.expected_origin.clone(),
                actual: event.origin.clone(),
            });
        }
        Ok(Message::decode(event.data.as_bytes())?)
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Serialized origin of `url`, or `None` for opaque origins (`data:`,
/// `file:`) and unparseable input.
pub fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
