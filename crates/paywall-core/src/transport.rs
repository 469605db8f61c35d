//! Transport abstraction for cross-context messaging.
//!
//! Abstracts over whatever carries text between the host page and the
//! embedded surface (a window `postMessage`, a webview bridge, an in-memory
//! queue in tests). Posting is fire-and-forget; answers come back as
//! [`RawEvent`]s delivered by the platform's event loop.

use crate::error::TransportError;

/// A message event as delivered by the platform, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Origin of the sending context (`scheme://host[:port]`)
    pub origin: String,
    /// Raw message data
    pub data: String,
}

impl RawEvent {
    /// Event carrying `data` from `origin`.
    pub fn new(origin: impl Into<String>, data: impl Into<String>) -> Self {
        Self { origin: origin.into(), data: data.into() }
    }
}

/// Outbound half of a cross-context link.
pub trait Transport: Send + 'static {
    /// Post `data` to the peer context, restricted to `target_origin`.
    ///
    /// Must not block. Delivery order matches call order.
    fn post(&mut self, data: String, target_origin: &str) -> Result<(), TransportError>;
}
