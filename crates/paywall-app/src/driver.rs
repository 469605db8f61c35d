//! Driver trait for abstracting the host page.
//!
//! The [`Driver`] decouples the orchestrator from the platform that embeds
//! it. A browser binding creates the iframe and dispatches DOM events; the
//! simulation harness records everything for oracles to inspect.

use paywall_core::transport::Transport;

use crate::event::PageEvent;

/// Host page operations used by [`crate::Paywall`].
pub trait Driver: Send {
    /// Transport posting into a created surface.
    type Transport: Transport;

    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Create the embedded surface loading `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface cannot be created.
    fn open_surface(&mut self, url: &str) -> Result<Self::Transport, Self::Error>;

    /// Make the checkout visible.
    fn show_modal(&mut self);

    /// Hide the checkout.
    fn hide_modal(&mut self);

    /// Publish a page-level event to the host application.
    fn dispatch_event(&mut self, event: &PageEvent);
}
