//! Recording host driver.

use std::sync::{Arc, Mutex};

use paywall_app::{Driver, PageEvent};
use paywall_core::error::TransportError;

use crate::{SimTransport, lock};

/// Everything the orchestrator did to the simulated page.
#[derive(Debug, Clone, Default)]
pub struct DriverLog {
    /// URLs surfaces were created for, in order
    pub opened: Vec<String>,
    /// Whether the checkout modal is showing
    pub modal_visible: bool,
    /// Page events, in dispatch order
    pub events: Vec<PageEvent>,
}

/// Driver for simulation. Clones share the log and the transport, so a test
/// keeps a handle while the orchestrator owns the driver.
#[derive(Debug, Clone, Default)]
pub struct SimDriver {
    log: Arc<Mutex<DriverLog>>,
    transport: SimTransport,
    refuse_surface: bool,
}

impl SimDriver {
    /// Driver whose surface creation always fails.
    pub fn refusing() -> Self {
        Self { refuse_surface: true, ..Self::default() }
    }

    /// Snapshot of the log.
    pub fn log(&self) -> DriverLog {
        lock(&self.log).clone()
    }

    /// Names of the dispatched page events.
    pub fn event_names(&self) -> Vec<&'static str> {
        lock(&self.log).events.iter().map(PageEvent::name).collect()
    }

    /// Transport handed to every created surface.
    pub fn transport(&self) -> &SimTransport {
        &self.transport
    }
}

impl Driver for SimDriver {
    type Transport = SimTransport;
    type Error = TransportError;

    fn open_surface(&mut self, url: &str) -> Result<SimTransport, TransportError> {
        if self.refuse_surface {
            return Err(TransportError(format!("cannot embed {url}")));
        }
        lock(&self.log).opened.push(url.to_string());
        Ok(self.transport.clone())
    }

    fn show_modal(&mut self) {
        lock(&self.log).modal_visible = true;
    }

    fn hide_modal(&mut self) {
        lock(&self.log).modal_visible = false;
    }

    fn dispatch_event(&mut self, event: &PageEvent) {
        tracing::trace!(event = event.name(), detail = %event.detail(), "page event");
        lock(&self.log).events.push(event.clone());
    }
}
