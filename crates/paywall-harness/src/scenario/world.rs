//! World state for scenario execution.
//!
//! The World owns the orchestrator under test together with handles on every
//! simulated collaborator, applies scenario steps, and gives oracles a
//! read-only view of the outcome.

use std::sync::Arc;

use paywall_app::{LockStatus, PageEvent, Paywall};
use paywall_core::{channel::origin_of, provider::Capability, transport::RawEvent};
use paywall_proto::{Message, MethodCallResult};

use crate::{
    CHECKOUT_ORIGIN, Posted, SimCapability, SimChain, SimDriver, SimEnv, scenario::Step,
};

/// Orchestrator plus simulated collaborators.
pub struct World {
    paywall: Paywall<SimDriver, SimEnv>,
    driver: SimDriver,
    chain: SimChain,
    capability: Option<SimCapability>,
    env: SimEnv,
    failures: Vec<String>,
}

impl World {
    pub(crate) fn new(
        paywall: Paywall<SimDriver, SimEnv>,
        driver: SimDriver,
        chain: SimChain,
        capability: Option<SimCapability>,
        env: SimEnv,
    ) -> Self {
        Self { paywall, driver, chain, capability, env, failures: Vec::new() }
    }

    pub(crate) async fn apply(&mut self, step: Step) {
        match step {
            Step::LoadCheckout(config) => {
                let result = self.paywall.load_checkout_modal(config, None);
                self.record(result);
            },
            Step::ShakeHands => {
                let result = self.paywall.shake_hands(None);
                self.record(result);
            },
            Step::GetProvider(config) => {
                let result = self.paywall.get_provider(None, config).map(|_| ());
                self.record(result);
            },
            Step::SetConfig(config) => {
                let result = self.paywall.set_paywall_config(config);
                self.record(result);
            },
            Step::Handshake => self.from_surface(&Message::Handshake),
            Step::Surface(message) => self.from_surface(&message),
            Step::Foreign { origin, message } => match message.encode() {
                Ok(data) => self.paywall.receive(&RawEvent::new(origin, data)),
                Err(error) => self.failures.push(error.to_string()),
            },
            Step::Raw(data) => {
                let origin = self.surface_origin();
                self.paywall.receive(&RawEvent::new(origin, data));
            },
            Step::Connect(capability) => {
                self.capability.clone_from(&capability);
                let capability = capability.map(|c| -> Arc<dyn Capability> { Arc::new(c) });
                self.paywall.connect(capability);
            },
            Step::Emit { event, data } => match &self.capability {
                Some(capability) => {
                    capability.emit(&event, data);
                },
                None => self.failures.push(format!("no capability to emit {event}")),
            },
            Step::SetUnixTime(unix_time) => self.env.set_unix_time(unix_time),
            Step::Settle => self.paywall.run_until_idle().await,
            Step::Close => self.paywall.close(),
        }
    }

    fn record<E: std::fmt::Display>(&mut self, result: Result<(), E>) {
        if let Err(error) = result {
            tracing::debug!(%error, "step failed");
            self.failures.push(error.to_string());
        }
    }

    fn surface_origin(&self) -> String {
        self.driver
            .log()
            .opened
            .last()
            .and_then(|url| origin_of(url))
            .unwrap_or_else(|| CHECKOUT_ORIGIN.to_string())
    }

    fn from_surface(&mut self, message: &Message) {
        match message.encode() {
            Ok(data) => {
                let origin = self.surface_origin();
                self.paywall.receive(&RawEvent::new(origin, data));
            },
            Err(error) => self.failures.push(error.to_string()),
        }
    }

    /// Orchestrator under test.
    pub fn paywall(&self) -> &Paywall<SimDriver, SimEnv> {
        &self.paywall
    }

    /// Current lock status.
    pub fn status(&self) -> LockStatus {
        self.paywall.get_state()
    }

    /// Page events, in dispatch order.
    pub fn events(&self) -> Vec<PageEvent> {
        self.driver.log().events
    }

    /// Page event names, in dispatch order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.driver.event_names()
    }

    /// Status events, in dispatch order.
    pub fn statuses(&self) -> Vec<LockStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PageEvent::Status { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Whether the checkout modal is showing.
    pub fn modal_visible(&self) -> bool {
        self.driver.log().modal_visible
    }

    /// URLs surfaces were created for.
    pub fn opened(&self) -> Vec<String> {
        self.driver.log().opened
    }

    /// Raw posts to the surface.
    pub fn posted(&self) -> Vec<Posted> {
        self.driver.transport().posted()
    }

    /// Messages delivered to the surface, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.driver.transport().messages()
    }

    /// `resolveMethodCall` answers delivered to the surface.
    pub fn resolved_calls(&self) -> Vec<MethodCallResult> {
        self.sent()
            .into_iter()
            .filter_map(|message| match message {
                Message::ResolveMethodCall(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Chain query service.
    pub fn chain(&self) -> &SimChain {
        &self.chain
    }

    /// Installed capability, if any.
    pub fn capability(&self) -> Option<&SimCapability> {
        self.capability.as_ref()
    }

    /// Provider info of the installed capability, if any.
    pub fn wallet_name(&self) -> Option<String> {
        self.capability.as_ref().and_then(|capability| capability.info().name)
    }

    /// Errors returned by host operations during the run.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}
