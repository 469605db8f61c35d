//! Scriptable signing/query capabilities.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use futures::{
    channel::mpsc,
    future,
    stream::{BoxStream, StreamExt},
};
use paywall_core::{
    error::CapabilityError,
    provider::{Callback, Capability, SendAsync},
};
use paywall_proto::{MethodCall, ProviderInfo};
use serde_json::Value;

use crate::lock;

/// Wallet name reported by [`SimCapability`].
pub const SIM_WALLET: &str = "sim-wallet";

#[derive(Debug, Default)]
struct CapabilityState {
    responses: HashMap<String, Result<Value, CapabilityError>>,
    hanging: HashSet<String>,
    calls: Vec<MethodCall>,
    accounts: Vec<String>,
    enable_error: Option<CapabilityError>,
    enables: usize,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
}

/// Request-style capability with scripted answers. Clones share the script.
///
/// Unscripted methods fail with [`CapabilityError::Unsupported`].
#[derive(Debug, Clone, Default)]
pub struct SimCapability {
    state: Arc<Mutex<CapabilityState>>,
}

impl SimCapability {
    /// Answer `method` with `result`.
    pub fn respond(&self, method: &str, result: Result<Value, CapabilityError>) -> &Self {
        lock(&self.state).responses.insert(method.to_string(), result);
        self
    }

    /// Never answer `method`.
    pub fn hang(&self, method: &str) -> &Self {
        lock(&self.state).hanging.insert(method.to_string());
        self
    }

    /// Accounts exposed on enable.
    pub fn accounts(&self, accounts: &[&str]) -> &Self {
        lock(&self.state).accounts = accounts.iter().map(ToString::to_string).collect();
        self
    }

    /// Refuse enable requests with `error`.
    pub fn refuse_enable(&self, error: CapabilityError) -> &Self {
        lock(&self.state).enable_error = Some(error);
        self
    }

    /// Enable requests received so far.
    pub fn enables(&self) -> usize {
        lock(&self.state).enables
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<MethodCall> {
        lock(&self.state).calls.clone()
    }

    /// Fire `event` to its live listeners. Returns how many received it.
    pub fn emit(&self, event: &str, data: Value) -> usize {
        let mut state = lock(&self.state);
        let Some(senders) = state.subscribers.get_mut(event) else {
            return 0;
        };
        senders.retain(|sender| sender.unbounded_send(data.clone()).is_ok());
        senders.len()
    }

    /// Live listeners on `event`.
    pub fn listeners(&self, event: &str) -> usize {
        lock(&self.state)
            .subscribers
            .get(event)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }
}

#[async_trait]
impl Capability for SimCapability {
    fn info(&self) -> ProviderInfo {
        ProviderInfo { name: Some(SIM_WALLET.to_string()) }
    }

    async fn enable(&self) -> Result<Vec<String>, CapabilityError> {
        let mut state = lock(&self.state);
        state.enables += 1;
        match &state.enable_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.accounts.clone()),
        }
    }

    async fn request(&self, call: &MethodCall) -> Result<Value, CapabilityError> {
        let answer = {
            let mut state = lock(&self.state);
            state.calls.push(call.clone());
            if state.hanging.contains(&call.method) {
                None
            } else {
                Some(
                    state
                        .responses
                        .get(&call.method)
                        .cloned()
                        .unwrap_or_else(|| Err(CapabilityError::Unsupported(call.method.clone()))),
                )
            }
        };

        match answer {
            Some(answer) => answer,
            None => future::pending().await,
        }
    }

    fn subscribe(&self, event: &str) -> Result<BoxStream<'static, Value>, CapabilityError> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.state).subscribers.entry(event.to_string()).or_default().push(tx);
        Ok(rx.boxed())
    }
}

/// Behavior of [`SimCallbackProvider`] for every call.
#[derive(Debug, Clone)]
pub enum CallbackBehavior {
    /// Invoke the callback with this outcome
    Answer(Result<Value, CapabilityError>),
    /// Drop the callback without invoking it
    Drop,
}

/// Callback-style provider answering every call the same way.
#[derive(Debug, Clone)]
pub struct SimCallbackProvider {
    behavior: CallbackBehavior,
}

impl SimCallbackProvider {
    /// Provider invoking every callback with `result`.
    pub fn answering(result: Result<Value, CapabilityError>) -> Self {
        Self { behavior: CallbackBehavior::Answer(result) }
    }

    /// Provider dropping every callback.
    pub fn dropping() -> Self {
        Self { behavior: CallbackBehavior::Drop }
    }
}

impl SendAsync for SimCallbackProvider {
    fn send_async(&self, call: &MethodCall, callback: Callback) {
        match &self.behavior {
            CallbackBehavior::Answer(result) => callback(result.clone()),
            CallbackBehavior::Drop => {
                tracing::debug!(method = %call.method, "dropping callback");
                drop(callback);
            },
        }
    }
}
