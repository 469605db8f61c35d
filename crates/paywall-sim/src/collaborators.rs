//! Replay collaborators: everything the orchestrator touches is logged.

use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use paywall_app::{Driver, PageEvent};
use paywall_core::{
    aggregator::ChainQuery,
    error::{CapabilityError, ChainQueryError, TransportError},
    keys::KeyRecord,
    provider::Capability,
    transport::Transport,
};
use paywall_proto::{Message, MethodCall, NetworkConfig, ProviderInfo};
use serde_json::Value;

/// Transport logging every message posted to the surface.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn post(&mut self, data: String, target_origin: &str) -> Result<(), TransportError> {
        match Message::decode(data.as_bytes()) {
            Ok(message) => {
                tracing::info!(target_origin, kind = %message.kind(), %data, "-> surface");
            },
            Err(error) => tracing::warn!(target_origin, %error, "-> surface (undecodable)"),
        }
        Ok(())
    }
}

/// Host driver logging page operations.
#[derive(Debug, Clone, Default)]
pub struct LogDriver {
    opened: Arc<Mutex<Vec<String>>>,
}

impl LogDriver {
    /// URL of the most recently created surface.
    pub fn surface_url(&self) -> Option<String> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl Driver for LogDriver {
    type Transport = LogTransport;
    type Error = Infallible;

    fn open_surface(&mut self, url: &str) -> Result<LogTransport, Infallible> {
        tracing::info!(url, "surface created");
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_string());
        Ok(LogTransport)
    }

    fn show_modal(&mut self) {
        tracing::info!("modal shown");
    }

    fn hide_modal(&mut self) {
        tracing::info!("modal hidden");
    }

    fn dispatch_event(&mut self, event: &PageEvent) {
        tracing::info!(event = event.name(), detail = %event.detail(), "page event");
    }
}

/// Chain query service answering from key fixtures.
#[derive(Debug, Default)]
pub struct FixtureChain {
    keys: HashMap<(String, String), KeyRecord>,
}

impl FixtureChain {
    /// Chain holding `records`. Addresses match case-insensitively.
    pub fn new(records: Vec<KeyRecord>) -> Self {
        let keys = records
            .into_iter()
            .map(|record| ((record.lock.to_lowercase(), record.owner.to_lowercase()), record))
            .collect();
        Self { keys }
    }
}

#[async_trait]
impl ChainQuery for FixtureChain {
    async fn key_for(
        &self,
        lock: &str,
        owner: &str,
        network: u64,
        config: &NetworkConfig,
    ) -> Result<KeyRecord, ChainQueryError> {
        tracing::debug!(lock, owner, network, endpoint = config.query_endpoint(), "key lookup");
        let record = self.keys.get(&(lock.to_lowercase(), owner.to_lowercase())).cloned();
        Ok(record.unwrap_or_else(|| KeyRecord {
            lock: lock.to_string(),
            owner: owner.to_string(),
            ..KeyRecord::default()
        }))
    }
}

/// Capability answering method calls from a method-to-result table.
#[derive(Debug, Default)]
pub struct StaticCapability {
    responses: HashMap<String, Value>,
}

impl StaticCapability {
    /// Capability answering `responses`.
    pub fn new(responses: HashMap<String, Value>) -> Self {
        Self { responses }
    }
}

#[async_trait]
impl Capability for StaticCapability {
    fn info(&self) -> ProviderInfo {
        ProviderInfo { name: Some("paywall-sim".to_string()) }
    }

    async fn enable(&self) -> Result<Vec<String>, CapabilityError> {
        match self.responses.get("eth_accounts") {
            Some(Value::Array(accounts)) => {
                Ok(accounts.iter().filter_map(Value::as_str).map(str::to_string).collect())
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn request(&self, call: &MethodCall) -> Result<Value, CapabilityError> {
        self.responses
            .get(&call.method)
            .cloned()
            .ok_or_else(|| CapabilityError::Unsupported(call.method.clone()))
    }
}
