//! Paywall and network configuration documents.
//!
//! A [`PaywallConfig`] is supplied by the host application and pushed to the
//! surface verbatim (plus provider metadata) in a `setConfig` message.
//! [`NetworkConfigs`] map a network id to the RPC endpoint and checkout
//! application serving it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network id to network configuration.
pub type NetworkConfigs = BTreeMap<u64, NetworkConfig>;

/// Default number of confirmations before a mined key counts as valid.
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u32 = 1;

fn default_required_confirmations() -> u32 {
    DEFAULT_REQUIRED_CONFIRMATIONS
}

/// Per-lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockConfig {
    /// Network the lock is deployed on; falls back to the config default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<u64>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Checkout copy, keyed by the situation it is shown in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToAction {
    /// Shown when no key is held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Shown when the key expired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired: Option<String>,
    /// Shown while a purchase is pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
    /// Shown once a purchase is confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<String>,
    /// Shown when no wallet is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_wallet: Option<String>,
    /// Shown above the metadata form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// A metadata field the checkout collects from the purchaser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataInput {
    /// Field name, unique within the config
    pub name: String,
    /// Input type (`text`, `email`, ...)
    #[serde(rename = "type")]
    pub input_type: String,
    /// Whether the field must be filled
    #[serde(default)]
    pub required: bool,
    /// Pre-filled value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Whether the value may be shown publicly
    #[serde(default)]
    pub public: bool,
}

/// Description of the installed signing/query capability.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderInfo {
    /// Wallet name, when the capability exposes one
    pub name: Option<String>,
}

/// Paywall configuration.
///
/// Treated as immutable once applied; replacing it goes through the
/// orchestrator, which re-sends the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaywallConfig {
    /// Lock address to lock configuration
    pub locks: BTreeMap<String, LockConfig>,
    /// Wait for confirmed keys instead of unlocking on a submitted purchase
    #[serde(default)]
    pub pessimistic: bool,
    /// Checkout copy
    #[serde(default)]
    pub call_to_action: CallToAction,
    /// Purchaser metadata to collect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_inputs: Option<Vec<MetadataInput>>,
    /// Default network for locks that do not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<u64>,
    /// Icon shown in the checkout header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Injected: whether the host supplies a capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_delegated_provider: Option<bool>,
    /// Injected: name of the host capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

impl PaywallConfig {
    /// Add a lock on `network`.
    #[must_use]
    pub fn with_lock(mut self, address: impl Into<String>, network: u64) -> Self {
        self.locks.insert(address.into(), LockConfig { network: Some(network), name: None });
        self
    }

    /// Set the pessimistic flag.
    #[must_use]
    pub fn with_pessimistic(mut self, pessimistic: bool) -> Self {
        self.pessimistic = pessimistic;
        self
    }

    /// Network a lock is checked on.
    pub fn network_for(&self, lock: &str) -> Option<u64> {
        self.locks.get(lock).and_then(|config| config.network).or(self.network)
    }

    /// Network whose checkout application serves this config: the explicit
    /// default, else the first lock that names one.
    pub fn default_network(&self) -> Option<u64> {
        self.network.or_else(|| self.locks.values().find_map(|config| config.network))
    }

    /// Re-derive the provider metadata from the installed capability.
    #[must_use]
    pub fn with_provider_info(mut self, info: Option<&ProviderInfo>) -> Self {
        self.use_delegated_provider = Some(info.is_some());
        self.provider_name = info.and_then(|info| info.name.clone());
        self
    }

    /// Check the config is loadable against `networks`.
    pub fn validate(&self, networks: &NetworkConfigs) -> Result<(), ConfigError> {
        if self.locks.is_empty() {
            return Err(ConfigError::NoLocks);
        }

        for lock in self.locks.keys() {
            if lock.trim().is_empty() {
                return Err(ConfigError::InvalidLock(lock.clone()));
            }
            let network =
                self.network_for(lock).ok_or_else(|| ConfigError::MissingNetwork(lock.clone()))?;
            if !networks.contains_key(&network) {
                return Err(ConfigError::UnknownNetwork { lock: lock.clone(), network });
            }
        }

        let mut names = BTreeSet::new();
        for input in self.metadata_inputs.iter().flatten() {
            if input.name.trim().is_empty() {
                return Err(ConfigError::InvalidMetadataInput("empty field name".to_string()));
            }
            if !names.insert(input.name.as_str()) {
                return Err(ConfigError::InvalidMetadataInput(format!(
                    "duplicate field {}",
                    input.name
                )));
            }
        }

        Ok(())
    }
}

/// RPC and checkout endpoints for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// JSON-RPC endpoint used for key lookups
    pub provider: String,
    /// Base URL of the checkout application
    pub unlock_app_url: String,
    /// Read-only endpoint, when distinct from `provider`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_provider: Option<String>,
    /// Confirmations before a mined key is valid
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u32,
}

impl NetworkConfig {
    /// Network served by `provider` with the checkout at `unlock_app_url`.
    pub fn new(provider: impl Into<String>, unlock_app_url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            unlock_app_url: unlock_app_url.into(),
            read_only_provider: None,
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
        }
    }

    /// Endpoint for read-only queries.
    pub fn query_endpoint(&self) -> &str {
        self.read_only_provider.as_deref().unwrap_or(&self.provider)
    }
}

/// Configuration problems that block the checkout from loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No locks configured
    #[error("paywall config has no locks")]
    NoLocks,

    /// Lock address is blank
    #[error("invalid lock address {0:?}")]
    InvalidLock(String),

    /// Neither the lock nor the config names a network
    #[error("lock {0} has no network")]
    MissingNetwork(String),

    /// Lock network has no network configuration
    #[error("lock {lock} is on network {network}, which is not configured")]
    UnknownNetwork {
        /// Lock address
        lock: String,
        /// Network id
        network: u64,
    },

    /// Metadata field is unusable
    #[error("invalid metadata input: {0}")]
    InvalidMetadataInput(String),

    /// No URL was given and no network provides a checkout application
    #[error("no checkout url could be derived from the config")]
    NoCheckoutUrl,
}
