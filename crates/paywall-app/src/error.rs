//! Orchestrator errors surfaced to the host application.

use paywall_core::error::ConnectionError;
use paywall_proto::ConfigError;
use thiserror::Error;

/// Failures of host-facing paywall operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaywallError {
    /// Config is missing or invalid; the checkout is not loaded
    #[error("invalid paywall config: {0}")]
    Configuration(#[from] ConfigError),

    /// Surface connection failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Host driver could not create the surface
    #[error("failed to create checkout surface: {0}")]
    Surface(String),
}
