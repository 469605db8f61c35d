//! Error types.
//!
//! Transport- and protocol-level errors are handled where they occur and never
//! cross the context boundary. Capability errors travel to the surface as
//! structured payloads via [`CapabilityError::to_failure`].

use std::time::Duration;

use paywall_proto::{CapabilityFailure, ProtocolError};
use thiserror::Error;

/// The platform refused to post a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Errors at the channel layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Event arrived from an origin other than the peer's
    #[error("message from {actual} rejected, expected origin {expected}")]
    UnexpectedOrigin {
        /// Origin the channel was established against
        expected: String,
        /// Origin the event carried
        actual: String,
    },

    /// Envelope could not be encoded or decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Transport failed to post
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors managing the surface connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// `open` called on a live connection
    #[error("connection already open to {0}")]
    AlreadyOpen(String),

    /// Operation needs an open connection
    #[error("connection is not open")]
    NotOpen,

    /// Surface URL has no usable origin
    #[error("invalid surface url {url}: {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Channel level failure
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Failures of the host's signing/query capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// No capability installed
    #[error("no capability installed")]
    Unavailable,

    /// Capability rejected the request
    #[error("capability rejected request ({code}): {message}")]
    Rejected {
        /// EIP-1193 error code
        code: i64,
        /// Reason given by the capability
        message: String,
    },

    /// No answer within the configured bound
    #[error("capability did not answer within {0:?}")]
    Timeout(Duration),

    /// Callback-style capability dropped the request without answering
    #[error("capability dropped the request")]
    Dropped,

    /// Capability does not offer this method or event
    #[error("capability does not support {0}")]
    Unsupported(String),
}

impl CapabilityError {
    /// EIP-1193 error code.
    pub fn code(&self) -> i64 {
        match self {
            Self::Rejected { code, .. } => *code,
            Self::Unavailable => 4900,
            Self::Unsupported(_) => 4200,
            Self::Timeout(_) | Self::Dropped => -32603,
        }
    }

    /// Wire form sent back to the surface.
    pub fn to_failure(&self) -> CapabilityFailure {
        let message = match self {
            Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        };
        CapabilityFailure { code: self.code(), message }
    }
}

/// Failures of a single key lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainQueryError {
    /// Neither the lock nor the config names a network
    #[error("lock {0} has no network")]
    MissingNetwork(String),

    /// Lock network has no RPC configuration
    #[error("network {0} is not configured")]
    UnknownNetwork(u64),

    /// The chain query service failed
    #[error("chain query failed: {0}")]
    Query(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_keeps_capability_code_and_message() {
        let failure =
            CapabilityError::Rejected { code: 4001, message: "User denied".into() }.to_failure();
        assert_eq!(failure, CapabilityFailure { code: 4001, message: "User denied".into() });
    }

    #[test]
    fn timeout_maps_to_internal_error() {
        let failure = CapabilityError::Timeout(Duration::from_secs(5)).to_failure();
        assert_eq!(failure.code, -32603);
        assert!(failure.message.contains("5s"));
    }
}
