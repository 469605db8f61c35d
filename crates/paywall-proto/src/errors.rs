//! Protocol error types.

use thiserror::Error;

use crate::MessageKind;

/// Result alias for wire-level operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding envelopes.
///
/// None of these ever crosses the context boundary. Receivers log and drop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Raw data is not a JSON object with a string `kind`.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The `kind` field names no known message.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// The payload does not match the schema for its kind.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// Kind the payload was decoded for
        kind: MessageKind,
        /// What was wrong with it
        reason: String,
    },

    /// Serializing an outbound message failed.
    #[error("failed to encode {kind}: {reason}")]
    Encode {
        /// Kind being encoded
        kind: MessageKind,
        /// Serializer error
        reason: String,
    },
}

impl ProtocolError {
    pub(crate) fn invalid(kind: MessageKind, reason: impl ToString) -> Self {
        Self::InvalidPayload { kind, reason: reason.to_string() }
    }
}
