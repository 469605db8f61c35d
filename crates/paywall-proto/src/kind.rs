//! Message kinds.
//!
//! Kinds are grouped by the direction they travel in. The host only registers
//! handlers for [`Direction::ToHost`] kinds; a host-bound envelope carrying a
//! surface-bound kind finds no handler and is dropped.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Which side of the channel a kind is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Embedded surface to host page.
    ToHost,
    /// Host page to embedded surface.
    ToSurface,
}

/// Enumerated message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MessageKind {
    /// Surface finished loading and accepts messages.
    Handshake,
    /// User dismissed the checkout.
    CloseModal,
    /// Surface authenticated a user.
    UserInfo,
    /// Surface asks the host capability to execute a method.
    MethodCall,
    /// Surface subscribes to a capability event.
    OnEvent,
    /// Surface revokes a capability event subscription.
    OffEvent,
    /// Surface asks the host capability to enable itself.
    Enable,
    /// Surface collected purchaser metadata.
    Metadata,
    /// Surface submitted a purchase transaction.
    TransactionInfo,
    /// Host pushes the active paywall configuration.
    SetConfig,
    /// Host answers a `MethodCall`.
    ResolveMethodCall,
    /// Host relays a fired capability event.
    ResolveOnEvent,
    /// Host answers an `Enable`.
    ResolveOnEnable,
}

impl MessageKind {
    /// Every kind, surface-bound kinds last.
    pub const ALL: [Self; 13] = [
        Self::Handshake,
        Self::CloseModal,
        Self::UserInfo,
        Self::MethodCall,
        Self::OnEvent,
        Self::OffEvent,
        Self::Enable,
        Self::Metadata,
        Self::TransactionInfo,
        Self::SetConfig,
        Self::ResolveMethodCall,
        Self::ResolveOnEvent,
        Self::ResolveOnEnable,
    ];

    /// Name carried in the envelope `kind` field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::CloseModal => "checkout.closeModal",
            Self::UserInfo => "checkout.userInfo",
            Self::MethodCall => "checkout.methodCall",
            Self::OnEvent => "checkout.onEvent",
            Self::OffEvent => "checkout.offEvent",
            Self::Enable => "checkout.enable",
            Self::Metadata => "checkout.metadata",
            Self::TransactionInfo => "checkout.transactionInfo",
            Self::SetConfig => "setConfig",
            Self::ResolveMethodCall => "resolveMethodCall",
            Self::ResolveOnEvent => "resolveOnEvent",
            Self::ResolveOnEnable => "resolveOnEnable",
        }
    }

    /// Side this kind is delivered to.
    pub const fn direction(self) -> Direction {
        match self {
            Self::SetConfig
            | Self::ResolveMethodCall
            | Self::ResolveOnEvent
            | Self::ResolveOnEnable => Direction::ToSurface,
            _ => Direction::ToHost,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownKind(s.to_string()))
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for MessageKind {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
