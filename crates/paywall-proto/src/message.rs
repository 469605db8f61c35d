//! The closed message union and its JSON envelope.
//!
//! Decoding is two-step: the raw bytes must form an [`Envelope`] with a string
//! `kind`, then the `payload` must decode into the type bound to that kind.
//! Either failure yields a [`ProtocolError`]; nothing is partially decoded.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    MessageKind, PaywallConfig, ProtocolError, Result,
    payloads::{
        EnableResult, EventNotification, Metadata, MethodCall, MethodCallResult, TransactionInfo,
        UserInfo,
    },
};

/// Raw envelope as carried by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind name
    pub kind: String,
    /// Kind-specific payload; `null` for kinds without one
    #[serde(default)]
    pub payload: Value,
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Surface is ready
    Handshake,
    /// Surface wants the modal closed
    CloseModal,
    /// Surface authenticated a user
    UserInfo(UserInfo),
    /// Surface asks for a capability call
    MethodCall(MethodCall),
    /// Surface subscribes to a capability event
    OnEvent(String),
    /// Surface unsubscribes from a capability event
    OffEvent(String),
    /// Surface asks to enable the capability
    Enable,
    /// Surface reports purchaser metadata
    Metadata(Metadata),
    /// Surface reports a submitted purchase
    TransactionInfo(TransactionInfo),
    /// Host pushes its configuration
    SetConfig(PaywallConfig),
    /// Host answers a method call
    ResolveMethodCall(MethodCallResult),
    /// Host relays a capability event
    ResolveOnEvent(EventNotification),
    /// Host answers an enable request
    ResolveOnEnable(EnableResult),
}

impl Message {
    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Handshake => MessageKind::Handshake,
            Self::CloseModal => MessageKind::CloseModal,
            Self::UserInfo(_) => MessageKind::UserInfo,
            Self::MethodCall(_) => MessageKind::MethodCall,
            Self::OnEvent(_) => MessageKind::OnEvent,
            Self::OffEvent(_) => MessageKind::OffEvent,
            Self::Enable => MessageKind::Enable,
            Self::Metadata(_) => MessageKind::Metadata,
            Self::TransactionInfo(_) => MessageKind::TransactionInfo,
            Self::SetConfig(_) => MessageKind::SetConfig,
            Self::ResolveMethodCall(_) => MessageKind::ResolveMethodCall,
            Self::ResolveOnEvent(_) => MessageKind::ResolveOnEvent,
            Self::ResolveOnEnable(_) => MessageKind::ResolveOnEnable,
        }
    }

    /// Build the envelope for this message.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let kind = self.kind();
        let payload = match self {
            Self::Handshake | Self::CloseModal | Self::Enable => Ok(Value::Null),
            Self::UserInfo(info) => serde_json::to_value(info),
            Self::MethodCall(call) => serde_json::to_value(call),
            Self::OnEvent(event) | Self::OffEvent(event) => Ok(Value::String(event.clone())),
            Self::Metadata(metadata) => serde_json::to_value(metadata),
            Self::TransactionInfo(info) => serde_json::to_value(info),
            Self::SetConfig(config) => serde_json::to_value(config),
            Self::ResolveMethodCall(result) => serde_json::to_value(result),
            Self::ResolveOnEvent(notification) => serde_json::to_value(notification),
            Self::ResolveOnEnable(result) => serde_json::to_value(result),
        }
        .map_err(|e| ProtocolError::Encode { kind, reason: e.to_string() })?;

        Ok(Envelope { kind: kind.as_str().to_string(), payload })
    }

    /// Decode the typed message carried by `envelope`.
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let kind: MessageKind = envelope.kind.parse()?;
        let payload = envelope.payload;

        let message = match kind {
            MessageKind::Handshake => Self::Handshake,
            MessageKind::CloseModal => Self::CloseModal,
            MessageKind::Enable => Self::Enable,
            MessageKind::UserInfo => Self::UserInfo(decode_payload(kind, payload)?),
            MessageKind::MethodCall => Self::MethodCall(decode_payload(kind, payload)?),
            MessageKind::OnEvent => Self::OnEvent(decode_payload(kind, payload)?),
            MessageKind::OffEvent => Self::OffEvent(decode_payload(kind, payload)?),
            MessageKind::Metadata => Self::Metadata(decode_payload(kind, payload)?),
            MessageKind::TransactionInfo => Self::TransactionInfo(decode_payload(kind, payload)?),
            MessageKind::SetConfig => Self::SetConfig(decode_payload(kind, payload)?),
            MessageKind::ResolveMethodCall => {
                Self::ResolveMethodCall(decode_payload(kind, payload)?)
            },
            MessageKind::ResolveOnEvent => Self::ResolveOnEvent(decode_payload(kind, payload)?),
            MessageKind::ResolveOnEnable => Self::ResolveOnEnable(decode_payload(kind, payload)?),
        };

        Ok(message)
    }

    /// Encode to the JSON text posted over the transport.
    pub fn encode(&self) -> Result<String> {
        let envelope = self.to_envelope()?;
        serde_json::to_string(&envelope)
            .map_err(|e| ProtocolError::Encode { kind: self.kind(), reason: e.to_string() })
    }

    /// Decode raw transport data.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
        Self::from_envelope(envelope)
    }
}

fn decode_payload<T: DeserializeOwned>(kind: MessageKind, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::invalid(kind, e))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::payloads::CapabilityFailure;

    fn decode_value(value: &Value) -> Result<Message> {
        Message::decode(value.to_string().as_bytes())
    }

    #[test]
    fn decodes_transaction_info() {
        let message = decode_value(&json!({
            "kind": "checkout.transactionInfo",
            "payload": { "hash": "0xabc", "lock": "0xLock1" },
        }))
        .unwrap();
        assert_eq!(message, Message::TransactionInfo(TransactionInfo::new("0xabc", "0xLock1")));
    }

    #[test]
    fn unit_kinds_ignore_payload() {
        let message = decode_value(&json!({ "kind": "checkout.closeModal" })).unwrap();
        assert_eq!(message, Message::CloseModal);

        let message = decode_value(&json!({ "kind": "handshake", "payload": {"x": 1} })).unwrap();
        assert_eq!(message, Message::Handshake);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = decode_value(&json!({ "kind": "checkout.nope", "payload": null })).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownKind("checkout.nope".into()));
    }

    #[test]
    fn rejects_non_envelope_data() {
        assert!(matches!(Message::decode(b"not json"), Err(ProtocolError::MalformedEnvelope(_))));
        assert!(matches!(
            decode_value(&json!({ "payload": {} })),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decode_value(&json!("checkout.enable")),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn rejects_invalid_method_call() {
        let err = decode_value(&json!({
            "kind": "checkout.methodCall",
            "payload": { "method": "eth_sign", "params": "0x00", "id": 1 },
        }))
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { kind: MessageKind::MethodCall, .. }));
    }

    #[test]
    fn rejects_mistyped_user_info() {
        let err = decode_value(&json!({ "kind": "checkout.userInfo", "payload": { "address": 5 } }))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { kind: MessageKind::UserInfo, .. }));
    }

    #[test]
    fn encodes_resolve_method_call_envelope() {
        let message = Message::ResolveMethodCall(MethodCallResult::failure(
            Some(7),
            CapabilityFailure { code: 4001, message: "User rejected".into() },
        ));
        let encoded: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "kind": "resolveMethodCall",
                "payload": {
                    "id": 7,
                    "response": null,
                    "error": { "code": 4001, "message": "User rejected" },
                },
            })
        );
    }

    #[test]
    fn set_config_survives_the_wire() {
        let config = PaywallConfig::default().with_lock("0xLock1", 4).with_pessimistic(true);
        let message = Message::SetConfig(config);
        let decoded = Message::decode(message.encode().unwrap().as_bytes()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn error_messages_are_stable() {
        let err = decode_value(&json!({ "kind": "bogus" })).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"unknown message kind: bogus");
    }
}
