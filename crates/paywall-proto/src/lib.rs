//! Wire format for the paywall checkout protocol.
//!
//! The host page and the embedded checkout surface exchange JSON envelopes of
//! the shape `{ "kind": <message kind>, "payload": <kind-specific value> }`.
//! Every kind maps to exactly one statically typed payload, so a decoded
//! [`Message`] is never partially typed: an envelope either decodes into a
//! complete variant or is rejected with a [`ProtocolError`].
//!
//! This crate also carries the configuration documents both sides agree on
//! ([`PaywallConfig`] and [`NetworkConfigs`]) together with their validation.
//!
//! # Security
//!
//! The embedded surface is a separate origin and is not trusted. Payload
//! validation happens during decoding, before anything reaches a handler; in
//! particular a `methodCall` whose `method`, `params` or `id` has the wrong
//! shape never decodes.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod errors;
pub mod kind;
pub mod message;
pub mod payloads;

pub use config::{
    CallToAction, ConfigError, LockConfig, MetadataInput, NetworkConfig, NetworkConfigs,
    PaywallConfig, ProviderInfo,
};
pub use errors::{ProtocolError, Result};
pub use kind::{Direction, MessageKind};
pub use message::{Envelope, Message};
pub use payloads::{
    CapabilityFailure, EnableResult, EventNotification, JsonRpcResponse, Metadata, MethodCall,
    MethodCallResult, Params, RequestId, TransactionInfo, UserInfo,
};
