//! Payload types, one module per concern.
//!
//! - [`checkout`]: lifecycle and purchase notifications from the surface
//! - [`provider`]: method calls and events relayed to the host capability

pub mod checkout;
pub mod provider;

pub use checkout::{Metadata, TransactionInfo, UserInfo};
pub use provider::{
    CapabilityFailure, EnableResult, EventNotification, JsonRpcResponse, MethodCall,
    MethodCallResult, Params, RequestId,
};
