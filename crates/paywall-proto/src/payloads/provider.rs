//! EIP-1193 style payloads relayed between the surface and the host capability.
//!
//! # Protocol Flow
//!
//! 1. Surface sends `methodCall {method, params, id}`
//! 2. Host forwards it to the signing/query capability
//! 3. Host answers with exactly one `resolveMethodCall {id, response, error}`
//!
//! A `methodCall` that fails validation never decodes, so it is never
//! answered.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC parameters. Scalars are not valid parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// Positional parameters
    Array(Vec<Value>),
    /// Named parameters
    Object(Map<String, Value>),
}

/// JSON-RPC request id. Wide enough for any integer id in the `i64` or
/// `u64` range.
pub type RequestId = i128;

/// Method call request from the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct MethodCall {
    /// RPC method name
    pub method: String,
    /// Optional parameters
    pub params: Option<Params>,
    /// Optional request id, echoed in the answer
    pub id: Option<RequestId>,
}

impl MethodCall {
    /// Build a call.
    pub fn new(method: impl Into<String>, params: Option<Params>, id: Option<RequestId>) -> Self {
        Self { method: method.into(), params, id }
    }

    /// Validate and decode a raw payload.
    ///
    /// `method` must be a string, `params` absent, null, an array or an object,
    /// and `id` absent, null or an integer.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let Value::Object(fields) = value else {
            return Err(format!("expected an object, got {}", json_type(value)));
        };

        let method = match fields.get("method") {
            Some(Value::String(method)) => method.clone(),
            Some(other) => return Err(format!("method must be a string, got {}", json_type(other))),
            None => return Err("method is missing".to_string()),
        };

        let params = match fields.get("params") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(Params::Array(items.clone())),
            Some(Value::Object(map)) => Some(Params::Object(map.clone())),
            Some(other) => {
                return Err(format!("params must be an array or object, got {}", json_type(other)));
            },
        };

        let id = match fields.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::Number(number)) => match number.as_i128() {
                Some(id) => Some(id),
                None => return Err(format!("id {number} is not an integer")),
            },
            Some(other) => return Err(format!("id must be an integer, got {}", json_type(other))),
        };

        Ok(Self { method, params, id })
    }
}

impl TryFrom<Value> for MethodCall {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

/// Error reported by the capability, in EIP-1193 `ProviderRpcError` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFailure {
    /// Numeric error code (4001 user rejected, 4100 unauthorized, ...)
    pub code: i64,
    /// Human readable message
    pub message: String,
}

/// JSON-RPC 2.0 success response wrapping a capability result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Request id
    pub id: Option<RequestId>,
    /// Method result
    pub result: Value,
}

impl JsonRpcResponse {
    /// Wrap `result` for request `id`.
    pub fn new(id: Option<RequestId>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result }
    }
}

/// Answer to a [`MethodCall`].
///
/// Exactly one of `response` and `error` is populated. The constructors are
/// the only way to build one, and decoding rejects envelopes that break the
/// rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMethodCallResult")]
pub struct MethodCallResult {
    id: Option<RequestId>,
    response: Option<JsonRpcResponse>,
    error: Option<CapabilityFailure>,
}

impl MethodCallResult {
    /// Successful answer carrying `result`.
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self { id, response: Some(JsonRpcResponse::new(id, result)), error: None }
    }

    /// Failed answer carrying `error`.
    pub fn failure(id: Option<RequestId>, error: CapabilityFailure) -> Self {
        Self { id, response: None, error: Some(error) }
    }

    /// Request id this answers.
    pub fn id(&self) -> Option<RequestId> {
        self.id
    }

    /// Response, on success.
    pub fn response(&self) -> Option<&JsonRpcResponse> {
        self.response.as_ref()
    }

    /// Error, on failure.
    pub fn error(&self) -> Option<&CapabilityFailure> {
        self.error.as_ref()
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.response.is_some()
    }
}

#[derive(Deserialize)]
struct RawMethodCallResult {
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    response: Option<JsonRpcResponse>,
    #[serde(default)]
    error: Option<CapabilityFailure>,
}

impl TryFrom<RawMethodCallResult> for MethodCallResult {
    type Error = String;

    fn try_from(raw: RawMethodCallResult) -> Result<Self, Self::Error> {
        match (&raw.response, &raw.error) {
            (Some(_), None) | (None, Some(_)) => {
                Ok(Self { id: raw.id, response: raw.response, error: raw.error })
            },
            _ => Err("exactly one of response and error must be set".to_string()),
        }
    }
}

/// A capability event relayed to the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotification {
    /// Event name the surface subscribed to
    pub event: String,
    /// Event arguments, if any
    #[serde(default)]
    pub data: Option<Value>,
}

/// Answer to an `enable` request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnableResult {
    /// Accounts exposed by the capability
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Failure, if enabling was refused
    #[serde(default)]
    pub error: Option<CapabilityFailure>,
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
