//! Method call validation accepts exactly the well-typed payloads.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paywall_proto::MethodCall;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let Ok(call) = MethodCall::from_value(&value) else {
        return;
    };

    assert_eq!(value.get("method").and_then(Value::as_str), Some(call.method.as_str()));
    match value.get("id") {
        None | Some(Value::Null) => assert_eq!(call.id, None),
        Some(id) => assert_eq!(id.as_number().and_then(serde_json::Number::as_i128), call.id),
    }
});
