//! Wire format of the envelopes exchanged with the checkout surface.

use paywall_proto::{
    EventNotification, Message, MethodCall, MethodCallResult, Params, RequestId,
};
use proptest::prelude::*;
use serde_json::{Value, json};

#[test]
fn envelopes_encode_as_expected() {
    insta::assert_snapshot!(
        Message::Handshake.encode().unwrap(),
        @r#"{"kind":"handshake","payload":null}"#
    );

    let call = MethodCall::new(
        "eth_sign",
        Some(Params::Array(vec![json!("0xUser"), json!("0xdead")])),
        Some(3),
    );
    insta::assert_snapshot!(
        Message::MethodCall(call).encode().unwrap(),
        @r#"{"kind":"checkout.methodCall","payload":{"id":3,"method":"eth_sign","params":["0xUser","0xdead"]}}"#
    );

    let answer = MethodCallResult::success(Some(1), json!("0x4"));
    insta::assert_snapshot!(
        Message::ResolveMethodCall(answer).encode().unwrap(),
        @r#"{"kind":"resolveMethodCall","payload":{"error":null,"id":1,"response":{"id":1,"jsonrpc":"2.0","result":"0x4"}}}"#
    );

    let notification =
        EventNotification { event: "accountsChanged".into(), data: Some(json!(["0xA"])) };
    insta::assert_snapshot!(
        Message::ResolveOnEvent(notification).encode().unwrap(),
        @r#"{"kind":"resolveOnEvent","payload":{"data":["0xA"],"event":"accountsChanged"}}"#
    );
}

fn method_call(payload: &Value) -> Option<Message> {
    let envelope = json!({ "kind": "checkout.methodCall", "payload": payload });
    Message::decode(envelope.to_string().as_bytes()).ok()
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn well_typed_calls_decode(
        method in "[a-zA-Z_0-9]{1,24}",
        id in proptest::option::of(any::<i64>()),
        positional in any::<bool>(),
    ) {
        let params = if positional { json!(["0xUser", 1]) } else { json!({ "to": "0xLock" }) };
        let payload = json!({ "method": method, "params": params, "id": id });
        match method_call(&payload) {
            Some(Message::MethodCall(call)) => {
                prop_assert_eq!(call.method, method);
                prop_assert_eq!(call.id, id.map(RequestId::from));
                prop_assert!(call.params.is_some());
            },
            other => prop_assert!(false, "expected a method call, got {:?}", other),
        }
    }

    #[test]
    fn scalar_params_never_decode(method in "[a-z_]{1,16}", params in scalar()) {
        let payload = json!({ "method": method, "params": params, "id": 1 });
        prop_assert!(method_call(&payload).is_none());
    }

    #[test]
    fn non_string_methods_never_decode(method in scalar(), id in any::<i64>()) {
        prop_assume!(!method.is_string());
        let payload = json!({ "method": method, "id": id });
        prop_assert!(method_call(&payload).is_none());
    }

    #[test]
    fn non_integer_ids_never_decode(method in "[a-z_]{1,16}", id in "[0-9]{1,6}") {
        let payload = json!({ "method": method, "id": id });
        prop_assert!(method_call(&payload).is_none());
    }
}
