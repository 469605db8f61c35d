//! Capability forwarding: method calls, enable and event listeners.
//!
//! Every decoded method call is answered exactly once, whatever the
//! capability does. Calls that fail validation are never answered.

use std::time::Duration;

use paywall_app::PaywallSettings;
use paywall_core::error::CapabilityError;
use paywall_harness::{
    SimCapability,
    scenario::{Scenario, Step, oracle},
};
use paywall_proto::{
    EnableResult, EventNotification, Message, MethodCall, Params, RequestId,
};
use serde_json::json;

const LOCK: &str = "0xLock1";

fn call(method: &str, id: RequestId) -> Message {
    Message::MethodCall(MethodCall::new(method, Some(Params::Array(Vec::new())), Some(id)))
}

fn wallet() -> SimCapability {
    let capability = SimCapability::default();
    capability
        .respond("eth_accounts", Ok(json!(["0xUser"])))
        .respond(
            "eth_sendTransaction",
            Err(CapabilityError::Rejected { code: 4001, message: "User rejected".into() }),
        )
        .accounts(&["0xUser"]);
    capability
}

fn ready(scenario: Scenario) -> Scenario {
    scenario.lock(LOCK).load_checkout().handshake()
}

#[test]
fn every_call_is_answered_once() {
    let result = ready(Scenario::new("answered once").capability(wallet()))
        .surface(call("eth_accounts", 1))
        .surface(call("eth_accounts", 2))
        .surface(call("eth_sendTransaction", 3))
        .settle()
        .oracle(oracle::all_of(vec![
            oracle::resolved_exactly_once(vec![Some(1), Some(2), Some(3)]),
            Box::new(|world| {
                let answers = world.resolved_calls();
                let success = answers.iter().find(|r| r.id() == Some(1)).ok_or("no answer 1")?;
                assert_eq!(success.response().map(|r| &r.result), Some(&json!(["0xUser"])));
                assert_eq!(success.response().map(|r| r.jsonrpc.as_str()), Some("2.0"));

                let failure = answers.iter().find(|r| r.id() == Some(3)).ok_or("no answer 3")?;
                let error = failure.error().ok_or("answer 3 should be an error")?;
                assert_eq!((error.code, error.message.as_str()), (4001, "User rejected"));
                assert_eq!(world.paywall().pending_calls(), 0);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn reused_ids_are_answered_per_call() {
    let result = ready(Scenario::new("reused ids").capability(wallet()))
        .surface(call("eth_accounts", 7))
        .surface(call("eth_accounts", 7))
        .settle()
        .oracle(Box::new(|world| {
            let ids: Vec<_> = world.resolved_calls().iter().map(|r| r.id()).collect();
            assert_eq!(ids, vec![Some(7), Some(7)]);
            assert_eq!(world.capability().map(|c| c.calls().len()), Some(2));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn missing_capability_is_reported_to_surface() {
    let result = ready(Scenario::new("no capability"))
        .surface(call("eth_accounts", 1))
        .settle()
        .oracle(oracle::all_of(vec![
            oracle::resolved_exactly_once(vec![Some(1)]),
            Box::new(|world| {
                let answer = &world.resolved_calls()[0];
                assert_eq!(answer.error().map(|e| e.code), Some(4900));
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn unanswered_call_times_out() {
    let capability = wallet();
    capability.hang("eth_signTypedData_v4");
    let settings = PaywallSettings {
        call_timeout: Some(Duration::from_secs(5)),
        ..PaywallSettings::default()
    };

    let result = ready(Scenario::new("timeout").capability(capability).settings(settings))
        .surface(call("eth_signTypedData_v4", 9))
        .settle()
        .oracle(oracle::all_of(vec![
            oracle::resolved_exactly_once(vec![Some(9)]),
            Box::new(|world| {
                let answer = &world.resolved_calls()[0];
                assert_eq!(answer.error().map(|e| e.code), Some(-32603));
                assert_eq!(world.paywall().pending_calls(), 0);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn answers_wait_for_handshake() {
    let result = Scenario::new("answer before ready")
        .lock(LOCK)
        .capability(wallet())
        .load_checkout()
        .surface(call("eth_accounts", 1))
        .settle()
        .oracle(Box::new(|world| {
            assert!(world.resolved_calls().is_empty());
            assert_eq!(world.capability().map(|c| c.calls().len()), Some(1));
            Ok(())
        }))
        .run();
    assert!(result.is_ok(), "scenario failed: {result:?}");

    let result = Scenario::new("answer after ready")
        .lock(LOCK)
        .capability(wallet())
        .load_checkout()
        .surface(call("eth_accounts", 1))
        .settle()
        .handshake()
        .oracle(oracle::resolved_exactly_once(vec![Some(1)]))
        .run();
    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn invalid_calls_are_never_answered() {
    let invalid = [
        r#"{"kind":"checkout.methodCall","payload":{"method":5,"id":1}}"#,
        r#"{"kind":"checkout.methodCall","payload":{"id":2}}"#,
        r#"{"kind":"checkout.methodCall","payload":{"method":"eth_accounts","params":"x","id":3}}"#,
        r#"{"kind":"checkout.methodCall","payload":{"method":"eth_accounts","id":"4"}}"#,
        r#"{"kind":"checkout.methodCall","payload":"eth_accounts"}"#,
        "not json at all",
    ];
    let scenario = invalid
        .into_iter()
        .fold(ready(Scenario::new("invalid calls").capability(wallet())), |scenario, raw| {
            scenario.step(Step::Raw(raw.to_string()))
        });

    let result = scenario
        .settle()
        .oracle(Box::new(|world| {
            assert!(world.resolved_calls().is_empty());
            assert_eq!(world.capability().map(|c| c.calls().len()), Some(0));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn unsigned_64_bit_id_is_answered() {
    let raw = r#"{"kind":"checkout.methodCall","payload":{"method":"eth_accounts","id":9223372036854775808}}"#;
    let result = ready(Scenario::new("u64 id").capability(wallet()))
        .step(Step::Raw(raw.to_string()))
        .settle()
        .oracle(Box::new(|world| {
            let id = RequestId::from(9_223_372_036_854_775_808_u64);
            let answers = world.resolved_calls();
            assert_eq!(answers.len(), 1);
            assert_eq!(answers[0].id(), Some(id));
            assert!(answers[0].is_success());

            let posted = world.posted();
            let last = posted.last().ok_or("nothing posted")?;
            assert!(last.data.contains(r#""id":9223372036854775808"#), "{}", last.data);
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn capability_is_enabled_before_first_call() {
    let result = ready(Scenario::new("lazy enable").capability(wallet()))
        .surface(call("eth_accounts", 1))
        .settle()
        .surface(call("eth_accounts", 2))
        .settle()
        .oracle(oracle::all_of(vec![
            oracle::resolved_exactly_once(vec![Some(1), Some(2)]),
            Box::new(|world| {
                let capability = world.capability().ok_or("no capability")?;
                assert_eq!(capability.enables(), 1);
                assert_eq!(capability.calls().len(), 2);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn refused_enable_answers_the_call() {
    let refusing = wallet();
    refusing.refuse_enable(CapabilityError::Rejected { code: 4001, message: "nope".into() });

    let result = ready(Scenario::new("enable refused before call").capability(refusing))
        .surface(call("eth_accounts", 1))
        .settle()
        .oracle(oracle::all_of(vec![
            oracle::resolved_exactly_once(vec![Some(1)]),
            Box::new(|world| {
                let answer = &world.resolved_calls()[0];
                assert_eq!(answer.error().map(|e| e.code), Some(4001));
                assert_eq!(world.capability().map(|c| c.calls().len()), Some(0));
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn enable_reports_accounts() {
    let refusing = wallet();
    refusing.refuse_enable(CapabilityError::Rejected { code: 4001, message: "nope".into() });

    let result = ready(Scenario::new("enable").capability(wallet()))
        .surface(Message::Enable)
        .settle()
        .oracle(Box::new(|world| {
            assert_eq!(
                world.sent().last(),
                Some(&Message::ResolveOnEnable(EnableResult {
                    accounts: vec!["0xUser".into()],
                    error: None,
                }))
            );
            Ok(())
        }))
        .run();
    assert!(result.is_ok(), "scenario failed: {result:?}");

    let result = ready(Scenario::new("enable refused").capability(refusing))
        .surface(Message::Enable)
        .settle()
        .oracle(Box::new(|world| match world.sent().last() {
            Some(Message::ResolveOnEnable(EnableResult { accounts, error: Some(error) })) => {
                assert!(accounts.is_empty());
                assert_eq!(error.code, 4001);
                Ok(())
            },
            other => Err(format!("expected a refused enable, got {other:?}")),
        }))
        .run();
    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn events_are_relayed_until_revoked() {
    let result = ready(Scenario::new("events").capability(wallet()))
        .surface(Message::OnEvent("accountsChanged".into()))
        .surface(Message::OnEvent("accountsChanged".into()))
        .step(Step::Emit { event: "accountsChanged".into(), data: json!(["0xOther"]) })
        .settle()
        .surface(Message::OffEvent("accountsChanged".into()))
        .step(Step::Emit { event: "accountsChanged".into(), data: json!(["0xThird"]) })
        .settle()
        .oracle(Box::new(|world| {
            let relayed: Vec<_> = world
                .sent()
                .into_iter()
                .filter_map(|message| match message {
                    Message::ResolveOnEvent(notification) => Some(notification),
                    _ => None,
                })
                .collect();
            assert_eq!(
                relayed,
                vec![EventNotification {
                    event: "accountsChanged".into(),
                    data: Some(json!(["0xOther"])),
                }]
            );
            assert_eq!(world.capability().map(|c| c.listeners("accountsChanged")), Some(0));
            assert!(world.paywall().listening().is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn replacing_capability_drops_listeners() {
    let original = wallet();
    let result = ready(Scenario::new("replace capability").capability(original.clone()))
        .surface(Message::OnEvent("chainChanged".into()))
        .step(Step::Connect(Some(wallet())))
        .settle()
        .oracle(Box::new(move |world| {
            assert_eq!(original.listeners("chainChanged"), 0);
            assert!(world.paywall().listening().is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn close_abandons_everything() {
    let capability = wallet();
    capability.hang("eth_sign");

    let result = ready(Scenario::new("close").capability(capability.clone()))
        .surface(Message::OnEvent("accountsChanged".into()))
        .surface(call("eth_sign", 1))
        .step(Step::Close)
        .settle()
        .surface(call("eth_accounts", 2))
        .settle()
        .oracle(Box::new(move |world| {
            assert!(world.resolved_calls().is_empty());
            assert_eq!(world.paywall().pending_calls(), 0);
            assert_eq!(capability.listeners("accountsChanged"), 0);
            assert!(!world.modal_visible());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}
