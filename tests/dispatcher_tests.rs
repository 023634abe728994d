//! Dispatcher Test Suite: the page ↔ device contract
//!
//! 1. Context is echoed for every action and outcome
//! 2. Foreign targets and unknown actions get no response
//! 3. Forwarding: operation tag, raw hash, default path
//! 4. Handle reuse, retry after failure, reset on disconnect
//! 5. Concurrent requests answer out of order; dispose stops intake

mod common;

use common::{Call, Device};
use futures::channel::mpsc;
use futures::executor::{block_on, LocalPool};
use futures::task::LocalSpawnExt;
use futures::StreamExt;
use ledger_bridge::{
    Action, BridgeError, Dispatcher, HandleState, Inbound, Outcome, RecordingOutbox, Response, BRIDGE_TARGET,
};
use serde_json::{json, Value};
use std::rc::Rc;

type TestDispatcher = Dispatcher<common::FakeConnector, RecordingOutbox<Value>>;

fn dispatcher(device: &Rc<Device>) -> Rc<TestDispatcher> {
    Rc::new(Dispatcher::new(device.connector(), RecordingOutbox::new()))
}

fn request(action: &str, params: Value, context: Value) -> Value {
    json!({"target": BRIDGE_TARGET, "action": action, "params": params, "context": context})
}

/// Feed raw window messages through the same filter a host applies
fn deliver(d: &Rc<TestDispatcher>, messages: Vec<Value>) -> Vec<Response<Value>> {
    let inbound = futures::stream::iter(messages).filter_map(|m| async move { Inbound::from_json(BRIDGE_TARGET, &m) });
    let (_subscription, run) = d.subscribe(inbound);
    block_on(run);
    d.outbox().posted()
}

fn payload(r: &Response<Value>) -> &Value {
    match &r.outcome {
        Outcome::Payload(p) => p,
        Outcome::Error(e) => panic!("expected payload, got error {:?}", e),
    }
}

fn error_name(r: &Response<Value>) -> String {
    match &r.outcome {
        Outcome::Error(e) => e.name.clone(),
        Outcome::Payload(p) => panic!("expected error, got payload {}", p),
    }
}

// ============================================================================
// Test 1: Context echo
// ============================================================================

#[test]
fn context_is_echoed_for_every_action() {
    let device = Device::new();
    let d = dispatcher(&device);

    let contexts = [json!("str-ctx"), json!(42), json!({"id": "abc", "nested": [1, 2, {"x": null}]}), json!(null)];
    let messages = vec![
        request("getAddress", json!({}), contexts[0].clone()),
        request("signTransaction", json!({"operation": "abc123"}), contexts[1].clone()),
        request("signHash", json!({"hash": "deadbeef"}), contexts[2].clone()),
        request("getVersion", json!({}), contexts[3].clone()),
    ];
    let posted = deliver(&d, messages);

    assert_eq!(posted.len(), 4);
    for (response, context) in posted.iter().zip(contexts.iter()) {
        assert_eq!(&response.context, context);
        assert!(!response.outcome.is_error());
    }
}

#[test]
fn context_is_echoed_on_failure() {
    let device = Device::new();
    device.fail_calls_with(BridgeError::device("TransportStatusError", "Conditions of use not satisfied", Some(0x6985)));
    let d = dispatcher(&device);

    let ctx = json!({"request": 7, "tag": "sign"});
    let posted = deliver(&d, vec![request("signHash", json!({"hash": "00ff"}), ctx.clone())]);

    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].context, ctx);
    assert_eq!(posted[0].action, Action::SignHash);
    assert_eq!(error_name(&posted[0]), "TransportStatusError");

    let wire = serde_json::to_value(&posted[0]).unwrap();
    assert_eq!(wire["error"]["statusCode"], 0x6985);
    assert_eq!(wire["context"], ctx);
}

// ============================================================================
// Test 2: Silence for anything not ours
// ============================================================================

#[test]
fn foreign_target_gets_no_response() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(
        &d,
        vec![
            json!({"target": "SOME-OTHER-BRIDGE", "action": "getAddress", "context": 1}),
            json!({"action": "getAddress", "context": 2}),
            json!("hello"),
        ],
    );

    assert!(posted.is_empty());
    assert_eq!(device.connects.get(), 0);
}

#[test]
fn unknown_action_is_ignored() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(
        &d,
        vec![request("exportPrivateKey", json!({}), json!(1)), request("getVersion", json!({}), json!(2))],
    );

    // the bridge keeps working after the unknown action
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].context, json!(2));
}

// ============================================================================
// Test 3: Forwarding
// ============================================================================

#[test]
fn sign_transaction_prepends_operation_tag() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(&d, vec![request("signTransaction", json!({"operation": "abc123"}), json!("t"))]);

    assert_eq!(device.calls(), vec![Call::SignOperation { path: "44'/1729'/0'/0'".into(), payload: "03abc123".into() }]);
    assert_eq!(payload(&posted[0]), &json!("sig:03abc123"));
}

#[test]
fn sign_hash_forwards_unmodified() {
    let device = Device::new();
    let d = dispatcher(&device);

    let hash = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";
    let posted = deliver(&d, vec![request("signHash", json!({"hash": hash, "derivationPath": "44'/1729'/1'/0'"}), json!("h"))]);

    assert_eq!(device.calls(), vec![Call::SignHash { path: "44'/1729'/1'/0'".into(), hash: hash.into() }]);
    assert_eq!(payload(&posted[0]), &json!(format!("sig:{}", hash)));
}

#[test]
fn default_path_when_omitted() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(
        &d,
        vec![request("getAddress", json!({}), json!(1)), request("getAddress", Value::Null, json!(2))],
    );

    assert_eq!(
        device.calls(),
        vec![
            Call::GetAddress { path: "44'/1729'/0'/0'".into(), confirm: true },
            Call::GetAddress { path: "44'/1729'/0'/0'".into(), confirm: true },
        ]
    );
    assert_eq!(payload(&posted[0]), &json!("edpk:44'/1729'/0'/0'"));
}

#[test]
fn get_version_returns_descriptor() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(&d, vec![request("getVersion", json!({}), json!("v"))]);
    assert_eq!(payload(&posted[0]), &json!({"major": 2, "minor": 3, "patch": 1, "bakingApp": false}));
}

#[test]
fn get_version_ignores_junk_params() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(
        &d,
        vec![
            request("getVersion", json!("x"), json!(1)),
            request("getVersion", json!({"derivationPath": "bogus"}), json!(2)),
            request("getVersion", json!({"operation": 5}), json!(3)),
        ],
    );

    assert_eq!(posted.len(), 3);
    for r in &posted {
        assert_eq!(payload(r), &json!({"major": 2, "minor": 3, "patch": 1, "bakingApp": false}));
    }
    assert_eq!(device.calls(), vec![Call::GetVersion, Call::GetVersion, Call::GetVersion]);
}

#[test]
fn unrelated_params_do_not_fail_signing() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(&d, vec![request("signHash", json!({"hash": "00ff", "operation": 5}), json!("h"))]);

    assert_eq!(payload(&posted[0]), &json!("sig:00ff"));
}

#[test]
fn invalid_params_never_reach_device() {
    let device = Device::new();
    let d = dispatcher(&device);

    let posted = deliver(
        &d,
        vec![
            request("signTransaction", json!({}), json!(1)),
            request("signHash", json!({"hash": "not-hex"}), json!(2)),
            request("getAddress", json!({"derivationPath": "44'/oops"}), json!(3)),
        ],
    );

    assert_eq!(posted.len(), 3);
    for r in &posted {
        assert_eq!(error_name(r), "InvalidParams");
    }
    assert_eq!(device.connects.get(), 0);
    assert!(device.calls().is_empty());
}

// ============================================================================
// Test 4: Handle lifecycle
// ============================================================================

#[test]
fn handle_is_acquired_once() {
    let device = Device::new();
    let d = dispatcher(&device);

    block_on(d.dispatch(Inbound { action: Action::GetVersion, params: Value::Null, context: json!(1) }));
    block_on(d.dispatch(Inbound { action: Action::GetAddress, params: Value::Null, context: json!(2) }));

    assert_eq!(device.connects.get(), 1);
    assert_eq!(d.handle().attempts(), 1);
    assert_eq!(d.handle().state(), HandleState::Ready);
    assert_eq!(d.outbox().len(), 2);
}

#[test]
fn failed_acquisition_is_retried_by_next_request() {
    let device = Device::new();
    device.fail_next_connects(1);
    let d = dispatcher(&device);

    let posted = deliver(
        &d,
        vec![request("getAddress", json!({}), json!("first")), request("getAddress", json!({}), json!("second"))],
    );

    assert_eq!(error_name(&posted[0]), "TransportError");
    assert_eq!(posted[0].context, json!("first"));
    assert!(!posted[1].outcome.is_error());
    assert_eq!(device.connects.get(), 2);
    assert_eq!(d.handle().state(), HandleState::Ready);
}

#[test]
fn disconnect_resets_handle() {
    let device = Device::new();
    let d = dispatcher(&device);

    block_on(d.dispatch(Inbound { action: Action::GetVersion, params: Value::Null, context: json!(1) }));
    device.fail_calls_with(BridgeError::Disconnected("usb unplugged".into()));
    block_on(d.dispatch(Inbound { action: Action::GetVersion, params: Value::Null, context: json!(2) }));
    assert_eq!(d.handle().state(), HandleState::Uninitialized);

    device.heal();
    block_on(d.dispatch(Inbound { action: Action::GetVersion, params: Value::Null, context: json!(3) }));

    assert_eq!(device.connects.get(), 2);
    let posted = d.outbox().posted();
    assert_eq!(error_name(&posted[1]), "Disconnected");
    assert!(!posted[2].outcome.is_error());
}

#[test]
fn device_rejection_keeps_handle() {
    let device = Device::new();
    device.fail_calls_with(BridgeError::device("TransportStatusError", "denied by user", Some(0x6985)));
    let d = dispatcher(&device);

    block_on(d.dispatch(Inbound { action: Action::SignHash, params: json!({"hash": "00"}), context: json!(1) }));
    block_on(d.dispatch(Inbound { action: Action::SignHash, params: json!({"hash": "00"}), context: json!(2) }));

    assert_eq!(device.connects.get(), 1);
    assert_eq!(d.handle().state(), HandleState::Ready);
}

// ============================================================================
// Test 5: Concurrency and subscription lifetime
// ============================================================================

#[test]
fn concurrent_requests_answer_out_of_order() {
    let device = Device::new();
    let d = dispatcher(&device);
    let release = device.gate("signOperation");

    let (tx, rx) = mpsc::unbounded();
    let (_subscription, run) = d.subscribe(rx);
    let mut pool = LocalPool::new();
    pool.spawner().spawn_local(run).unwrap();

    tx.unbounded_send(Inbound { action: Action::SignTransaction, params: json!({"operation": "aa"}), context: json!("slow") }).unwrap();
    tx.unbounded_send(Inbound { action: Action::GetVersion, params: Value::Null, context: json!("fast") }).unwrap();
    pool.run_until_stalled();

    let posted = d.outbox().posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].context, json!("fast"));

    release.send(()).unwrap();
    pool.run_until_stalled();

    let posted = d.outbox().posted();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1].context, json!("slow"));
    assert_eq!(posted[1].action, Action::SignTransaction);
    // both requests shared one handle
    assert_eq!(device.connects.get(), 1);
}

#[test]
fn late_disconnect_from_replaced_app_keeps_new_handle() {
    let device = Device::new();
    let d = dispatcher(&device);
    let release_first = device.gate("signOperation");
    let release_second = device.gate("signHash");

    let (tx, rx) = mpsc::unbounded();
    let (_subscription, run) = d.subscribe(rx);
    let mut pool = LocalPool::new();
    pool.spawner().spawn_local(run).unwrap();

    // two requests in flight on the first app
    tx.unbounded_send(Inbound { action: Action::SignTransaction, params: json!({"operation": "aa"}), context: json!("a") }).unwrap();
    tx.unbounded_send(Inbound { action: Action::SignHash, params: json!({"hash": "bb"}), context: json!("b") }).unwrap();
    pool.run_until_stalled();
    assert_eq!(device.connects.get(), 1);

    // the first one sees the drop and resets
    device.fail_calls_with(BridgeError::Disconnected("usb unplugged".into()));
    release_first.send(()).unwrap();
    pool.run_until_stalled();
    assert_eq!(d.handle().state(), HandleState::Uninitialized);

    // a new request reconnects
    device.heal();
    tx.unbounded_send(Inbound { action: Action::GetVersion, params: Value::Null, context: json!("c") }).unwrap();
    pool.run_until_stalled();
    assert_eq!(device.connects.get(), 2);
    assert_eq!(d.handle().state(), HandleState::Ready);

    // the old app's second failure arrives late
    device.fail_calls_with(BridgeError::Disconnected("usb unplugged".into()));
    release_second.send(()).unwrap();
    pool.run_until_stalled();
    assert_eq!(d.handle().state(), HandleState::Ready);

    device.heal();
    tx.unbounded_send(Inbound { action: Action::GetVersion, params: Value::Null, context: json!("d") }).unwrap();
    pool.run_until_stalled();

    assert_eq!(device.connects.get(), 2);
    let posted = d.outbox().posted();
    assert_eq!(posted.len(), 4);
    assert_eq!(posted[3].context, json!("d"));
    assert!(!posted[3].outcome.is_error());
}

#[test]
fn dispose_stops_intake_but_finishes_in_flight() {
    let device = Device::new();
    let d = dispatcher(&device);
    let release = device.gate("getAddress");

    let (tx, rx) = mpsc::unbounded();
    let (mut subscription, run) = d.subscribe(rx);
    let mut pool = LocalPool::new();
    pool.spawner().spawn_local(run).unwrap();

    tx.unbounded_send(Inbound { action: Action::GetAddress, params: Value::Null, context: json!("in-flight") }).unwrap();
    pool.run_until_stalled();

    subscription.dispose();
    let _ = tx.unbounded_send(Inbound { action: Action::GetVersion, params: Value::Null, context: json!("late") });
    release.send(()).unwrap();
    pool.run();

    let posted = d.outbox().posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].context, json!("in-flight"));
    assert!(!subscription.is_active());
}
