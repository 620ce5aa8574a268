//! End-to-end flow: a security engine registers callbacks, an instrumented
//! call site fires events with request data, the engine snapshots the data
//! and returns a verdict, and the call site reads the action.

use std::collections::BTreeMap;
use std::sync::Arc;

use appsec_gateway::{
    Action, Flow, Header, Introspect, InstrumentationGateway, RequestContext, Snapshot,
    Snapshotter, Subscription, REQUEST_BODY_PROCESSED, REQUEST_ENDED, REQUEST_HEADER,
    REQUEST_STARTED,
};

/// Per-request state the engine keeps in the context.
struct EngineState {
    headers_seen: usize,
    body_snapshot: Option<Snapshot>,
}

/// Recursively scans a snapshot for a rule-matching text fragment.
fn matches_rule(snapshot: &Snapshot, needle: &str) -> bool {
    match snapshot {
        Snapshot::Absent => false,
        Snapshot::Text(text) => text.contains(needle),
        Snapshot::Sequence(items) => items.iter().any(|item| matches_rule(item, needle)),
        Snapshot::Mapping(entries) => entries.values().any(|value| matches_rule(value, needle)),
    }
}

fn request_started(ctx: &mut RequestContext) -> Flow<()> {
    ctx.set_engine_state(EngineState {
        headers_seen: 0,
        body_snapshot: None,
    });
    Flow::empty()
}

fn request_header(ctx: &mut RequestContext, _header: &Header) -> Flow<()> {
    if let Some(state) = ctx.engine_state_mut::<EngineState>() {
        state.headers_seen += 1;
    }
    Flow::empty()
}

fn body_processed(ctx: &mut RequestContext, body: &dyn Introspect) -> Flow<()> {
    // Snapshot first: rules must never read the live object graph.
    let snapshot = Snapshotter::new().convert(body);
    let verdict = if matches_rule(&snapshot, "' OR 1=1") {
        Flow::from_action(Action::block_default())
    } else {
        Flow::empty()
    };
    if let Some(state) = ctx.engine_state_mut::<EngineState>() {
        state.body_snapshot = Some(snapshot);
    }
    verdict
}

fn request_ended(_ctx: &mut RequestContext) -> Flow<()> {
    Flow::empty()
}

/// Engine initialization: register every hook, keep the subscriptions for
/// teardown.
fn install_engine(gateway: &InstrumentationGateway) -> Vec<Subscription> {
    vec![
        gateway
            .register(&REQUEST_STARTED, Arc::new(request_started))
            .expect("request.started free"),
        gateway
            .register(&REQUEST_HEADER, Arc::new(request_header))
            .expect("request.header free"),
        gateway
            .register(&REQUEST_BODY_PROCESSED, Arc::new(body_processed))
            .expect("request.body_processed free"),
        gateway
            .register(&REQUEST_ENDED, Arc::new(request_ended))
            .expect("request.ended free"),
    ]
}

/// Simulates the instrumented call site for one request; returns the
/// blocking action if the engine requested one.
fn run_request(
    gateway: &InstrumentationGateway,
    request_id: &str,
    headers: &[Header],
    body: &dyn Introspect,
) -> (RequestContext, Option<Action>) {
    let mut ctx = RequestContext::new(request_id);

    if let Some(callback) = gateway.callback(&REQUEST_STARTED) {
        let _flow = (*callback)(&mut ctx);
    }
    for header in headers {
        if let Some(callback) = gateway.callback(&REQUEST_HEADER) {
            let _flow = (*callback)(&mut ctx, header);
        }
    }

    let mut action = None;
    if let Some(callback) = gateway.callback(&REQUEST_BODY_PROCESSED) {
        let flow = (*callback)(&mut ctx, body);
        action = flow.action().cloned();
    }

    if let Some(callback) = gateway.callback(&REQUEST_ENDED) {
        let _flow = (*callback)(&mut ctx);
    }
    (ctx, action)
}

#[test]
fn clean_request_passes_through() {
    let gateway = InstrumentationGateway::new();
    let _subscriptions = install_engine(&gateway);

    let mut body = BTreeMap::new();
    body.insert("comment".to_string(), "nice article".to_string());
    let headers = [Header::new("accept", "text/html")];

    let (ctx, action) = run_request(&gateway, "req-clean", &headers, &body);

    assert!(action.is_none());
    let state = ctx.engine_state::<EngineState>().expect("engine state");
    assert_eq!(state.headers_seen, 1);
    let snapshot = state.body_snapshot.as_ref().expect("body snapshot");
    assert_eq!(
        snapshot.get("comment").and_then(Snapshot::as_text),
        Some("nice article")
    );
}

#[test]
fn malicious_body_is_blocked() {
    let gateway = InstrumentationGateway::new();
    let _subscriptions = install_engine(&gateway);

    let mut body = BTreeMap::new();
    body.insert(
        "username".to_string(),
        "admin' OR 1=1 --".to_string(),
    );

    let (_ctx, action) = run_request(&gateway, "req-attack", &[], &body);

    let action = action.expect("engine should block");
    assert!(action.is_blocking());
    assert_eq!(
        action,
        Action::Block {
            status: 403,
            body: appsec_gateway::BlockBody::Auto,
        }
    );
}

#[test]
fn request_without_engine_sees_no_difference() {
    let gateway = InstrumentationGateway::new();

    let body: Vec<String> = vec!["anything".to_string()];
    let (ctx, action) = run_request(&gateway, "req-bare", &[], &body);

    // No callbacks, no engine state, no action: pure pass-through.
    assert!(action.is_none());
    assert!(ctx.engine_state::<EngineState>().is_none());
}

#[test]
fn engine_teardown_detaches_every_hook() {
    let gateway = InstrumentationGateway::new();
    let subscriptions = install_engine(&gateway);

    for subscription in &subscriptions {
        subscription.cancel();
    }

    assert!(gateway.callback(&REQUEST_STARTED).is_none());
    assert!(gateway.callback(&REQUEST_HEADER).is_none());
    assert!(gateway.callback(&REQUEST_BODY_PROCESSED).is_none());
    assert!(gateway.callback(&REQUEST_ENDED).is_none());

    // Reload: a fresh engine installs cleanly into the freed slots.
    let _reloaded = install_engine(&gateway);
    assert!(gateway.callback(&REQUEST_BODY_PROCESSED).is_some());
}

#[test]
fn snapshot_isolates_engine_from_later_mutation() {
    let gateway = InstrumentationGateway::new();
    let _subscriptions = install_engine(&gateway);

    let mut body = BTreeMap::new();
    body.insert("key".to_string(), "original".to_string());

    let (ctx, _action) = run_request(&gateway, "req-iso", &[], &body);

    // The call site mutates its object graph after the event fired.
    body.insert("key".to_string(), "mutated".to_string());

    let state = ctx.engine_state::<EngineState>().expect("engine state");
    let snapshot = state.body_snapshot.as_ref().expect("body snapshot");
    assert_eq!(
        snapshot.get("key").and_then(Snapshot::as_text),
        Some("original")
    );
}
