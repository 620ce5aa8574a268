//! Demo: a minimal security engine wired through the gateway.
//!
//! Run with: cargo run --example engine_blocking_flow

use std::collections::BTreeMap;
use std::sync::Arc;

use appsec_gateway::{
    Action, Flow, Introspect, InstrumentationGateway, RequestContext, Snapshot, Snapshotter,
    REQUEST_BODY_PROCESSED, REQUEST_STARTED,
};

fn snapshot_contains(snapshot: &Snapshot, needle: &str) -> bool {
    match snapshot {
        Snapshot::Absent => false,
        Snapshot::Text(text) => text.contains(needle),
        Snapshot::Sequence(items) => items.iter().any(|item| snapshot_contains(item, needle)),
        Snapshot::Mapping(entries) => entries
            .values()
            .any(|value| snapshot_contains(value, needle)),
    }
}

fn body_processed(_ctx: &mut RequestContext, body: &dyn Introspect) -> Flow<()> {
    let snapshot = Snapshotter::new().convert(body);
    println!("engine sees: {}", snapshot);
    if snapshot_contains(&snapshot, "<script>") {
        Flow::from_action(Action::block_default())
    } else {
        Flow::empty()
    }
}

fn serve(gateway: &InstrumentationGateway, request_id: &str, body: &BTreeMap<String, String>) {
    let mut ctx = RequestContext::new(request_id);
    if let Some(callback) = gateway.callback(&REQUEST_STARTED) {
        let _flow = (*callback)(&mut ctx);
    }
    if let Some(callback) = gateway.callback(&REQUEST_BODY_PROCESSED) {
        let flow = (*callback)(&mut ctx, body);
        match flow.action() {
            Some(action) => println!("{}: engine says {}", request_id, action),
            None => println!("{}: served normally", request_id),
        }
    }
}

fn main() {
    let gateway = InstrumentationGateway::new();

    // Engine initialization: one callback per hook of interest.
    let _started = gateway
        .register(
            &REQUEST_STARTED,
            Arc::new(|_ctx: &mut RequestContext| Flow::empty()),
        )
        .expect("slot free");
    let _body = gateway
        .register(&REQUEST_BODY_PROCESSED, Arc::new(body_processed))
        .expect("slot free");

    let mut clean = BTreeMap::new();
    clean.insert("comment".to_string(), "love this".to_string());
    serve(&gateway, "req-1", &clean);

    let mut hostile = BTreeMap::new();
    hostile.insert(
        "comment".to_string(),
        "<script>steal()</script>".to_string(),
    );
    serve(&gateway, "req-2", &hostile);
}
