mod common;

use apia::config::RuntimeConfig;
use apia::connectors::{Connector, ConnectorFactory};
use apia::error::{FlowError, FlowErrorKind};
use apia::RuntimeEngine;
use async_trait::async_trait;
use common::{build, write_json};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Returns the merged config it was called with
struct EchoConfig;

#[async_trait]
impl Connector for EchoConfig {
    async fn execute(&self, config: &Value, _payload: Value) -> anyhow::Result<Value> {
        Ok(json!({ "config": config }))
    }
}

/// Counts its calls and passes the payload through
struct Tally(Arc<AtomicUsize>);

#[async_trait]
impl Connector for Tally {
    async fn execute(&self, _config: &Value, payload: Value) -> anyhow::Result<Value> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(payload)
    }
}

fn set_payload(fields: Value) -> Value {
    json!({ "type": "connector", "connectorType": "setPayload", "config": { "fields": fields } })
}

/// Build `src` and open a runtime over the result. Both directories must
/// outlive the engine.
fn engine_for(src: &Path) -> (TempDir, RuntimeEngine) {
    let out = tempfile::tempdir().unwrap();
    build(src, out.path());
    let engine = RuntimeEngine::initialize(out.path(), &RuntimeConfig::default()).unwrap();
    (out, engine)
}

#[tokio::test]
async fn set_payload_connector_writes_literal_fields() {
    let src = tempfile::tempdir().unwrap();
    write_json(src.path(), "flows/greet.json", set_payload(json!({ "message": "hello" })));
    let (_out, engine) = engine_for(src.path());

    let result = engine.execute_flow("greet", json!({})).await.unwrap();

    assert_eq!(result, json!({ "message": "hello" }));
    assert_eq!(engine.loader().cached(), 1);
}

#[tokio::test]
async fn decision_routes_on_payload() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/route-user.json",
        json!({
            "type": "decision",
            "conditions": [{ "when": "payload.id > 0", "goTo": "found" }],
            "default": "notFound"
        }),
    );
    write_json(src.path(), "subflows/found.json", set_payload(json!({ "result": "found" })));
    write_json(src.path(), "subflows/notFound.json", set_payload(json!({ "result": "notFound" })));
    let (_out, engine) = engine_for(src.path());

    let found = engine.execute_flow("route-user", json!({ "id": 5 })).await.unwrap();
    assert_eq!(found, json!({ "id": 5, "result": "found" }));

    let missing = engine.execute_flow("route-user", json!({ "id": 0 })).await.unwrap();
    assert_eq!(missing, json!({ "id": 0, "result": "notFound" }));
}

#[tokio::test]
async fn first_true_condition_wins_and_errors_count_as_false() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/choose.json",
        json!({
            "type": "decision",
            "conditions": [
                { "when": "payload.missing.deep == 1", "goTo": "a" },
                { "when": "payload.n > 1", "goTo": "b" },
                { "when": "payload.n > 0", "goTo": "c" }
            ],
            "default": "a"
        }),
    );
    for name in ["a", "b", "c"] {
        write_json(src.path(), &format!("subflows/{}.json", name), set_payload(json!({ "picked": name })));
    }
    let (_out, engine) = engine_for(src.path());

    let result = engine.execute_flow("choose", json!({ "n": 5 })).await.unwrap();
    assert_eq!(result["picked"], "b");

    let fallback = engine.execute_flow("choose", json!({ "n": -1 })).await.unwrap();
    assert_eq!(fallback["picked"], "a");
}

#[tokio::test]
async fn sequence_threads_each_output_into_the_next_step() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/pipeline.json",
        json!({
            "subflows": [
                {
                    "type": "connector",
                    "connectorType": "transform",
                    "config": { "code": "payload.count = payload.count + 1; return payload" }
                },
                "step-one",
                { "subflow-reference-name": "step-two" }
            ]
        }),
    );
    write_json(src.path(), "subflows/step-one.json", set_payload(json!({ "stage.name": "one" })));
    write_json(src.path(), "subflows/step-two.json", set_payload(json!({ "seen": "stage.name" })));
    let (_out, engine) = engine_for(src.path());

    let result = engine.execute_flow("pipeline", json!({ "count": 1 })).await.unwrap();

    assert_eq!(result["count"], 2);
    assert_eq!(result["seen"], "one");
    let keys: Vec<&str> = result.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["count", "stage", "seen"]);
}

#[tokio::test]
async fn inline_decision_branches_inside_a_sequence() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/sized.json",
        json!({
            "subflows": [
                {
                    "type": "decision",
                    "conditions": [{ "when": "payload.n > 1", "goTo": "big" }],
                    "default": "small"
                },
                "finish"
            ]
        }),
    );
    write_json(src.path(), "subflows/big.json", set_payload(json!({ "size": "big" })));
    write_json(src.path(), "subflows/small.json", set_payload(json!({ "size": "small" })));
    write_json(src.path(), "subflows/finish.json", set_payload(json!({ "done": true })));
    let (_out, engine) = engine_for(src.path());

    let big = engine.execute_flow("sized", json!({ "n": 5 })).await.unwrap();
    assert_eq!(big, json!({ "n": 5, "size": "big", "done": true }));

    let small = engine.execute_flow("sized", json!({ "n": 0 })).await.unwrap();
    assert_eq!(small["size"], "small");
    assert_eq!(small["done"], true);
}

#[tokio::test]
async fn inline_connector_infers_type_from_its_declared_name() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/inline-named.json",
        json!({
            "subflows": [{
                "type": "connector",
                "flow-reference-name": "set-payload-inline",
                "config": { "fields": { "inline": "yes" } }
            }]
        }),
    );
    write_json(
        src.path(),
        "flows/inline-unnamed.json",
        json!({
            "subflows": [{
                "type": "connector",
                "flow-reference-name": "mystery-step",
                "config": {}
            }]
        }),
    );
    let (_out, engine) = engine_for(src.path());

    let result = engine.execute_flow("inline-named", json!({})).await.unwrap();
    assert_eq!(result, json!({ "inline": "yes" }));

    // The owning document's name is never used for an inline step
    let err = engine.execute_flow("inline-unnamed", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), FlowErrorKind::Inference);
    assert!(err.to_string().contains("mystery-step"));
}

#[tokio::test]
async fn connector_failure_aborts_the_remaining_steps() {
    let src = tempfile::tempdir().unwrap();
    let tally = json!({ "type": "connector", "connectorType": "tally", "config": {} });
    write_json(
        src.path(),
        "flows/fragile.json",
        json!({
            "subflows": [
                tally.clone(),
                {
                    "type": "connector",
                    "connectorType": "transform",
                    "config": { "code": "error('boom')" }
                },
                tally
            ]
        }),
    );
    let (_out, engine) = engine_for(src.path());
    let calls = Arc::new(AtomicUsize::new(0));
    engine
        .registry()
        .register_instance("tally", Arc::new(Tally(Arc::clone(&calls))));

    let err = engine.execute_flow("fragile", json!({})).await.unwrap_err();

    assert_eq!(err.kind(), FlowErrorKind::Connector);
    assert!(matches!(err, FlowError::Connector { ref connector_type, .. } if connector_type == "transform"));
    assert!(err.to_string().contains("boom"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_executions_share_one_cache_entry() {
    let src = tempfile::tempdir().unwrap();
    write_json(src.path(), "flows/greet.json", set_payload(json!({ "message": "hello" })));
    let (_out, engine) = engine_for(src.path());
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.execute_flow("greet", json!({})).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), json!({ "message": "hello" }));
    }
    assert_eq!(engine.loader().cached(), 1);
}

#[tokio::test]
async fn unknown_flow_is_not_found() {
    let src = tempfile::tempdir().unwrap();
    write_json(src.path(), "flows/greet.json", set_payload(json!({ "message": "hello" })));
    let (_out, engine) = engine_for(src.path());

    let err = engine.execute_flow("nope", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), FlowErrorKind::NotFound);
    assert!(err.to_string().contains("nope"));
}

#[tokio::test]
async fn connector_type_is_inferred_from_names() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/mystery.json",
        json!({ "type": "connector", "config": {} }),
    );
    write_json(
        src.path(),
        "flows/greeting.json",
        json!({
            "type": "connector",
            "flow-reference-name": "set-payload-greeting",
            "config": { "fields": { "message": "inferred" } }
        }),
    );
    write_json(
        src.path(),
        "flows/orders-mongodb.json",
        json!({ "type": "connector", "config": {} }),
    );
    let (_out, engine) = engine_for(src.path());

    let inferred = engine.execute_flow("greeting", json!({})).await.unwrap();
    assert_eq!(inferred["message"], "inferred");

    let err = engine.execute_flow("mystery", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), FlowErrorKind::Inference);

    // Inferred, but nothing is registered for it
    let err = engine.execute_flow("orders-mongodb", json!({})).await.unwrap_err();
    assert!(matches!(err, FlowError::ConnectorNotFound { ref connector_type } if connector_type == "mongodb"));
}

#[tokio::test]
async fn decision_without_match_or_default_fails() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/strict.json",
        json!({
            "type": "decision",
            "flow-reference-name": "strict-decision",
            "conditions": [{ "when": "payload.ok === true", "goTo": "ok" }]
        }),
    );
    write_json(src.path(), "subflows/ok.json", set_payload(json!({ "ok": "yes" })));
    let (_out, engine) = engine_for(src.path());

    let err = engine.execute_flow("strict", json!({ "ok": false })).await.unwrap_err();
    assert_eq!(err.kind(), FlowErrorKind::NoMatch);
    assert!(err.to_string().contains("strict-decision"));
}

#[tokio::test]
async fn broken_connector_factory_is_a_contract_violation() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/use-broken.json",
        json!({ "type": "connector", "connectorType": "broken", "config": {} }),
    );
    let (_out, engine) = engine_for(src.path());
    let factory: ConnectorFactory = Arc::new(|| -> anyhow::Result<Arc<dyn Connector>> {
        Err(anyhow::anyhow!("module has no execute function"))
    });
    engine.registry().register("broken", factory);

    let err = engine.execute_flow("use-broken", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), FlowErrorKind::ContractViolation);
}

#[tokio::test]
async fn global_defaults_sit_under_call_config() {
    let src = tempfile::tempdir().unwrap();
    write_json(
        src.path(),
        "flows/echo.json",
        json!({ "type": "connector", "connectorType": "echo", "config": { "b": 2 } }),
    );
    write_json(
        src.path(),
        "config/global.config.json",
        json!({ "echo": { "a": 1, "b": 1 } }),
    );
    let (_out, engine) = engine_for(src.path());
    engine.registry().register_instance("echo", Arc::new(EchoConfig));

    let result = engine.execute_flow("echo", json!({})).await.unwrap();
    assert_eq!(result["config"], json!({ "a": 1, "b": 2 }));
}

#[tokio::test]
async fn malformed_steps_fail_at_load() {
    let src = tempfile::tempdir().unwrap();
    write_json(src.path(), "flows/bad.json", json!({ "subflows": [42] }));
    let (_out, engine) = engine_for(src.path());

    let err = engine.execute_flow("bad", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), FlowErrorKind::UnknownStep);
}

#[test]
fn runtime_requires_a_built_masterlist() {
    let empty = tempfile::tempdir().unwrap();

    let err = RuntimeEngine::initialize(empty.path(), &RuntimeConfig::default())
        .err()
        .unwrap();

    assert!(matches!(err, FlowError::ManifestMissing { .. }));
    assert_eq!(err.kind(), FlowErrorKind::Initialization);
}
