/// Flow execution endpoints
///
/// Every request that is not a built-in endpoint is dispatched through the
/// compiled route table. The matched flow runs against a payload built from
/// the request, and its result is turned back into an HTTP response.

use crate::error::FlowError;
use crate::flow::RouteTable;
use crate::runtime::RuntimeEngine;
use axum::{
    body::to_bytes,
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, Router},
};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::Instrument;

/// Request bodies larger than this are rejected
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared state for flow-backed routes
#[derive(Clone)]
pub struct RuntimeState {
    pub engine: Arc<RuntimeEngine>,
    pub routes: Arc<RouteTable>,
    /// Build directory as reported by `/status`
    pub build_dir: String,
}

/// `/status` plus the catch-all flow dispatcher
pub fn create_flow_routes() -> Router<RuntimeState> {
    Router::new()
        .route("/status", get(status))
        .fallback(execute_route)
}

async fn status(State(state): State<RuntimeState>) -> Json<Value> {
    Json(json!({
        "server": "APIA Runtime",
        "routes": state.routes.keys(),
        "flows": state.engine.loader().index().names().collect::<Vec<_>>(),
        "connectors": state.engine.registry().registered_types(),
        "buildDir": state.build_dir,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Execute the flow bound to the request's method and path
pub async fn execute_route(State(state): State<RuntimeState>, request: Request) -> Response {
    let method = request.method().as_str().to_string();
    let uri = request.uri().clone();
    let path = uri.path().to_string();
    tracing::info!("📥 {} {}", method, path);

    let Some(matched) = state.routes.match_route(&method, &path) else {
        tracing::warn!("❌ No route for {} {}", method, path);
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Route not found",
                "method": method,
                "path": path,
                "availableRoutes": state.routes.keys(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response();
    };
    let flow = matched.entry.flow.clone();
    let params = matched.params;

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("request", id = %request_id, flow = %flow);

    async move {
        let headers = request.headers().clone();
        let body = match to_bytes(request.into_body(), BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("❌ Failed to read request body: {}", e);
                return (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({ "error": "Request body too large or unreadable" })),
                )
                    .into_response();
            }
        };

        let payload = request_payload(&method, &uri, &headers, &params, &body);

        let started = std::time::Instant::now();
        match state.engine.execute_flow(&flow, payload).await {
            Ok(result) => {
                tracing::info!("🎉 Flow {} completed in {:?}", flow, started.elapsed());
                flow_response(result)
            }
            Err(e) => {
                tracing::error!("❌ Flow execution failed for {} after {:?}: {}", flow, started.elapsed(), e);
                flow_error_response(&flow, &e)
            }
        }
    }
    .instrument(span)
    .await
}

/// Initial payload handed to the entry flow
pub fn request_payload(
    method: &str,
    uri: &Uri,
    headers: &HeaderMap,
    params: &BTreeMap<String, String>,
    body: &[u8],
) -> Value {
    let query: BTreeMap<String, String> = Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(q)| q.into_iter().collect())
        .unwrap_or_default();

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
    };

    json!({
        "request": {
            "method": method,
            "path": uri.path(),
            "originalUrl": uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(uri.path()),
            "headers": header_map_to_json(headers),
            "query": query,
            "params": params,
            "body": body,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        },
        "response": {
            "headers": {},
            "statusCode": 200,
        }
    })
}

/// Repeated headers are joined with `, `
fn header_map_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        match map.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => {
                map.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }
    }
    Value::Object(map)
}

/// Turn a flow result into a response
///
/// A `response` object supplies headers, status code and, when present, the
/// body; otherwise the whole result is the body.
pub fn flow_response(result: Value) -> Response {
    let Some(Value::Object(response)) = result.get("response") else {
        return Json(result).into_response();
    };

    let status = response
        .get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let mut headers = HeaderMap::new();
    if let Some(Value::Object(custom)) = response.get("headers") {
        for (key, value) in custom {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(&rendered),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!("⚠️ Skipping invalid response header: {}", key),
            }
        }
    }

    let body = response.get("body").cloned().unwrap_or_else(|| result.clone());
    (status, headers, Json(body)).into_response()
}

pub fn flow_error_response(flow: &str, error: &FlowError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "message": error.to_string(),
            "flow": flow,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

/// Permissive CORS headers; preflight requests are answered directly
pub async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Origin, X-Requested-With, Content-Type, Accept, Authorization"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn payload_carries_request_parts() {
        let uri: Uri = "/users/7?verbose=1".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-trace", HeaderValue::from_static("abc"));
        let params = BTreeMap::from([("id".to_string(), "7".to_string())]);

        let payload = request_payload("GET", &uri, &headers, &params, b"");

        assert_eq!(payload["request"]["path"], "/users/7");
        assert_eq!(payload["request"]["originalUrl"], "/users/7?verbose=1");
        assert_eq!(payload["request"]["query"]["verbose"], "1");
        assert_eq!(payload["request"]["params"]["id"], "7");
        assert_eq!(payload["request"]["headers"]["x-trace"], "abc");
        assert_eq!(payload["request"]["body"], json!({}));
        assert_eq!(payload["response"], json!({ "headers": {}, "statusCode": 200 }));
    }

    #[test]
    fn non_json_body_is_kept_as_text() {
        let uri: Uri = "/".parse().unwrap();
        let payload = request_payload("POST", &uri, &HeaderMap::new(), &BTreeMap::new(), b"plain text");
        assert_eq!(payload["request"]["body"], "plain text");

        let payload = request_payload("POST", &uri, &HeaderMap::new(), &BTreeMap::new(), br#"{"a":1}"#);
        assert_eq!(payload["request"]["body"]["a"], 1);
    }

    #[tokio::test]
    async fn response_object_controls_status_headers_and_body() {
        let response = flow_response(json!({
            "internal": true,
            "response": {
                "statusCode": 201,
                "headers": { "x-flow": "greet" },
                "body": { "message": "hello" }
            }
        }));

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-flow"], "greet");
        assert_eq!(body_json(response).await, json!({ "message": "hello" }));
    }

    #[tokio::test]
    async fn result_without_response_body_is_sent_whole() {
        let result = json!({ "message": "hello", "response": { "statusCode": 200 } });
        let response = flow_response(result.clone());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, result);

        let bare = flow_response(json!({ "message": "hello" }));
        assert_eq!(body_json(bare).await, json!({ "message": "hello" }));
    }

    #[tokio::test]
    async fn failures_become_generic_server_errors() {
        let err = FlowError::NoMatch {
            name: "route-user".to_string(),
        };
        let response = flow_error_response("entry", &err);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["flow"], "entry");
        assert!(body["message"].as_str().unwrap().contains("No decision conditions matched"));
    }
}
