/// http connector
///
/// Expected config:
/// `{ "url": "...", "method": "POST", "headers": {...}, "params": {...}, "data": {...}, "timeout": 5000 }`
/// The response is attached as `httpResponse`. Error statuses are returned
/// as data with `error: true`; transport failures fail the call.

use crate::connectors::Connector;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 5000;

pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

/// Request settings read from connector config
#[derive(Debug, PartialEq)]
struct RequestSpec {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<Value>,
    timeout: Duration,
}

impl RequestSpec {
    fn from_config(config: &Value, payload: &Value) -> anyhow::Result<Self> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("HTTP connector requires a URL"))?
            .to_string();

        let method_name = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| anyhow::anyhow!("Unsupported HTTP method: {}", method_name))?;

        let body = if [Method::POST, Method::PUT, Method::PATCH].contains(&method) {
            Some(
                config
                    .get("data")
                    .filter(|d| !d.is_null())
                    .or_else(|| payload.get("body").filter(|b| !b.is_null()))
                    .cloned()
                    .unwrap_or_else(|| json!({})),
            )
        } else {
            None
        };

        let timeout = config
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Ok(Self {
            method,
            url,
            headers: string_pairs(config.get("headers")),
            query: string_pairs(config.get("params")),
            body,
            timeout: Duration::from_millis(timeout),
        })
    }
}

/// Flatten a JSON object into string pairs; non-string scalars are rendered
fn string_pairs(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = value else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let rendered = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), rendered)
        })
        .collect()
}

#[async_trait]
impl Connector for HttpConnector {
    async fn execute(&self, config: &Value, payload: Value) -> anyhow::Result<Value> {
        let spec = RequestSpec::from_config(config, &payload)?;
        tracing::debug!("📡 HTTP {} request to: {}", spec.method, spec.url);

        let mut request = self
            .client
            .request(spec.method.clone(), &spec.url)
            .timeout(spec.timeout);
        for (key, value) in &spec.headers {
            request = request.header(key, value);
        }
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP connector failed: {}", e))?;

        let status = response.status();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), Value::String(v.to_string())))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP connector failed reading body: {}", e))?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

        tracing::debug!("✅ HTTP {} completed with status: {}", spec.method, status.as_u16());

        let mut http_response = json!({
            "status": status.as_u16(),
            "statusText": status.canonical_reason().unwrap_or(""),
            "data": data,
            "headers": headers,
        });
        if !status.is_success() {
            tracing::warn!("⚠️ HTTP request returned error status {}", status.as_u16());
            http_response["error"] = Value::Bool(true);
        }

        let mut payload = match payload {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(Map::new()),
        };
        payload["httpResponse"] = http_response;
        Ok(payload)
    }
}
