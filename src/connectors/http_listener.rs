/// httpListener connector
///
/// Lifts the parts of `payload.request` flows read most often to the top
/// level of the payload. A payload without a request passes through.

use crate::connectors::Connector;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Request parts copied with an empty-object fallback
const DEFAULTED_PARTS: [&str; 4] = ["params", "query", "body", "headers"];

pub struct HttpListenerConnector;

#[async_trait]
impl Connector for HttpListenerConnector {
    async fn execute(&self, _config: &Value, mut payload: Value) -> anyhow::Result<Value> {
        let Some(request) = payload.get("request").filter(|r| r.is_object()).cloned() else {
            return Ok(payload);
        };

        tracing::debug!(
            "📥 HTTP request: {} {}",
            request["method"].as_str().unwrap_or("?"),
            request["path"].as_str().unwrap_or("?")
        );

        if let Value::Object(map) = &mut payload {
            for part in DEFAULTED_PARTS {
                let value = match request.get(part) {
                    Some(v) if !v.is_null() => v.clone(),
                    _ => json!({}),
                };
                map.insert(part.to_string(), value);
            }
            map.insert("method".to_string(), request["method"].clone());
            map.insert("path".to_string(), request["path"].clone());
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_parts_are_lifted() {
        let payload = json!({
            "request": {
                "method": "GET",
                "path": "/users/7",
                "params": { "id": "7" },
                "query": { "verbose": "1" },
                "headers": { "accept": "application/json" }
            }
        });

        let result = HttpListenerConnector.execute(&json!({}), payload).await.unwrap();

        assert_eq!(result["params"], json!({ "id": "7" }));
        assert_eq!(result["query"]["verbose"], "1");
        assert_eq!(result["body"], json!({}));
        assert_eq!(result["method"], "GET");
        assert_eq!(result["path"], "/users/7");
    }

    #[tokio::test]
    async fn payload_without_request_is_unchanged() {
        let payload = json!({ "id": 1 });
        let result = HttpListenerConnector.execute(&json!({}), payload.clone()).await.unwrap();
        assert_eq!(result, payload);
    }
}
