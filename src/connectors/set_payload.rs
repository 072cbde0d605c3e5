/// setPayload connector
///
/// Expected config: `{ "payload": {...}, "fields": { "target.path": "source.path" | literal } }`
/// `payload` is shallow-merged first; each `fields` entry then writes its
/// target path. A string source containing `.` is read from the payload being
/// built, any other value is used as-is.

use crate::connectors::path::{get_path, set_path};
use crate::connectors::Connector;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct SetPayloadConnector;

#[async_trait]
impl Connector for SetPayloadConnector {
    async fn execute(&self, config: &Value, payload: Value) -> anyhow::Result<Value> {
        tracing::debug!("🔧 SetPayload: setting payload fields");

        let mut updated = match payload {
            Value::Object(map) => Value::Object(map),
            Value::Null => Value::Object(Map::new()),
            other => {
                tracing::warn!("⚠️ SetPayload: replacing non-object payload {}", other);
                Value::Object(Map::new())
            }
        };

        if let Some(Value::Object(direct)) = config.get("payload") {
            if let Value::Object(target) = &mut updated {
                for (key, value) in direct {
                    target.insert(key.clone(), value.clone());
                }
            }
            tracing::debug!("✅ Merged direct payload object");
        }

        if let Some(Value::Object(fields)) = config.get("fields") {
            for (target_path, source) in fields {
                let value = match source {
                    Value::String(path) if path.contains('.') => {
                        get_path(&updated, path).cloned().unwrap_or(Value::Null)
                    }
                    literal => literal.clone(),
                };
                tracing::debug!("📊 Set {} = {}", target_path, value);
                set_path(&mut updated, target_path, value);
            }
        }

        Ok(updated)
    }
}
