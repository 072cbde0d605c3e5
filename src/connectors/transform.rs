/// transform connector
///
/// Expected config: `{ "code": "payload.total = payload.a + payload.b; return payload" }`
/// The chunk runs in a fresh, sandboxed Lua state with the payload bound to
/// the global `payload`. A non-nil return value replaces the payload; a chunk
/// that returns nothing leaves it unchanged.

use crate::connectors::Connector;
use async_trait::async_trait;
use mlua::{Lua, LuaSerdeExt};
use serde_json::Value;

/// Globals removed before user code runs
const BLOCKED_GLOBALS: [&str; 8] = [
    "os", "io", "debug", "package", "require", "load", "dofile", "loadfile",
];

pub struct TransformConnector;

#[async_trait]
impl Connector for TransformConnector {
    async fn execute(&self, config: &Value, payload: Value) -> anyhow::Result<Value> {
        if let Some(code) = config.get("code").and_then(Value::as_str) {
            tracing::debug!("📝 Transform: executing inline script");
            return run_script(code, payload)
                .map_err(|e| anyhow::anyhow!("Transform connector failed: {}", e));
        }

        if let Some(function) = config.get("function").and_then(Value::as_str) {
            anyhow::bail!("Transform connector failed: named function '{}' is not supported", function);
        }

        anyhow::bail!("Transform connector requires either \"code\" or \"function\" configuration")
    }
}

/// Run `code` against `payload` in a new sandboxed state
fn run_script(code: &str, payload: Value) -> anyhow::Result<Value> {
    let lua = Lua::new();
    let globals = lua.globals();

    for name in BLOCKED_GLOBALS {
        globals
            .set(name, mlua::Nil)
            .map_err(|e| anyhow::anyhow!("Failed to sandbox Lua state: {}", e))?;
    }

    let input = lua
        .to_value(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to convert payload to Lua: {}", e))?;
    globals
        .set("payload", input)
        .map_err(|e| anyhow::anyhow!("Failed to bind payload: {}", e))?;

    let result: mlua::Value = lua
        .load(code)
        .eval()
        .map_err(|e| anyhow::anyhow!("Lua script execution failed: {}", e))?;

    if result.is_nil() {
        return Ok(payload);
    }

    lua.from_value(result)
        .map_err(|e| anyhow::anyhow!("Failed to convert Lua result to JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn returned_table_replaces_the_payload() {
        let config = json!({ "code": "return { greeting = 'hi ' .. payload.name }" });
        let result = TransformConnector
            .execute(&config, json!({ "name": "ada" }))
            .await
            .unwrap();
        assert_eq!(result, json!({ "greeting": "hi ada" }));
    }

    #[tokio::test]
    async fn mutating_and_returning_the_payload() {
        let config = json!({ "code": "payload.count = payload.count + 1\nreturn payload" });
        let result = TransformConnector
            .execute(&config, json!({ "count": 1, "name": "x" }))
            .await
            .unwrap();
        assert_eq!(result["count"], 2);
        assert_eq!(result["name"], "x");
    }

    #[tokio::test]
    async fn no_return_keeps_the_payload() {
        let payload = json!({ "a": 1 });
        let result = TransformConnector
            .execute(&json!({ "code": "local x = 1" }), payload.clone())
            .await
            .unwrap();
        assert_eq!(result, payload);
    }

    #[tokio::test]
    async fn sandbox_hides_os_access() {
        let err = TransformConnector
            .execute(&json!({ "code": "return os.time()" }), json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Transform connector failed"));
    }

    #[tokio::test]
    async fn missing_code_is_rejected() {
        let err = TransformConnector.execute(&json!({}), json!({})).await.unwrap_err();
        assert!(err.to_string().contains("requires either"));

        let err = TransformConnector
            .execute(&json!({ "function": "normalize" }), json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("normalize"));
    }
}
