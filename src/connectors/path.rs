/// Dotted-path access into JSON payloads
///
/// Shared by connectors that map configuration onto payload fields.

use serde_json::{Map, Value};

/// Read `a.b.c` from `value`; array segments are numeric indices
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Read a mapping source path. A leading `payload.` addresses the payload
/// itself; anything else is relative to it. Missing values read as `null`.
pub fn resolve_source(payload: &Value, path: &str) -> Value {
    let path = path.strip_prefix("payload.").unwrap_or(path);
    get_path(payload, path).cloned().unwrap_or(Value::Null)
}

/// Write `new_value` at `a.b.c`, replacing any non-object intermediate
pub fn set_path(target: &mut Value, path: &str, new_value: Value) {
    let keys: Vec<&str> = path.split('.').collect();
    set_in(target, &keys, new_value);
}

fn set_in(current: &mut Value, keys: &[&str], new_value: Value) {
    let Some((key, rest)) = keys.split_first() else {
        *current = new_value;
        return;
    };
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        let slot = map.entry(key.to_string()).or_insert(Value::Null);
        set_in(slot, rest, new_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_fields_and_indices() {
        let payload = json!({ "request": { "body": { "tags": ["a", "b"] } } });
        assert_eq!(get_path(&payload, "request.body.tags.1"), Some(&json!("b")));
        assert_eq!(get_path(&payload, "request.missing.deep"), None);
    }

    #[test]
    fn payload_prefix_is_optional_for_sources() {
        let payload = json!({ "id": 7, "user": { "name": "ada" } });
        assert_eq!(resolve_source(&payload, "payload.id"), json!(7));
        assert_eq!(resolve_source(&payload, "user.name"), json!("ada"));
        assert_eq!(resolve_source(&payload, "payload.nope"), Value::Null);
    }

    #[test]
    fn set_creates_and_overwrites_intermediates() {
        let mut payload = json!({ "response": "scalar" });
        set_path(&mut payload, "response.body.message", json!("hi"));
        set_path(&mut payload, "top", json!(1));

        assert_eq!(
            payload,
            json!({ "response": { "body": { "message": "hi" } }, "top": 1 })
        );
    }
}
