/// Reference extraction over raw flow documents
///
/// Collects every flow name a document points at so the masterlist compiler
/// can check the closed world before anything runs. One exclusion rule is
/// applied everywhere: an object whose `type` is `connector` or `decision`
/// is an inline definition, and its own name fields are identity rather than
/// pointers. Its children are still walked.

use crate::flow::types::{FLOW_REFERENCE_FIELD, NAME_FIELD, SUBFLOW_REFERENCE_FIELD};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fields holding step containers (map of names or list of steps)
const CONTAINER_FIELDS: [&str; 2] = ["subflows", "flows"];

/// Extract the set of flow names referenced by `document`
pub fn extract_references(document: &Value) -> HashSet<String> {
    let root_name = document.get(NAME_FIELD).and_then(Value::as_str);
    let mut extractor = Extractor {
        root_name,
        references: HashSet::new(),
    };
    extractor.visit(document, true);
    extractor.references
}

struct Extractor<'a> {
    root_name: Option<&'a str>,
    references: HashSet<String>,
}

impl Extractor<'_> {
    fn visit(&mut self, value: &Value, is_root: bool) {
        match value {
            Value::Object(obj) => self.visit_object(obj, is_root),
            Value::Array(items) => items.iter().for_each(|item| self.visit(item, false)),
            _ => {}
        }
    }

    fn visit_object(&mut self, obj: &Map<String, Value>, is_root: bool) {
        let kind = obj.get("type").and_then(Value::as_str);
        let inline = matches!(kind, Some("connector") | Some("decision"));

        if !inline {
            if let Some(name) = obj.get(SUBFLOW_REFERENCE_FIELD).and_then(Value::as_str) {
                self.add(name);
            }
            if let Some(name) = obj.get(NAME_FIELD).and_then(Value::as_str) {
                if !is_root && Some(name) != self.root_name {
                    self.add(name);
                }
            }
        }

        if let Some(name) = obj.get(FLOW_REFERENCE_FIELD).and_then(Value::as_str) {
            self.add(name);
        }

        // Decision jump targets
        if kind == Some("decision") {
            if let Some(Value::Array(conditions)) = obj.get("conditions") {
                for condition in conditions {
                    if let Some(target) = condition.get("goTo").and_then(Value::as_str) {
                        self.add(target);
                    }
                }
            }
            if let Some(target) = obj.get("default").and_then(Value::as_str) {
                self.add(target);
            }
        }

        for (key, value) in obj {
            if CONTAINER_FIELDS.contains(&key.as_str()) {
                self.visit_container(value);
            } else {
                self.visit(value, false);
            }
        }
    }

    fn visit_container(&mut self, value: &Value) {
        match value {
            Value::Object(map) => {
                for entry in map.values() {
                    match entry {
                        Value::String(name) => self.add(name),
                        other => self.visit(other, false),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(name) => self.add(name),
                        other => self.visit(other, false),
                    }
                }
            }
            _ => {}
        }
    }

    fn add(&mut self, name: &str) {
        if Some(name) == self.root_name {
            return;
        }
        self.references.insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sorted(refs: HashSet<String>) -> Vec<String> {
        let mut refs: Vec<String> = refs.into_iter().collect();
        refs.sort();
        refs
    }

    #[test]
    fn collects_bare_names_and_reference_objects_from_step_lists() {
        let doc = json!({
            "flow-reference-name": "create-user",
            "subflows": [
                "validate-user",
                { "subflow-reference-name": "hash-password" },
                { "flow-reference-name": "insert-user" }
            ]
        });

        assert_eq!(
            sorted(extract_references(&doc)),
            vec!["hash-password", "insert-user", "validate-user"]
        );
    }

    #[test]
    fn collects_values_of_map_shaped_containers() {
        let doc = json!({
            "flow-reference-name": "router",
            "subflows": { "first": "a", "second": "b" }
        });

        assert_eq!(sorted(extract_references(&doc)), vec!["a", "b"]);
    }

    #[test]
    fn inline_definitions_are_not_references() {
        let doc = json!({
            "flow-reference-name": "pipeline",
            "subflows": [
                {
                    "type": "connector",
                    "flow-reference-name": "set-payload-inline",
                    "subflow-reference-name": "also-identity",
                    "connectorType": "setPayload",
                    "config": { "next": { "flowReference": "jump-target" } }
                }
            ]
        });

        assert_eq!(sorted(extract_references(&doc)), vec!["jump-target"]);
    }

    #[test]
    fn self_reference_is_not_a_dependency() {
        let doc = json!({
            "flow-reference-name": "looping",
            "subflows": [
                "looping",
                { "flow-reference-name": "looping" },
                "other"
            ]
        });

        assert_eq!(sorted(extract_references(&doc)), vec!["other"]);
    }

    #[test]
    fn flow_reference_is_collected_even_inside_inline_definitions() {
        let doc = json!({
            "type": "connector",
            "flowReference": "explicit"
        });

        assert_eq!(sorted(extract_references(&doc)), vec!["explicit"]);
    }

    #[test]
    fn decision_targets_are_references() {
        let doc = json!({
            "flow-reference-name": "route-user",
            "type": "decision",
            "conditions": [
                { "when": "payload.id > 0", "goTo": "found" },
                { "when": "payload.admin", "goTo": "admin" }
            ],
            "default": "notFound"
        });

        assert_eq!(
            sorted(extract_references(&doc)),
            vec!["admin", "found", "notFound"]
        );
    }

    #[test]
    fn nested_non_inline_entries_are_fully_recursed() {
        let doc = json!({
            "flow-reference-name": "outer",
            "subflows": [
                { "subflow-reference-name": "wrapper", "extra": { "flowReference": "deep" } },
                { "type": "decision", "conditions": [{ "when": "true", "goTo": "inner" }] }
            ]
        });

        assert_eq!(
            sorted(extract_references(&doc)),
            vec!["deep", "inner", "wrapper"]
        );
    }

    #[test]
    fn router_documents_yield_flow_references() {
        let doc = json!({
            "routes": [
                { "method": "GET", "path": "/users", "flowReference": "list-users" },
                { "method": "POST", "path": "/users", "flowReference": "create-user" }
            ]
        });

        assert_eq!(
            sorted(extract_references(&doc)),
            vec!["create-user", "list-users"]
        );
    }
}
