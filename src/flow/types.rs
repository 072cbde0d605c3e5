/// Flow document model
///
/// Documents are authored as JSON and parsed once, at load time, into the
/// typed model below. Step shapes are decided here and never re-sniffed
/// during traversal.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document's own declared name
pub const NAME_FIELD: &str = "flow-reference-name";
/// Subflow-style pointer to another document
pub const SUBFLOW_REFERENCE_FIELD: &str = "subflow-reference-name";
/// Explicit jump target, valid in any context
pub const FLOW_REFERENCE_FIELD: &str = "flowReference";

/// The three executable document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Sequence,
    Connector,
    Decision,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Sequence => "sequence",
            FlowKind::Connector => "connector",
            FlowKind::Decision => "decision",
        }
    }
}

/// A parsed flow or subflow document
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDocument {
    /// Name the document is indexed under in the masterlist
    pub name: String,
    pub body: FlowBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowBody {
    /// Ordered steps executed left to right
    Sequence(Vec<Step>),
    Connector(ConnectorDef),
    Decision(DecisionDef),
}

/// A leaf action dispatched to a connector implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDef {
    /// Declared name, also the source for connector type inference
    #[serde(rename = "flow-reference-name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Explicit connector type (e.g. "setPayload")
    #[serde(rename = "connectorType", default, skip_serializing_if = "Option::is_none")]
    pub connector_type: Option<String>,
    /// Opaque per-call configuration, merged over global defaults
    #[serde(default)]
    pub config: Value,
}

/// A branch node choosing among named targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDef {
    #[serde(rename = "flow-reference-name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Boolean expression evaluated against `payload`
    #[serde(default)]
    pub when: String,
    #[serde(rename = "goTo")]
    pub go_to: String,
}

/// One entry of a sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Bare flow name
    Reference(String),
    InlineConnector(ConnectorDef),
    InlineDecision(DecisionDef),
    /// Object carrying a reference field and no `type`
    ReferenceByField(String),
}

impl Step {
    /// Classify a raw step. Anything outside the four shapes is an error
    /// carrying the raw JSON.
    pub fn parse(owner: &str, raw: &Value) -> Result<Self, FlowError> {
        let unknown = || FlowError::UnknownStep {
            step: raw.to_string(),
        };

        match raw {
            Value::String(name) => Ok(Step::Reference(name.clone())),
            Value::Object(obj) => match obj.get("type") {
                Some(Value::String(t)) if t == "connector" => Ok(Step::InlineConnector(
                    serde_json::from_value(raw.clone()).map_err(|e| invalid(owner, e))?,
                )),
                Some(Value::String(t)) if t == "decision" => Ok(Step::InlineDecision(
                    serde_json::from_value(raw.clone()).map_err(|e| invalid(owner, e))?,
                )),
                Some(_) => Err(unknown()),
                None => [SUBFLOW_REFERENCE_FIELD, NAME_FIELD, FLOW_REFERENCE_FIELD]
                    .iter()
                    .find_map(|field| obj.get(*field).and_then(Value::as_str))
                    .map(|name| Step::ReferenceByField(name.to_string()))
                    .ok_or_else(unknown),
            },
            _ => Err(unknown()),
        }
    }
}

impl FlowDocument {
    /// Parse a raw document loaded under `name`
    pub fn parse(name: &str, raw: &Value) -> Result<Self, FlowError> {
        let obj = raw.as_object().ok_or_else(|| FlowError::InvalidDocument {
            name: name.to_string(),
            message: "document must be a JSON object".to_string(),
        })?;

        let body = match obj.get("type").and_then(Value::as_str) {
            Some("connector") => FlowBody::Connector(
                serde_json::from_value(raw.clone()).map_err(|e| invalid(name, e))?,
            ),
            Some("decision") => FlowBody::Decision(
                serde_json::from_value(raw.clone()).map_err(|e| invalid(name, e))?,
            ),
            _ => match obj.get("subflows") {
                Some(Value::Array(steps)) => FlowBody::Sequence(
                    steps
                        .iter()
                        .map(|step| Step::parse(name, step))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                _ => {
                    return Err(FlowError::InvalidDocument {
                        name: name.to_string(),
                        message: "unknown flow type".to_string(),
                    })
                }
            },
        };

        Ok(Self {
            name: name.to_string(),
            body,
        })
    }

    pub fn kind(&self) -> FlowKind {
        match self.body {
            FlowBody::Sequence(_) => FlowKind::Sequence,
            FlowBody::Connector(_) => FlowKind::Connector,
            FlowBody::Decision(_) => FlowKind::Decision,
        }
    }
}

fn invalid(name: &str, err: serde_json::Error) -> FlowError {
    FlowError::InvalidDocument {
        name: name.to_string(),
        message: err.to_string(),
    }
}
