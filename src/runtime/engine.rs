/// Flow interpreter
///
/// Executes flow documents depth-first over a single payload. Each call chain
/// is strictly sequential: a sequence never starts a step before the previous
/// step's payload is available, and a decision settles its condition before
/// touching its target. Suspension only happens inside connector calls.

use crate::config::RuntimeConfig;
use crate::connectors::{ConnectorRegistry, GlobalConfig};
use crate::error::FlowError;
use crate::flow::{ConnectorDef, DecisionDef, FlowBody, Step};
use crate::runtime::expression::evaluate_condition;
use crate::runtime::loader::FlowLoader;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Boxed future returned by recursive flow execution
pub type FlowFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, FlowError>> + Send + 'a>>;

/// Name keyword -> connector type, checked in order; first match wins
const INFERENCE_RULES: [(&str, &str); 9] = [
    ("mysql", "mysql"),
    ("mongodb", "mongodb"),
    ("postgresql", "postgresql"),
    ("postgres", "postgresql"),
    ("zoho", "zoho"),
    ("salesforce", "salesforce"),
    ("transform", "transform"),
    ("set-payload", "setPayload"),
    ("http", "httpListener"),
];

/// Infer a connector type from a declared flow name
pub fn infer_connector_type(name: &str) -> Option<&'static str> {
    INFERENCE_RULES
        .iter()
        .find(|(keyword, _)| name.contains(keyword))
        .map(|(_, connector_type)| *connector_type)
}

pub struct RuntimeEngine {
    loader: FlowLoader,
    registry: ConnectorRegistry,
}

impl RuntimeEngine {
    pub fn new(loader: FlowLoader, registry: ConnectorRegistry) -> Self {
        Self { loader, registry }
    }

    /// Open a build directory: masterlist, optional global config and the
    /// built-in connectors
    pub fn initialize(build_dir: impl Into<PathBuf>, config: &RuntimeConfig) -> Result<Self, FlowError> {
        let build_dir = build_dir.into();
        tracing::info!("🚀 Initializing runtime from {}", build_dir.display());

        let loader = FlowLoader::open(&build_dir)?;
        let registry = ConnectorRegistry::with_builtins(config.reload_connectors);
        registry.set_global_config(GlobalConfig::load(&build_dir)?);

        tracing::info!("✅ Runtime initialized with {} flows", loader.index().len());
        Ok(Self::new(loader, registry))
    }

    pub fn loader(&self) -> &FlowLoader {
        &self.loader
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    /// Execute the flow indexed under `name` against `payload`
    pub fn execute_flow<'a>(&'a self, name: &'a str, payload: Value) -> FlowFuture<'a> {
        Box::pin(async move {
            tracing::info!("🔄 Executing flow: {}", name);

            let result = match self.loader.load(name) {
                Ok(document) => match &document.body {
                    FlowBody::Connector(def) => self.execute_connector(def, Some(name), payload).await,
                    FlowBody::Decision(def) => self.execute_decision(name, def, payload).await,
                    FlowBody::Sequence(steps) => self.execute_sequence(name, steps, payload).await,
                },
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                tracing::error!("❌ Error executing flow \"{}\": {}", name, e);
            }
            result
        })
    }

    /// Run a connector definition. `indexed_name` is the name the document
    /// was loaded under; inline connectors have none.
    async fn execute_connector(
        &self,
        def: &ConnectorDef,
        indexed_name: Option<&str>,
        payload: Value,
    ) -> Result<Value, FlowError> {
        let connector_type = match def.connector_type.as_deref().filter(|t| !t.is_empty()) {
            Some(explicit) => explicit,
            None => {
                let name = def.name.as_deref().or(indexed_name).unwrap_or_default();
                infer_connector_type(name).ok_or_else(|| FlowError::Inference {
                    name: name.to_string(),
                })?
            }
        };

        tracing::debug!("🔌 Executing connector: {}", connector_type);
        let result = self.registry.invoke(connector_type, &def.config, payload).await?;
        tracing::debug!("✅ Connector \"{}\" completed", connector_type);

        Ok(result)
    }

    async fn execute_decision(
        &self,
        owner: &str,
        def: &DecisionDef,
        payload: Value,
    ) -> Result<Value, FlowError> {
        tracing::debug!("🤔 Evaluating {} decision conditions", def.conditions.len());

        for condition in &def.conditions {
            if evaluate_condition(&condition.when, &payload) {
                tracing::debug!("✅ Condition matched, going to: {}", condition.go_to);
                return self.execute_flow(&condition.go_to, payload).await;
            }
        }

        if let Some(default) = &def.default {
            tracing::debug!("➡️ No conditions matched, using default: {}", default);
            return self.execute_flow(default, payload).await;
        }

        Err(FlowError::NoMatch {
            name: def.name.clone().unwrap_or_else(|| owner.to_string()),
        })
    }

    async fn execute_sequence(
        &self,
        owner: &str,
        steps: &[Step],
        payload: Value,
    ) -> Result<Value, FlowError> {
        let mut current = payload;

        for (position, step) in steps.iter().enumerate() {
            tracing::debug!(
                "📦 {} step {}/{} payload keys before: {:?}",
                owner,
                position + 1,
                steps.len(),
                payload_keys(&current)
            );

            current = match step {
                Step::Reference(name) | Step::ReferenceByField(name) => {
                    self.execute_flow(name, current).await?
                }
                Step::InlineConnector(def) => self.execute_connector(def, None, current).await?,
                Step::InlineDecision(def) => self.execute_decision(owner, def, current).await?,
            };
        }

        tracing::debug!("📦 {} finished with payload keys: {:?}", owner, payload_keys(&current));
        Ok(current)
    }
}

fn payload_keys(payload: &Value) -> Vec<&str> {
    payload
        .as_object()
        .map(|map| map.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_follows_keyword_order() {
        assert_eq!(infer_connector_type("create-user-mysql"), Some("mysql"));
        assert_eq!(infer_connector_type("postgres-orders"), Some("postgresql"));
        assert_eq!(infer_connector_type("set-payload-greeting"), Some("setPayload"));
        assert_eq!(infer_connector_type("http-listener"), Some("httpListener"));
        // "mysql" is checked before "http"
        assert_eq!(infer_connector_type("http-mysql-bridge"), Some("mysql"));
        assert_eq!(infer_connector_type("transform-http-body"), Some("transform"));
    }

    #[test]
    fn names_without_keywords_cannot_be_inferred() {
        assert_eq!(infer_connector_type("greet"), None);
        assert_eq!(infer_connector_type(""), None);
    }
}
