/// Hot-reload connector registry using ArcSwap
///
/// Implementations are registered as factories keyed by connector type. A
/// resolved instance is cached until the type is re-registered; in reload
/// mode every resolution goes back to the factory. Global per-type defaults
/// live here too, so invoking a connector always sees the merged config.

use crate::connectors::{http, http_listener, set_payload, sql, transform, Connector};
use crate::error::FlowError;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// File name of the optional defaults document inside the build directory
pub const GLOBAL_CONFIG_FILE: &str = "global.config.json";

/// Produces a connector instance. Failing here means the registered module
/// cannot provide `execute`.
pub type ConnectorFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Connector>> + Send + Sync>;

/// Per-connector-type default configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalConfig {
    defaults: HashMap<String, Value>,
}

impl GlobalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<build_dir>/global.config.json`; absent means no defaults
    pub fn load(build_dir: &Path) -> Result<Self, FlowError> {
        let path = build_dir.join(GLOBAL_CONFIG_FILE);
        if !path.is_file() {
            tracing::debug!("⏭️ No global config at {}", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read(&path).map_err(|e| FlowError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_slice(&data).map_err(|e| FlowError::Io {
            path,
            message: format!("failed to parse global config: {}", e),
        })?;
        tracing::info!("⚙️ Loaded global config for {} connector types", config.defaults.len());
        Ok(config)
    }

    pub fn set(&mut self, connector_type: impl Into<String>, defaults: Value) {
        self.defaults.insert(connector_type.into(), defaults);
    }

    pub fn get(&self, connector_type: &str) -> Option<&Value> {
        self.defaults.get(connector_type)
    }

    /// Shallow merge: call-site keys win over the type's defaults
    pub fn merge(&self, connector_type: &str, config: &Value) -> Value {
        let Some(Value::Object(defaults)) = self.defaults.get(connector_type) else {
            return config.clone();
        };

        let mut merged: Map<String, Value> = defaults.clone();
        if let Value::Object(call) = config {
            for (key, value) in call {
                merged.insert(key.clone(), value.clone());
            }
        }
        Value::Object(merged)
    }
}

pub struct ConnectorRegistry {
    factories: ArcSwap<HashMap<String, ConnectorFactory>>,
    /// Resolved instances keyed by connector type
    instances: ArcSwap<HashMap<String, Arc<dyn Connector>>>,
    global_config: ArcSwap<GlobalConfig>,
    reload: bool,
}

impl ConnectorRegistry {
    /// Empty registry
    pub fn new(reload: bool) -> Self {
        Self {
            factories: ArcSwap::new(Arc::new(HashMap::new())),
            instances: ArcSwap::new(Arc::new(HashMap::new())),
            global_config: ArcSwap::new(Arc::new(GlobalConfig::default())),
            reload,
        }
    }

    /// Registry populated with every statically linked connector
    pub fn with_builtins(reload: bool) -> Self {
        let registry = Self::new(reload);
        registry.register_instance("setPayload", Arc::new(set_payload::SetPayloadConnector));
        registry.register_instance("httpListener", Arc::new(http_listener::HttpListenerConnector));
        registry.register_instance("transform", Arc::new(transform::TransformConnector));
        registry.register(
            "http",
            Arc::new(|| -> anyhow::Result<Arc<dyn Connector>> {
                Ok(Arc::new(http::HttpConnector::new()?))
            }),
        );
        for dialect in sql::Dialect::ALL {
            registry.register_instance(
                dialect.connector_type(),
                Arc::new(sql::SqlConnector::new(dialect)),
            );
        }
        tracing::info!(
            "🔌 Registered {} built-in connectors{}",
            registry.registered_types().len(),
            if reload { " (reload mode)" } else { "" }
        );
        registry
    }

    /// Register or replace the factory for `connector_type`
    ///
    /// Re-registering evicts any cached instance, which is how a running
    /// process picks up a new implementation.
    pub fn register(&self, connector_type: impl Into<String>, factory: ConnectorFactory) {
        let connector_type = connector_type.into();

        let previous = self.factories.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(connector_type.clone(), Arc::clone(&factory));
            next
        });
        let replaced = previous.contains_key(&connector_type);

        if replaced {
            self.evict(&connector_type);
            tracing::info!("♻️ Re-registered connector: {}", connector_type);
        } else {
            tracing::debug!("🔌 Registered connector: {}", connector_type);
        }
    }

    /// Register a shared instance
    pub fn register_instance(&self, connector_type: impl Into<String>, connector: Arc<dyn Connector>) {
        self.register(
            connector_type,
            Arc::new(move || -> anyhow::Result<Arc<dyn Connector>> { Ok(Arc::clone(&connector)) }),
        );
    }

    pub fn set_global_config(&self, config: GlobalConfig) {
        self.global_config.store(Arc::new(config));
    }

    pub fn global_config(&self) -> Arc<GlobalConfig> {
        self.global_config.load_full()
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.load().keys().cloned().collect();
        types.sort();
        types
    }

    /// Resolve the implementation for `connector_type`
    pub fn resolve(&self, connector_type: &str) -> Result<Arc<dyn Connector>, FlowError> {
        if !self.reload {
            if let Some(connector) = self.instances.load().get(connector_type) {
                return Ok(Arc::clone(connector));
            }
        }

        let factory = self
            .factories
            .load()
            .get(connector_type)
            .cloned()
            .ok_or_else(|| FlowError::ConnectorNotFound {
                connector_type: connector_type.to_string(),
            })?;

        let connector = factory().map_err(|e| FlowError::ContractViolation {
            connector_type: connector_type.to_string(),
            message: e.to_string(),
        })?;

        if self.reload {
            tracing::debug!("🔄 Reloaded connector: {}", connector_type);
        } else {
            self.instances.rcu(|current| {
                let mut next = HashMap::clone(current);
                next.entry(connector_type.to_string())
                    .or_insert_with(|| Arc::clone(&connector));
                next
            });
        }

        Ok(connector)
    }

    /// Resolve `connector_type`, merge its global defaults under `config`
    /// and run it against `payload`
    pub async fn invoke(
        &self,
        connector_type: &str,
        config: &Value,
        payload: Value,
    ) -> Result<Value, FlowError> {
        let connector = self.resolve(connector_type)?;
        let merged = self.global_config.load().merge(connector_type, config);

        connector
            .execute(&merged, payload)
            .await
            .map_err(|source| FlowError::Connector {
                connector_type: connector_type.to_string(),
                source,
            })
    }

    fn evict(&self, connector_type: &str) {
        self.instances.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(connector_type);
            next
        });
    }
}
