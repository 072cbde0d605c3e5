/// Connector Layer
///
/// Leaf actions dispatched by type string. Every implementation exposes the
/// single `execute(config, payload) -> payload` capability and is registered
/// statically at process start:
/// - setPayload / httpListener: payload shaping
/// - transform: sandboxed Lua scripts
/// - http: outbound requests via reqwest
/// - mysql / postgresql / sqlite: CRUD via sqlx

use async_trait::async_trait;
use serde_json::Value;

// Capability-keyed registry with reload mode and global config merge
pub mod registry;

// Dotted-path helpers shared by connectors
pub mod path;

// Built-in implementations
pub mod set_payload;
pub mod http_listener;
pub mod transform;
pub mod http;
pub mod sql;

pub use registry::{ConnectorFactory, ConnectorRegistry, GlobalConfig};

/// A pluggable leaf action
///
/// `config` is the call's configuration already merged over global defaults.
/// The returned value becomes the next payload.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn execute(&self, config: &Value, payload: Value) -> anyhow::Result<Value>;
}
