/// Error types for the build phase and the flow runtime
///
/// Build-time failures abort the whole build. Runtime failures are fatal to
/// the single call chain that raised them and carry the offending name.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while compiling the masterlist or packaging a build
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("I/O error at \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON file \"{}\": {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// The same base name was found in two places
    #[error("Duplicate JSON definition found: \"{name}\" exists in both \"{first}\" and \"{second}\"")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    #[error("No JSON files found in flows or subflows directories")]
    EmptyIndex,

    #[error("Referenced JSON files not found: {}", quote_names(missing))]
    UnresolvedReferences { missing: Vec<String> },

    #[error("Router config references missing JSON files: {}", quote_names(missing))]
    UnresolvedRouterReferences { missing: Vec<String> },

    /// A router-shaped config document with a malformed route
    #[error("Invalid router config \"{location}\": {message}")]
    InvalidRouter { location: String, message: String },
}

/// Render names the way the build reports them: `"a.json", "b.json"`
fn quote_names(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{}.json\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse failure classes callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowErrorKind {
    NotFound,
    ContractViolation,
    Inference,
    NoMatch,
    UnknownStep,
    InvalidDocument,
    Connector,
    Initialization,
}

/// Failures raised while loading or executing a flow
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Masterlist not found at {}. Did you run the build?", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("I/O error at \"{}\": {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Flow \"{name}\" not found in masterlist")]
    FlowNotFound { name: String },

    #[error("Flow file not found for \"{name}\": {}", path.display())]
    FlowFileMissing { name: String, path: PathBuf },

    #[error("Invalid flow document \"{name}\": {message}")]
    InvalidDocument { name: String, message: String },

    #[error("Connector \"{connector_type}\" is not registered")]
    ConnectorNotFound { connector_type: String },

    #[error("Connector \"{connector_type}\" has no usable execute capability: {message}")]
    ContractViolation {
        connector_type: String,
        message: String,
    },

    #[error("Cannot infer connector type for: {name}")]
    Inference { name: String },

    #[error("No decision conditions matched and no default path specified in \"{name}\"")]
    NoMatch { name: String },

    #[error("Unknown subflow type: {step}")]
    UnknownStep { step: String },

    #[error("Connector \"{connector_type}\" failed: {source}")]
    Connector {
        connector_type: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FlowError {
    pub fn kind(&self) -> FlowErrorKind {
        match self {
            FlowError::ManifestMissing { .. } | FlowError::Io { .. } => FlowErrorKind::Initialization,
            FlowError::FlowNotFound { .. }
            | FlowError::FlowFileMissing { .. }
            | FlowError::ConnectorNotFound { .. } => FlowErrorKind::NotFound,
            FlowError::InvalidDocument { .. } => FlowErrorKind::InvalidDocument,
            FlowError::ContractViolation { .. } => FlowErrorKind::ContractViolation,
            FlowError::Inference { .. } => FlowErrorKind::Inference,
            FlowError::NoMatch { .. } => FlowErrorKind::NoMatch,
            FlowError::UnknownStep { .. } => FlowErrorKind::UnknownStep,
            FlowError::Connector { .. } => FlowErrorKind::Connector,
        }
    }
}
