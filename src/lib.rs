/// APIA: declarative flow compiler and runtime
///
/// This library provides the build-time masterlist compiler that validates a
/// tree of JSON flow documents, and the runtime that interprets those
/// documents against a payload through pluggable connectors.

// Core configuration and setup
pub mod config;

// Build and runtime error types
pub mod error;

// Flow document model, reference extraction and router config
pub mod flow;

// Build phase - discovery, uniqueness, closed-world validation, packaging
pub mod masterlist;

// Runtime execution engine - loader cache, condition evaluator, interpreter
pub mod runtime;

// Connector contract, registry and built-in connectors
pub mod connectors;

// HTTP API layer - flow-backed routes and status endpoint
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{BuildError, FlowError, FlowErrorKind};
pub use flow::{FlowDocument, RouteTable, RouterConfig};
pub use masterlist::{build, validate, MasterIndex};
pub use runtime::RuntimeEngine;
pub use connectors::{Connector, ConnectorRegistry};
pub use server::{create_app, start_server};
