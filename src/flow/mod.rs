/// Flow Definition Layer
///
/// This module handles the flow document model shared by the build phase and
/// the runtime:
/// - Typed documents and step shapes (sequence, connector, decision)
/// - Reference extraction for whole-program validation
/// - Router configuration parsing

// Core flow type definitions
pub mod types;

// Reference extraction used by the masterlist compiler
pub mod references;

// Router configuration and route table
pub mod router;

// Re-export commonly used types
pub use references::extract_references;
pub use router::{
    Route, RouteEntry, RouteMatch, RouteTable, RouterConfig, RouterError, ROUTER_FILE,
};
pub use types::{Condition, ConnectorDef, DecisionDef, FlowBody, FlowDocument, FlowKind, Step};
