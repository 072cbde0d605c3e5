/// Flow Runtime
///
/// Run-time half of the system:
/// - Loading documents through the masterlist with a read-through cache
/// - Evaluating decision conditions in a payload-only scope
/// - Interpreting connector, decision and sequence documents

// Masterlist-backed document loader and cache
pub mod loader;

// Restricted condition expression evaluator
pub mod expression;

// Recursive flow interpreter
pub mod engine;

// Re-export main types
pub use engine::{infer_connector_type, FlowFuture, RuntimeEngine};
pub use expression::{evaluate, evaluate_condition, ExpressionError};
pub use loader::FlowLoader;
