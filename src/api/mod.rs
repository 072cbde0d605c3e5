/// HTTP API Layer
///
/// Exposes compiled flows over HTTP:
/// - Route table dispatch to entry flows
/// - Request -> payload and result -> response conversion
/// - Runtime status reporting

// Flow-backed routes, status endpoint and CORS middleware
pub mod routes;

// Re-export router builder and state
pub use routes::{create_flow_routes, RuntimeState};
