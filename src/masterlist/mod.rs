/// Masterlist Build Layer
///
/// Build-time half of the system. Everything here runs before a single flow
/// executes:
/// - Source discovery and the name -> location index
/// - Duplicate-name and closed-world reference checks
/// - Packaging the build directory consumed by the runtime

// Persisted name -> location index
pub mod index;

// Source discovery, uniqueness and reference validation
pub mod compiler;

// Build directory packaging
pub mod builder;

// Re-export commonly used items
pub use builder::{build, validate, BuildStats};
pub use compiler::{compile, compile_project, compile_sources};
pub use index::{MasterIndex, MASTERLIST_FILE};
