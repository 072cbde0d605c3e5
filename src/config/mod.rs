/// Configuration management for the apia toolchain
///
/// Handles server binding, source/build directory layout, and runtime switches.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Source and build directory layout
    pub build: BuildConfig,
    /// Flow runtime switches
    pub runtime: RuntimeConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Directory layout for the build phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Source tree holding flows/, subflows/ and config/ (default: "src")
    pub src_dir: String,
    /// Build output read by the runtime (default: ".apia")
    /// Contains: masterlist.json, flows/, router.config.json, global.config.json
    pub build_dir: String,
}

/// Runtime behaviour switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Re-resolve connector modules on every call instead of caching them
    pub reload_connectors: bool,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("APIA_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("APIA_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            build: BuildConfig {
                src_dir: std::env::var("APIA_SRC_DIR").unwrap_or_else(|_| "src".to_string()),
                build_dir: std::env::var("APIA_BUILD_DIR")
                    .unwrap_or_else(|_| ".apia".to_string()),
            },
            runtime: RuntimeConfig {
                reload_connectors: std::env::var("APIA_RELOAD_CONNECTORS")
                    .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
                    .unwrap_or(false),
            },
        }
    }
}
