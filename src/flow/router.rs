/// Router configuration model
///
/// A router document is either a bare list of routes or `{ "routes": [...] }`.
/// Each route binds an HTTP method and path to an entry flow. The compiled
/// table is keyed `METHOD:PATH`, the shape consumed by the HTTP layer.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// File name of the router document inside the build directory
pub const ROUTER_FILE: &str = "router.config.json";

/// A single route entry as authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(rename = "flowReference", default, skip_serializing_if = "Option::is_none")]
    pub flow_reference: Option<String>,
}

impl Route {
    /// Target flow; `flowReference` wins over `flow`
    pub fn target(&self) -> Option<&str> {
        self.flow_reference.as_deref().or(self.flow.as_deref())
    }
}

/// Why a router-shaped document cannot be used
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    #[error("\"routes\" must be a list")]
    NotAList,
    #[error("route {index} is invalid: {message}")]
    InvalidRoute { index: usize, message: String },
}

/// Parsed router document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouterConfig {
    pub routes: Vec<Route>,
}

impl RouterConfig {
    /// Parse a router document
    ///
    /// `Ok(None)` when the value is not router-shaped (e.g. a global config
    /// document). Every route needs `method`, `path` and a target.
    pub fn from_value(value: &Value) -> Result<Option<Self>, RouterError> {
        let Some(items) = route_items(value)? else {
            return Ok(None);
        };

        let routes = items
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let route: Route = serde_json::from_value(raw.clone()).map_err(|e| {
                    RouterError::InvalidRoute {
                        index,
                        message: e.to_string(),
                    }
                })?;
                if route.target().is_none() {
                    return Err(RouterError::InvalidRoute {
                        index,
                        message: "missing \"flow\" or \"flowReference\"".to_string(),
                    });
                }
                Ok(route)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Self { routes }))
    }

    /// Targets named by any route of a router-shaped document, including
    /// routes that are otherwise malformed
    pub fn declared_targets(value: &Value) -> Vec<&str> {
        let Ok(Some(items)) = route_items(value) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|raw| {
                raw.get("flowReference")
                    .and_then(Value::as_str)
                    .or_else(|| raw.get("flow").and_then(Value::as_str))
            })
            .collect()
    }

    /// Load `<build_dir>/router.config.json`; `Ok(None)` when absent
    pub fn load(build_dir: &Path) -> Result<Option<Self>, FlowError> {
        let path = build_dir.join(ROUTER_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let data = std::fs::read(&path).map_err(|e| FlowError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let value: Value = serde_json::from_slice(&data).map_err(|e| FlowError::Io {
            path: path.clone(),
            message: format!("failed to parse router config: {}", e),
        })?;
        match Self::from_value(&value) {
            Ok(Some(router)) => Ok(Some(router)),
            Ok(None) => Err(FlowError::Io {
                path,
                message: "expected a route list or { \"routes\": [...] }".to_string(),
            }),
            Err(e) => Err(FlowError::Io {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Every flow name targeted by a route
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().filter_map(Route::target)
    }

    /// Compile into a `METHOD:PATH -> flow` table
    pub fn compile(&self) -> RouteTable {
        let mut table = RouteTable::default();
        for route in &self.routes {
            if let Some(flow) = route.target() {
                table.insert(&route.method, &route.path, flow);
            }
        }
        table
    }
}

/// The route list of a bare array or `{ "routes": [...] }`
fn route_items(value: &Value) -> Result<Option<&Vec<Value>>, RouterError> {
    match value {
        Value::Array(items) => Ok(Some(items)),
        Value::Object(obj) => match obj.get("routes") {
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(RouterError::NotAList),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Compiled route lookup table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    routes: BTreeMap<String, RouteEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub flow: String,
}

impl RouteTable {
    pub fn route_key(method: &str, path: &str) -> String {
        format!("{}:{}", method.to_uppercase(), path)
    }

    /// Insert a route; a later duplicate key replaces the earlier one
    pub fn insert(&mut self, method: &str, path: &str, flow: &str) {
        let key = Self::route_key(method, path);
        tracing::info!("🛣️ Route mapped: {} {} -> {}", method.to_uppercase(), path, flow);
        self.routes.insert(
            key,
            RouteEntry {
                method: method.to_uppercase(),
                path: path.to_string(),
                flow: flow.to_string(),
            },
        );
    }

    pub fn get(&self, method: &str, path: &str) -> Option<&str> {
        self.routes
            .get(&Self::route_key(method, path))
            .map(|entry| entry.flow.as_str())
    }

    /// Find the route serving `method` and a concrete request `path`
    ///
    /// An exact key wins; otherwise patterns with `:name` or `{name}`
    /// segments are tried in key order.
    pub fn match_route(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let method = method.to_uppercase();
        if let Some(entry) = self.routes.get(&Self::route_key(&method, path)) {
            return Some(RouteMatch {
                entry,
                params: BTreeMap::new(),
            });
        }

        self.routes
            .values()
            .filter(|entry| entry.method == method)
            .find_map(|entry| {
                match_pattern(&entry.path, path).map(|params| RouteMatch { entry, params })
            })
    }

    pub fn keys(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A matched route with its captured path parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: BTreeMap<String, String>,
}

fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let expected: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let actual: Vec<&str> = path.trim_matches('/').split('/').collect();
    if expected.len() != actual.len() {
        return None;
    }

    let mut params = BTreeMap::new();
    for (segment, value) in expected.iter().zip(actual) {
        let capture = segment
            .strip_prefix(':')
            .or_else(|| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')));
        match capture {
            Some(name) if !value.is_empty() => {
                params.insert(name.to_string(), value.to_string());
            }
            Some(_) => return None,
            None if *segment != value => return None,
            None => {}
        }
    }
    Some(params)
}
