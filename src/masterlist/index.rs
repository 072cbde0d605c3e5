/// Persisted masterlist index
///
/// Maps every flow/subflow name to its document path relative to the build
/// directory. Keys are kept sorted so the serialized artifact is byte-identical
/// across rebuilds of an unchanged tree.

use crate::error::{BuildError, FlowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the persisted index inside the build directory
pub const MASTERLIST_FILE: &str = "masterlist.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasterIndex {
    entries: BTreeMap<String, String>,
}

impl MasterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative document path for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, name: String, location: String) {
        self.entries.insert(name, location);
    }

    /// Pretty-printed JSON artifact
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Write the artifact to `<build_dir>/masterlist.json`
    pub fn write(&self, build_dir: &Path) -> Result<(), BuildError> {
        let path = build_dir.join(MASTERLIST_FILE);
        let json = self.to_json_string().map_err(|e| BuildError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|source| BuildError::Io { path, source })
    }

    /// Load the artifact from `<build_dir>/masterlist.json`
    pub fn load(build_dir: &Path) -> Result<Self, FlowError> {
        let path = build_dir.join(MASTERLIST_FILE);
        if !path.is_file() {
            return Err(FlowError::ManifestMissing { path });
        }
        let data = std::fs::read(&path).map_err(|e| FlowError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;
        serde_json::from_slice(&data).map_err(|e| FlowError::Io {
            path,
            message: format!("failed to parse masterlist: {}", e),
        })
    }
}

impl FromIterator<(String, String)> for MasterIndex {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
