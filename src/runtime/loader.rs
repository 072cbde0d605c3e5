/// Flow loader and document cache
///
/// Resolves names through the masterlist, parses documents on first use and
/// keeps them in a lock-free cache. Concurrent loads of the same name may both
/// parse; the resulting documents are identical so either insert wins.

use crate::error::FlowError;
use crate::flow::FlowDocument;
use crate::masterlist::MasterIndex;
use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub struct FlowLoader {
    build_dir: PathBuf,
    index: MasterIndex,
    /// Parsed documents keyed by flow name
    cache: ArcSwap<HashMap<String, Arc<FlowDocument>>>,
}

impl FlowLoader {
    /// Read `<build_dir>/masterlist.json` and create an empty cache
    pub fn open(build_dir: impl Into<PathBuf>) -> Result<Self, FlowError> {
        let build_dir = build_dir.into();
        let index = MasterIndex::load(&build_dir)?;
        tracing::info!("📚 Loaded masterlist with {} flow definitions", index.len());
        Ok(Self::with_index(build_dir, index))
    }

    pub fn with_index(build_dir: impl Into<PathBuf>, index: MasterIndex) -> Self {
        Self {
            build_dir: build_dir.into(),
            index,
            cache: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    pub fn index(&self) -> &MasterIndex {
        &self.index
    }

    /// Load `name`, serving repeat requests from the cache
    pub fn load(&self, name: &str) -> Result<Arc<FlowDocument>, FlowError> {
        if let Some(document) = self.cache.load().get(name) {
            return Ok(Arc::clone(document));
        }

        let location = self.index.get(name).ok_or_else(|| FlowError::FlowNotFound {
            name: name.to_string(),
        })?;
        let path = self.build_dir.join(location);

        let data = std::fs::read(&path).map_err(|_| FlowError::FlowFileMissing {
            name: name.to_string(),
            path: path.clone(),
        })?;
        let content: Value =
            serde_json::from_slice(&data).map_err(|e| FlowError::InvalidDocument {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let document = Arc::new(FlowDocument::parse(name, &content)?);
        tracing::debug!("📥 Loaded flow '{}' ({}) from {}", name, document.kind().as_str(), path.display());

        self.cache.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.entry(name.to_string())
                .or_insert_with(|| Arc::clone(&document));
            next
        });

        Ok(document)
    }

    /// Number of cached documents
    pub fn cached(&self) -> usize {
        self.cache.load().len()
    }
}
