/// Masterlist compiler
///
/// Indexes every flow and subflow document, enforces name uniqueness across
/// both source trees, and checks that every reference resolves before the
/// runtime ever sees the build. Router documents get a second pass against the
/// finished index; that pass never adds entries.

use crate::error::BuildError;
use crate::flow::{extract_references, RouterConfig};
use crate::masterlist::index::MasterIndex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Area labels used in index values and error messages
const FLOWS_AREA: &str = "flows";
const SUBFLOWS_AREA: &str = "subflows";
const CONFIG_AREA: &str = "config";
const ROOT_ROUTER_FILE: &str = "router.config.json";

/// A JSON document discovered under a source root
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Base file name without extension
    pub name: String,
    /// Path relative to its source root, `/`-separated
    pub relative_path: String,
    /// Where the document was found, e.g. "subflows/users/create.json"
    pub source_location: String,
    /// Absolute (or caller-relative) path on disk
    pub path: PathBuf,
    pub content: Value,
}

/// Result of compiling the flows and subflows trees
#[derive(Debug, Clone)]
pub struct Compilation {
    pub index: MasterIndex,
    pub documents: Vec<SourceDocument>,
}

/// Result of compiling a whole source directory including router documents
#[derive(Debug, Clone)]
pub struct ProjectCompilation {
    pub compilation: Compilation,
    /// Distinct names referenced by router/config documents
    pub router_references: usize,
}

/// Compile the two source trees into a masterlist
pub fn compile(flows_root: &Path, subflows_root: &Path) -> Result<MasterIndex, BuildError> {
    compile_sources(flows_root, subflows_root).map(|compilation| compilation.index)
}

/// Compile the two source trees, keeping the discovered documents
pub fn compile_sources(flows_root: &Path, subflows_root: &Path) -> Result<Compilation, BuildError> {
    let mut index = MasterIndex::new();
    let mut locations: HashMap<String, String> = HashMap::new();
    let mut referenced = BTreeSet::new();
    let mut documents = Vec::new();

    for (area, root) in [(FLOWS_AREA, flows_root), (SUBFLOWS_AREA, subflows_root)] {
        for document in discover_documents(root, area)? {
            if let Some(first) = locations.get(&document.name) {
                return Err(BuildError::DuplicateName {
                    name: document.name.clone(),
                    first: first.clone(),
                    second: document.source_location.clone(),
                });
            }

            // Subflows are merged into the flows tree by the build
            index.insert(
                document.name.clone(),
                format!("{}/{}", FLOWS_AREA, document.relative_path),
            );
            locations.insert(document.name.clone(), document.source_location.clone());
            referenced.extend(extract_references(&document.content));

            tracing::debug!("📄 Indexed {} -> {}", document.name, document.source_location);
            documents.push(document);
        }
    }

    if index.is_empty() {
        return Err(BuildError::EmptyIndex);
    }

    let missing = unresolved(&index, referenced);
    if !missing.is_empty() {
        return Err(BuildError::UnresolvedReferences { missing });
    }

    tracing::info!("✅ Compiled masterlist with {} flow definitions", index.len());

    Ok(Compilation { index, documents })
}

/// Check router/config documents against an already-built index
///
/// Returns the number of distinct names the documents reference.
pub fn validate_router_documents(
    index: &MasterIndex,
    documents: &[SourceDocument],
) -> Result<usize, BuildError> {
    let mut referenced = BTreeSet::new();

    for document in documents {
        tracing::debug!("🔍 Validating config file: {}", document.source_location);
        referenced.extend(extract_references(&document.content));
        referenced.extend(
            RouterConfig::declared_targets(&document.content)
                .into_iter()
                .map(str::to_string),
        );
    }

    let count = referenced.len();
    let missing = unresolved(index, referenced);
    if !missing.is_empty() {
        return Err(BuildError::UnresolvedRouterReferences { missing });
    }

    // Declared targets resolve before route shapes are checked
    for document in documents {
        RouterConfig::from_value(&document.content).map_err(|e| BuildError::InvalidRouter {
            location: document.source_location.clone(),
            message: e.to_string(),
        })?;
    }

    Ok(count)
}

/// Compile `<src>/flows` and `<src>/subflows`, then validate the router
/// documents under `<src>/config` and `<src>/router.config.json`
pub fn compile_project(src_dir: &Path) -> Result<ProjectCompilation, BuildError> {
    tracing::info!("🔍 Validating all references in {}", src_dir.display());

    let compilation = compile_sources(&src_dir.join(FLOWS_AREA), &src_dir.join(SUBFLOWS_AREA))?;

    let mut router_documents = discover_documents(&src_dir.join(CONFIG_AREA), CONFIG_AREA)?;
    let root_router = src_dir.join(ROOT_ROUTER_FILE);
    if root_router.is_file() {
        router_documents.push(SourceDocument {
            name: "router.config".to_string(),
            relative_path: ROOT_ROUTER_FILE.to_string(),
            source_location: ROOT_ROUTER_FILE.to_string(),
            content: read_json(&root_router)?,
            path: root_router,
        });
    }

    let router_references = validate_router_documents(&compilation.index, &router_documents)?;
    tracing::info!(
        "✅ All references validated ({} router config references)",
        router_references
    );

    Ok(ProjectCompilation {
        compilation,
        router_references,
    })
}

/// Enumerate `.json` files under `root` in directory-then-name order.
/// A missing root yields no documents.
pub fn discover_documents(root: &Path, area: &str) -> Result<Vec<SourceDocument>, BuildError> {
    if !root.is_dir() {
        tracing::debug!("⏭️ Source directory not present: {}", root.display());
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }

        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let relative_path = relative_slash_path(root, path);

        documents.push(SourceDocument {
            name: name.to_string(),
            source_location: format!("{}/{}", area, relative_path),
            relative_path,
            content: read_json(path)?,
            path: path.to_path_buf(),
        });
    }

    Ok(documents)
}

/// Read and parse a JSON document
pub fn read_json(path: &Path) -> Result<Value, BuildError> {
    let data = std::fs::read(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|e| BuildError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn unresolved(index: &MasterIndex, referenced: BTreeSet<String>) -> Vec<String> {
    referenced
        .into_iter()
        .filter(|name| !index.contains(name))
        .collect()
}
