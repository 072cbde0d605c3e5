/// Build packaging
///
/// Validates a source tree and lays out the build directory the runtime reads:
/// `masterlist.json`, the merged `flows/` tree, and the optional router and
/// global configuration documents.

use crate::error::BuildError;
use crate::masterlist::compiler::{compile_project, ProjectCompilation};
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

/// Optional configuration documents copied to the build root
const CONFIG_FILES: [&str; 2] = ["router.config.json", "global.config.json"];

/// Summary of a finished build
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub masterlist_entries: usize,
    pub router_references: usize,
    pub files_copied: usize,
}

/// Validate `src_dir` without writing anything
pub fn validate(src_dir: &Path) -> Result<ProjectCompilation, BuildError> {
    compile_project(src_dir)
}

/// Compile, validate and package `src_dir` into `build_dir`
///
/// Nothing is written when validation fails.
pub fn build(src_dir: &Path, build_dir: &Path, clean: bool) -> Result<BuildStats, BuildError> {
    tracing::info!("🏗️ Building project {} -> {}", src_dir.display(), build_dir.display());

    let project = compile_project(src_dir)?;

    if clean && build_dir.exists() {
        tracing::debug!("🧹 Cleaning build directory: {}", build_dir.display());
        std::fs::remove_dir_all(build_dir).map_err(|source| io_error(build_dir, source))?;
    }
    std::fs::create_dir_all(build_dir).map_err(|source| io_error(build_dir, source))?;

    let flows_out = build_dir.join("flows");
    let mut files_copied = 0;
    for area in ["flows", "subflows"] {
        files_copied += copy_tree(&src_dir.join(area), &flows_out)?;
    }

    let config_dir = src_dir.join("config");
    for file in CONFIG_FILES {
        let source = config_dir.join(file);
        if source.is_file() {
            copy_file(&source, &build_dir.join(file))?;
            files_copied += 1;
            tracing::info!("✅ Copied {}", file);
        } else {
            tracing::warn!("⚠️ {} not found, skipping", file);
        }
    }

    project.compilation.index.write(build_dir)?;

    let stats = BuildStats {
        masterlist_entries: project.compilation.index.len(),
        router_references: project.router_references,
        files_copied,
    };
    tracing::info!(
        "🎉 Build complete: masterlist with {} JSON definitions",
        stats.masterlist_entries
    );

    Ok(stats)
}

/// Copy every file under `from` into `to`, preserving relative paths
fn copy_tree(from: &Path, to: &Path) -> Result<usize, BuildError> {
    if !from.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            BuildError::Io { path, source }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        copy_file(entry.path(), &to.join(relative))?;
        copied += 1;
    }

    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    std::fs::copy(from, to).map_err(|source| io_error(from, source))?;
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}
