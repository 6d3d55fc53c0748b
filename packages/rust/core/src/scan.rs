//! Source-tree scanning.
//!
//! Walks the source directory, applies the skip list and config excludes,
//! and produces both the nested index tree and the flat list of documents to
//! convert. Directories sort before files; empty directories are omitted.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use docshelf_shared::{
    DocshelfError, IndexEntry, ReaderConfig, Result, is_allowed_extension, is_excluded,
    title_from_stem,
};

/// Directory/file name prefixes never scanned.
const SKIP_PREFIXES: [&str; 5] = [".git", "node_modules", ".cache", "reader", "target"];

/// Result of scanning a source tree.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Nested index entries, in display order.
    pub entries: Vec<IndexEntry>,
    /// Source-relative paths of every document to convert.
    pub documents: Vec<PathBuf>,
}

/// Scan `source_dir` for ingestible documents.
#[instrument(skip_all, fields(source = %source_dir.display()))]
pub fn scan_tree(source_dir: &Path, config: &ReaderConfig) -> Result<ScanResult> {
    if !source_dir.exists() {
        return Ok(ScanResult::default());
    }

    let mut documents = Vec::new();
    let entries = scan_dir(source_dir, source_dir, config, &mut documents)?;

    debug!(
        entries = entries.len(),
        documents = documents.len(),
        "scan complete"
    );

    Ok(ScanResult { entries, documents })
}

/// Recursively scan one directory level.
fn scan_dir(
    dir: &Path,
    root: &Path,
    config: &ReaderConfig,
    documents: &mut Vec<PathBuf>,
) -> Result<Vec<IndexEntry>> {
    let mut children: Vec<(bool, String, PathBuf)> = Vec::new();

    let read = std::fs::read_dir(dir).map_err(|e| DocshelfError::io(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| DocshelfError::io(dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if should_skip(&name) {
            continue;
        }

        children.push((path.is_file(), name, path));
    }

    // Directories first, then files, each group in name order
    children.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    let mut entries: Vec<IndexEntry> = Vec::new();

    for (is_file, name, path) in children {
        if !is_file {
            let nested = scan_dir(&path, root, config, documents)?;
            if !nested.is_empty() {
                entries.push(IndexEntry::folder(name, nested));
            }
            continue;
        }

        if !is_allowed_extension(&path) {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .expect("scanned path is under the scan root")
            .to_path_buf();
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if is_excluded(config, &rel_str) {
            debug!(path = %rel_str, "excluded by config");
            continue;
        }

        let output_path = rel.with_extension("html").to_string_lossy().replace('\\', "/");
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        entries.push(IndexEntry::file(name, output_path, title_from_stem(&stem)));
        documents.push(rel);
    }

    Ok(entries)
}

/// Skip-list check (prefix match, like dotfile conventions).
fn should_skip(name: &str) -> bool {
    SKIP_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}
