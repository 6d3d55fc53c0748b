//! `index.json` construction.
//!
//! The front end renders its sidebar from this file. Two producers exist:
//! the local scan already yields nested [`IndexEntry`] values, while the
//! remote build starts from a flat list of file paths and nests them here.
//! Both serialize with the same shape: folders before files, names in
//! case-insensitive order.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, instrument};

use docshelf_shared::{DocshelfError, EntryKind, IndexEntry, Result};

/// Build a nested index from flat source-relative paths (remote build path).
///
/// File entries are named by their stem and point at the `.html` output.
pub fn index_from_paths(paths: &[String]) -> Vec<IndexEntry> {
    #[derive(Default)]
    struct Node {
        dirs: BTreeMap<String, Node>,
        files: Vec<(String, String)>, // (stem, output path)
    }

    let mut tree = Node::default();

    for path in paths {
        let path = path.replace('\\', "/");
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            continue;
        };

        let mut node = &mut tree;
        for segment in segments {
            node = node.dirs.entry(segment.to_string()).or_default();
        }

        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let output = Path::new(&path)
            .with_extension("html")
            .to_string_lossy()
            .replace('\\', "/");

        node.files.push((stem, output));
    }

    fn to_entries(node: Node) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = Vec::new();

        for (name, child) in node.dirs {
            let children = to_entries(child);
            if !children.is_empty() {
                entries.push(IndexEntry::folder(name, children));
            }
        }
        for (stem, output) in node.files {
            entries.push(IndexEntry::file(stem.clone(), output, stem));
        }

        sort_entries(&mut entries);
        entries
    }

    to_entries(tree)
}

/// Sort folders before files, then by lowercase name; recursive.
fn sort_entries(entries: &mut [IndexEntry]) {
    entries.sort_by(|a, b| {
        let a_key = (a.kind != EntryKind::Folder, a.name.to_lowercase());
        let b_key = (b.kind != EntryKind::Folder, b.name.to_lowercase());
        a_key.cmp(&b_key)
    });

    for entry in entries.iter_mut() {
        if !entry.children.is_empty() {
            sort_entries(&mut entry.children);
        }
    }
}

/// Write entries as pretty JSON to `index.json`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_index(path: &Path, entries: &[IndexEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocshelfError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| DocshelfError::validation(format!("index serialization: {e}")))?;
    std::fs::write(path, json).map_err(|e| DocshelfError::io(path, e))?;

    debug!(entries = entries.len(), "index written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests_paths_into_folders() {
        let paths = vec![
            "guide/intro.md".to_string(),
            "guide/setup.md".to_string(),
            "readme.txt".to_string(),
        ];

        let entries = index_from_paths(&paths);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Folder);
        assert_eq!(entries[0].name, "guide");
        assert_eq!(entries[0].children.len(), 2);
        assert_eq!(entries[1].name, "readme");
        assert_eq!(entries[1].path.as_deref(), Some("readme.html"));
    }

    #[test]
    fn folders_sort_before_files_case_insensitive() {
        let paths = vec![
            "Zebra.md".to_string(),
            "apple.md".to_string(),
            "bin/tool.md".to_string(),
        ];

        let entries = index_from_paths(&paths);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bin", "apple", "Zebra"]);
    }

    #[test]
    fn deep_nesting_preserved() {
        let paths = vec!["a/b/c/deep.md".to_string()];
        let entries = index_from_paths(&paths);

        let a = &entries[0];
        let b = &a.children[0];
        let c = &b.children[0];
        assert_eq!(c.children[0].path.as_deref(), Some("a/b/c/deep.html"));
    }

    #[test]
    fn write_index_round_trips() {
        let dir = std::env::temp_dir().join(format!("docshelf-index-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("index.json");

        let entries = index_from_paths(&["notes/a.md".to_string()]);
        write_index(&path, &entries).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<IndexEntry> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "notes");
        assert!(content.contains(r#""type": "folder""#));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
