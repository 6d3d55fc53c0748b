//! Orphan cleanup for the generated docs directory.
//!
//! A generated `.html` file is an orphan when no source document maps to it
//! any more. Orphans are deleted and directories left empty by the deletion
//! are removed bottom-up.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use docshelf_shared::{DocshelfError, Result, is_allowed_extension};

/// Remove generated files whose source no longer exists.
///
/// Returns the number of files deleted. Missing docs directory is a no-op.
#[instrument(skip_all, fields(docs = %docs_dir.display()))]
pub fn prune_orphans(source_dir: &Path, docs_dir: &Path) -> Result<usize> {
    if !docs_dir.exists() {
        return Ok(0);
    }

    let mut valid: HashSet<String> = HashSet::new();
    collect_valid_outputs(source_dir, source_dir, &mut valid)?;

    let mut deleted = 0;
    delete_orphans(docs_dir, docs_dir, &valid, &mut deleted)?;
    remove_empty_dirs(docs_dir)?;

    if deleted > 0 {
        info!(deleted, "orphan cleanup complete");
    }
    Ok(deleted)
}

/// Collect the output-relative paths every current source maps to.
fn collect_valid_outputs(dir: &Path, root: &Path, valid: &mut HashSet<String>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let read = std::fs::read_dir(dir).map_err(|e| DocshelfError::io(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| DocshelfError::io(dir, e))?;
        let path = entry.path();

        if path.is_dir() {
            collect_valid_outputs(&path, root, valid)?;
        } else if is_allowed_extension(&path) {
            let rel = path
                .strip_prefix(root)
                .expect("walked path is under the walk root")
                .with_extension("html");
            valid.insert(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    Ok(())
}

/// Delete generated `.html` files not present in the valid set.
fn delete_orphans(
    dir: &Path,
    root: &Path,
    valid: &HashSet<String>,
    deleted: &mut usize,
) -> Result<()> {
    let read = std::fs::read_dir(dir).map_err(|e| DocshelfError::io(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| DocshelfError::io(dir, e))?;
        let path = entry.path();

        if path.is_dir() {
            delete_orphans(&path, root, valid, deleted)?;
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .expect("walked path is under the walk root")
            .to_string_lossy()
            .replace('\\', "/");

        if !valid.contains(&rel) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %rel, "orphan removed");
                    *deleted += 1;
                }
                Err(e) => warn!(path = %rel, error = %e, "failed to remove orphan"),
            }
        }
    }

    Ok(())
}

/// Remove directories left empty, children before parents. The root itself
/// is kept.
fn remove_empty_dirs(root: &Path) -> Result<()> {
    fn visit(dir: &Path) {
        let Ok(read) = std::fs::read_dir(dir) else {
            return;
        };
        let children: Vec<PathBuf> = read.filter_map(|e| e.ok().map(|e| e.path())).collect();
        for child in children {
            if child.is_dir() {
                visit(&child);
                // Fails while non-empty, which is the signal we want
                let _ = std::fs::remove_dir(&child);
            }
        }
    }

    visit(root);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docshelf-prune-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    #[test]
    fn removes_orphans_keeps_live_outputs() {
        let root = temp_root("basic");
        let source = root.join("src");
        let docs = root.join("docs");

        touch(&source.join("keep.md"));
        touch(&docs.join("keep.html"));
        touch(&docs.join("orphan.html"));

        let deleted = prune_orphans(&source, &docs).unwrap();
        assert_eq!(deleted, 1);
        assert!(docs.join("keep.html").exists());
        assert!(!docs.join("orphan.html").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn all_source_kinds_map_to_html() {
        let root = temp_root("kinds");
        let source = root.join("src");
        let docs = root.join("docs");

        touch(&source.join("a.txt"));
        touch(&source.join("b.md"));
        touch(&source.join("c.docx"));
        touch(&docs.join("a.html"));
        touch(&docs.join("b.html"));
        touch(&docs.join("c.html"));

        let deleted = prune_orphans(&source, &docs).unwrap();
        assert_eq!(deleted, 0);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn removes_directories_left_empty() {
        let root = temp_root("emptydirs");
        let source = root.join("src");
        let docs = root.join("docs");

        std::fs::create_dir_all(&source).unwrap();
        touch(&docs.join("old/section/page.html"));

        let deleted = prune_orphans(&source, &docs).unwrap();
        assert_eq!(deleted, 1);
        assert!(!docs.join("old").exists());
        assert!(docs.exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn non_html_files_in_docs_are_untouched() {
        let root = temp_root("nonhtml");
        let source = root.join("src");
        let docs = root.join("docs");

        std::fs::create_dir_all(&source).unwrap();
        touch(&docs.join("assets.css"));

        let deleted = prune_orphans(&source, &docs).unwrap();
        assert_eq!(deleted, 0);
        assert!(docs.join("assets.css").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_docs_dir_is_noop() {
        let root = temp_root("missing");
        let deleted = prune_orphans(&root.join("src"), &root.join("docs")).unwrap();
        assert_eq!(deleted, 0);
        let _ = std::fs::remove_dir_all(&root);
    }
}
