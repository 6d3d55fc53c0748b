//! Core domain types for the document reader.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// File extensions the reader ingests.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["txt", "md", "docx"];

/// Check whether a path has an ingestible extension (case-insensitive).
pub fn is_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// DocKind
// ---------------------------------------------------------------------------

/// The kind of source document, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// Lightweight markup, rendered by the block scanner.
    Markdown,
    /// Raw text, rendered by the paragraph splitter.
    PlainText,
    /// Word-processor document, extracted by an external collaborator.
    Docx,
}

impl DocKind {
    /// Classify a path by its extension. Unknown extensions render as plain
    /// text, matching the reader's "everything is readable" contract.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") => Self::Markdown,
            Some("docx") => Self::Docx,
            _ => Self::PlainText,
        }
    }
}

// ---------------------------------------------------------------------------
// IndexEntry
// ---------------------------------------------------------------------------

/// One node of the `index.json` tree the front end renders as the sidebar.
///
/// Files carry `path` (output-relative, `.html` suffix) and `title`; folders
/// carry `children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Entry kind: `"file"` or `"folder"`.
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// File or folder name as it appears in the source tree.
    pub name: String,

    /// Display title (file stem with `-`/`_` mapped to spaces).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Output path relative to `docs/` (files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Child entries (folders only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<IndexEntry>,
}

/// Discriminator for [`IndexEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl IndexEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>, path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::File,
            name: name.into(),
            title: Some(title.into()),
            path: Some(path.into()),
            children: Vec::new(),
        }
    }

    /// Create a folder entry.
    pub fn folder(name: impl Into<String>, children: Vec<IndexEntry>) -> Self {
        Self {
            kind: EntryKind::Folder,
            name: name.into(),
            title: None,
            path: None,
            children,
        }
    }
}

/// Derive a display title from a file stem (`-`/`_` → spaces).
pub fn title_from_stem(stem: &str) -> String {
    stem.replace(['-', '_'], " ")
}
