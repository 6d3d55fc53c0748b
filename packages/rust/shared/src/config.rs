//! Reader configuration for docshelf.
//!
//! The front end and the build tool share one config file at
//! `reader/config.json` inside the project root. CLI flags override config
//! file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocshelfError, Result};

/// Config file path relative to the project root.
const CONFIG_REL_PATH: &str = "reader/config.json";

// ---------------------------------------------------------------------------
// Config struct (matching reader/config.json schema)
// ---------------------------------------------------------------------------

/// Reader configuration, deserialized from `reader/config.json`.
///
/// All fields are optional in the file; defaults keep the front end working
/// with an empty config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Source directory (relative to the project root) to scan for documents.
    /// Empty means the project root itself.
    #[serde(default)]
    pub source_dir: String,

    /// Glob patterns (matched against the source-relative path) to exclude.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Exact file names to exclude.
    #[serde(default)]
    pub exclude_files: Vec<String>,

    /// Site title shown by the front end.
    #[serde(default = "default_site_title")]
    pub site_title: String,

    /// Sidebar title shown by the front end.
    #[serde(default = "default_sidebar_title")]
    pub sidebar_title: String,

    /// Whether the front end enables search.
    #[serde(default = "default_true")]
    pub enable_search: bool,

    /// Document path opened by default (empty = none).
    #[serde(default)]
    pub home_page: String,

    /// GitHub repository (`owner/name`) to fetch documents from in `build`.
    #[serde(default)]
    pub github_repo: String,

    /// Branch to fetch from.
    #[serde(default = "default_branch")]
    pub target_branch: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            source_dir: String::new(),
            exclude_patterns: Vec::new(),
            exclude_files: Vec::new(),
            site_title: default_site_title(),
            sidebar_title: default_sidebar_title(),
            enable_search: true,
            home_page: String::new(),
            github_repo: String::new(),
            target_branch: default_branch(),
        }
    }
}

fn default_site_title() -> String {
    "文档阅读器".into()
}
fn default_sidebar_title() -> String {
    "文档目录".into()
}
fn default_true() -> bool {
    true
}
fn default_branch() -> String {
    "master".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config file under a project root.
pub fn config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_REL_PATH)
}

/// Load the reader config from a project root. Returns defaults if the file
/// does not exist.
pub fn load_config(root: &Path) -> Result<ReaderConfig> {
    let path = config_file_path(root);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(ReaderConfig::default());
    }

    load_config_from(&path)
}

/// Load the reader config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<ReaderConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocshelfError::io(path, e))?;

    serde_json::from_str(&content).map_err(|e| {
        DocshelfError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the reader directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config(root: &Path) -> Result<PathBuf> {
    let path = config_file_path(root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocshelfError::io(parent, e))?;
    }

    let config = ReaderConfig::default();
    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| DocshelfError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocshelfError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// Exclusion matching
// ---------------------------------------------------------------------------

/// Check whether a source-relative path is excluded by the config.
///
/// A path is excluded when any glob pattern matches it (or, for patterns
/// without a `/`, matches its file name), or when its file name appears in
/// `exclude_files`.
pub fn is_excluded(config: &ReaderConfig, rel_path: &str) -> bool {
    let rel = rel_path.replace('\\', "/");
    let file_name = rel.rsplit('/').next().unwrap_or(&rel);

    if config.exclude_files.iter().any(|f| f == file_name) {
        return true;
    }

    config.exclude_patterns.iter().any(|pattern| {
        let Some(re) = glob_to_regex(pattern) else {
            return false;
        };
        if re.is_match(&rel) {
            return true;
        }
        !pattern.contains('/') && re.is_match(file_name)
    })
}

/// Convert a glob-like pattern to a regex (`**` spans segments, `*` does not).
fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*/", "(?:.*/)?")
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}
