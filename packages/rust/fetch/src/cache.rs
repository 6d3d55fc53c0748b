//! On-disk sha cache for download change detection.
//!
//! Maps a repo-relative path to the git blob sha it was last downloaded at,
//! plus an integrity hash of the bytes written. A blob whose cached sha still
//! matches (and whose local file exists non-empty) is skipped on the next
//! run.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docshelf_shared::{DocshelfError, Result};

/// One cached download record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Git blob sha the file was downloaded at.
    pub sha: String,
    /// SHA-256 of the bytes written to disk.
    pub content_sha256: String,
    /// When the entry was last written.
    pub updated_at: DateTime<Utc>,
}

/// The persisted cache (`.cache/file-sha-cache.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShaCache {
    #[serde(default)]
    entries: HashMap<String, CacheEntry>,
}

impl ShaCache {
    /// Load a cache file; a missing or unreadable file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cache) => cache,
                Err(e) => {
                    warn!(?path, error = %e, "sha cache unreadable, starting fresh");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(?path, error = %e, "sha cache unreadable, starting fresh");
                Self::default()
            }
        }
    }

    /// Persist the cache, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocshelfError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DocshelfError::validation(format!("cache serialization: {e}")))?;
        std::fs::write(path, content).map_err(|e| DocshelfError::io(path, e))?;

        debug!(?path, entries = self.entries.len(), "sha cache saved");
        Ok(())
    }

    /// The cached blob sha for a path, if any.
    pub fn sha(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(|e| e.sha.as_str())
    }

    /// Record a completed download.
    pub fn record(&mut self, path: impl Into<String>, sha: impl Into<String>, content_sha256: impl Into<String>) {
        self.entries.insert(
            path.into(),
            CacheEntry {
                sha: sha.into(),
                content_sha256: content_sha256.into(),
                updated_at: Utc::now(),
            },
        );
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
