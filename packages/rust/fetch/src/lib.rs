//! GitHub document retrieval.
//!
//! Instead of cloning the repository, docshelf lists the branch tree via the
//! Git Trees API, filters it down to ingestible documents, and downloads the
//! matching blobs individually — with bounded concurrency, status-dependent
//! retry/backoff, and an on-disk sha cache so unchanged files are not fetched
//! twice.

mod cache;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use docshelf_shared::{DocshelfError, ReaderConfig, Result, is_allowed_extension, is_excluded};

pub use cache::{CacheEntry, ShaCache};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("docshelf/", env!("CARGO_PKG_VERSION"));

/// Public GitHub API origin.
const GITHUB_API_BASE: &str = "https://api.github.com";

/// Default timeout in seconds for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum attempts per blob.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default unit for retry delays (see [`retry_delay`]).
const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default concurrent blob downloads.
const DEFAULT_CONCURRENCY: usize = 4;

// ---------------------------------------------------------------------------
// Options and result types
// ---------------------------------------------------------------------------

/// Configuration for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
    /// Maximum attempts per blob download.
    pub max_retries: u32,
    /// Base unit for retry delays in ms; rate-limit and server-error waits
    /// are fixed multiples of it, other failures back off exponentially.
    pub backoff_base_ms: u64,
    /// Maximum concurrent blob downloads.
    pub concurrency: usize,
    /// API token (`Authorization: token …`), if available.
    pub token: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            concurrency: DEFAULT_CONCURRENCY,
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

/// One ingestible blob from the branch tree.
///
/// `path` is relative to the configured source directory (or the repo root).
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Source-relative path.
    pub path: String,
    /// Git blob sha.
    pub sha: String,
    /// Blob size in bytes, when the API reports it.
    pub size: Option<u64>,
}

/// Summary of a completed download pass.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    /// Blobs fetched and written.
    pub downloaded: usize,
    /// Blobs skipped via the sha cache.
    pub cached: usize,
    /// Failures as (path, error message).
    pub failed: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// GitHub API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GitRefResponse {
    object: GitRefObject,
}

#[derive(Debug, Deserialize)]
struct GitRefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitTreeResponse {
    #[serde(default)]
    tree: Vec<GitTreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GitTreeItem {
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Lists and downloads ingestible documents from one GitHub branch.
pub struct GithubFetcher {
    client: Client,
    api_base: String,
    repo: String,
    branch: String,
    opts: FetchOptions,
}

impl GithubFetcher {
    /// Create a fetcher for `owner/name` at `branch`.
    pub fn new(repo: impl Into<String>, branch: impl Into<String>, opts: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| DocshelfError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: GITHUB_API_BASE.to_string(),
            repo: repo.into(),
            branch: branch.into(),
            opts,
        })
    }

    /// Point the fetcher at a different API origin (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Resolve the branch head commit sha.
    pub async fn resolve_head(&self) -> Result<String> {
        let url = format!(
            "{}/repos/{}/git/ref/heads/{}",
            self.api_base, self.repo, self.branch
        );
        let reference: GitRefResponse = self.get_json(&url).await?;

        debug!(sha = %reference.object.sha, branch = %self.branch, "branch head resolved");
        Ok(reference.object.sha)
    }

    /// List ingestible blobs under `commit_sha`, filtered by extension, the
    /// configured source directory, and the config exclude rules.
    #[instrument(skip_all, fields(repo = %self.repo, sha = %commit_sha))]
    pub async fn list_files(&self, commit_sha: &str, config: &ReaderConfig) -> Result<Vec<RemoteFile>> {
        let url = format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            self.api_base, self.repo, commit_sha
        );
        let tree: GitTreeResponse = self.get_json(&url).await?;

        if tree.truncated {
            warn!(repo = %self.repo, "tree listing truncated by the API, some files may be missing");
        }

        let prefix = if config.source_dir.is_empty() {
            None
        } else {
            Some(format!("{}/", config.source_dir.trim_end_matches('/')))
        };

        let mut files = Vec::new();
        for item in tree.tree {
            if item.kind != "blob" {
                continue;
            }

            let rel = match &prefix {
                Some(p) => match item.path.strip_prefix(p.as_str()) {
                    Some(rel) => rel,
                    None => continue,
                },
                None => item.path.as_str(),
            };

            if !is_allowed_extension(Path::new(rel)) {
                continue;
            }
            if is_excluded(config, rel) {
                debug!(path = rel, "excluded by config");
                continue;
            }

            files.push(RemoteFile {
                path: rel.to_string(),
                sha: item.sha,
                size: item.size,
            });
        }

        info!(count = files.len(), "remote file list ready");
        Ok(files)
    }

    /// Resolve the branch head and list its ingestible files in one step.
    pub async fn fetch_file_list(&self, config: &ReaderConfig) -> Result<Vec<RemoteFile>> {
        let head = self.resolve_head().await?;
        self.list_files(&head, config).await
    }

    /// Download all `files` into `dest_dir`, skipping sha-cache hits.
    ///
    /// Failures are collected per file; the pass always completes.
    #[instrument(skip_all, fields(repo = %self.repo, files = files.len()))]
    pub async fn download_all(
        &self,
        files: &[RemoteFile],
        dest_dir: &Path,
        cache: &mut ShaCache,
    ) -> DownloadReport {
        let semaphore = Arc::new(Semaphore::new(self.opts.concurrency));
        let mut report = DownloadReport::default();
        let mut handles = Vec::new();

        for file in files {
            let dest = sanitized_dest(dest_dir, &file.path);

            let unchanged = cache.sha(&file.path) == Some(file.sha.as_str())
                && std::fs::metadata(&dest).map(|m| m.len() > 0).unwrap_or(false);
            if unchanged {
                debug!(path = %file.path, "unchanged, skipping download");
                report.cached += 1;
                continue;
            }

            let client = self.client.clone();
            let sem = semaphore.clone();
            let url = format!("{}/repos/{}/git/blobs/{}", self.api_base, self.repo, file.sha);
            let opts = self.opts.clone();
            let file = file.clone();

            handles.push(tokio::spawn(async move {
                let outcome: Result<String> = async {
                    let _permit = sem.acquire().await.expect("semaphore closed");
                    let bytes = download_blob(&client, &url, &opts).await?;

                    if let Some(parent) = dest.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| DocshelfError::io(parent, e))?;
                    }
                    std::fs::write(&dest, &bytes).map_err(|e| DocshelfError::io(&dest, e))?;

                    debug!(path = %dest.display(), bytes = bytes.len(), "downloaded");
                    Ok(sha256_hex(&bytes))
                }
                .await;

                (file, outcome)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((file, Ok(content_hash))) => {
                    cache.record(&file.path, &file.sha, content_hash);
                    report.downloaded += 1;
                }
                Ok((file, Err(e))) => {
                    warn!(path = %file.path, error = %e, "download failed");
                    report.failed.push((file.path, e.to_string()));
                }
                Err(e) => {
                    report.failed.push(("task".into(), e.to_string()));
                }
            }
        }

        info!(
            downloaded = report.downloaded,
            cached = report.cached,
            failed = report.failed.len(),
            "download pass complete"
        );
        report
    }

    /// GET a JSON API endpoint with auth and status checking.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.opts.token {
            request = request.header("Authorization", format!("token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DocshelfError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocshelfError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DocshelfError::validation(format!("{url}: unexpected payload: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Blob download with retries
// ---------------------------------------------------------------------------

/// One attempt's failure: fatal errors stop immediately, retryable ones carry
/// the status (if any) so the delay can be chosen.
enum AttemptError {
    Fatal(DocshelfError),
    Retryable(DocshelfError, Option<StatusCode>),
}

/// Download one blob with up to `opts.max_retries` attempts.
async fn download_blob(client: &Client, url: &str, opts: &FetchOptions) -> Result<Vec<u8>> {
    let mut attempt: u32 = 0;
    loop {
        match fetch_blob_once(client, url, opts.token.as_deref()).await {
            Ok(bytes) => return Ok(bytes),
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Retryable(e, status)) => {
                attempt += 1;
                if attempt >= opts.max_retries {
                    return Err(e);
                }
                let delay = retry_delay(status, attempt - 1, opts.backoff_base_ms);
                debug!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying download");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Single raw-blob GET.
async fn fetch_blob_once(
    client: &Client,
    url: &str,
    token: Option<&str>,
) -> std::result::Result<Vec<u8>, AttemptError> {
    let mut request = client
        .get(url)
        .header("Accept", "application/vnd.github.v3.raw");
    if let Some(token) = token {
        request = request.header("Authorization", format!("token {token}"));
    }

    let response = request
        .send()
        .await
        .map_err(|e| AttemptError::Retryable(DocshelfError::Network(format!("{url}: {e}")), None))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(AttemptError::Fatal(DocshelfError::Network(format!(
            "{url}: HTTP 404"
        ))));
    }
    if !status.is_success() {
        return Err(AttemptError::Retryable(
            DocshelfError::Network(format!("{url}: HTTP {status}")),
            Some(status),
        ));
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| {
            AttemptError::Retryable(
                DocshelfError::Network(format!("{url}: body read failed: {e}")),
                None,
            )
        })
}

/// Delay before the next attempt: rate limits wait long, server errors wait a
/// short fixed time, everything else backs off exponentially.
fn retry_delay(status: Option<StatusCode>, attempt: u32, base_ms: u64) -> Duration {
    let ms = match status {
        Some(s) if s == StatusCode::FORBIDDEN || s == StatusCode::TOO_MANY_REQUESTS => base_ms * 60,
        Some(s) if s.is_server_error() => base_ms * 5,
        _ => base_ms.saturating_mul(2u64.saturating_pow(attempt)),
    };
    Duration::from_millis(ms)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Replace characters that are invalid in file names on common filesystems.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if matches!(c, '"' | ':' | '<' | '>' | '|' | '*' | '?' | '\r' | '\n') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// A source-relative path with its file name sanitized. This is the path a
/// downloaded blob actually lands at under the destination directory.
pub fn sanitized_rel_path(rel_path: &str) -> PathBuf {
    let rel = Path::new(rel_path);
    let name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(rel_path);
    let sanitized = sanitize_file_name(name);

    match rel.parent() {
        Some(parent) if parent != Path::new("") => parent.join(sanitized),
        _ => PathBuf::from(sanitized),
    }
}

/// Destination path for a source-relative file, with its name sanitized.
fn sanitized_dest(dest_dir: &Path, rel_path: &str) -> PathBuf {
    dest_dir.join(sanitized_rel_path(rel_path))
}

/// SHA-256 hex digest of downloaded content.
fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
