//! End-to-end pipelines: `sync` (local tree → reader) and `build` (remote
//! repository → reader).
//!
//! Both flows share the conversion stage: documents render on a bounded
//! blocking-worker pool, per-file failures substitute an escaped error
//! fragment and land in the run report, and the run itself always completes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use docshelf_fetch::{FetchOptions, GithubFetcher, ShaCache, sanitized_rel_path};
use docshelf_render::{error_fragment, render_document};
use docshelf_shared::{DocKind, DocshelfError, IndexEntry, ReaderConfig, Result};

use crate::index::{index_from_paths, write_index};
use crate::prune::prune_orphans;
use crate::scan::scan_tree;

/// Default parallel conversion workers.
const DEFAULT_WORKERS: usize = 8;

// ---------------------------------------------------------------------------
// Extraction seam
// ---------------------------------------------------------------------------

/// Extraction collaborator for word-processor documents.
///
/// docshelf never parses `.docx` itself: an extractor produces an HTML
/// rendition of the document body and the engine post-processes that output.
/// With no extractor configured, `.docx` documents degrade to an error
/// fragment instead of aborting the run.
pub trait DocxExtractor: Send + Sync {
    /// Produce an HTML rendition of the document body.
    fn extract_html(&self, path: &Path) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Options & reports
// ---------------------------------------------------------------------------

/// Configuration for the `sync` pipeline.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Project root (holds the source tree and `reader/`).
    pub root: PathBuf,
    /// Parallel conversion workers.
    pub workers: usize,
}

impl SyncOptions {
    /// Options for a project root with default worker count.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Result of a `sync` run.
#[derive(Debug)]
pub struct SyncReport {
    /// Documents converted this run.
    pub converted: usize,
    /// Documents skipped because the output is up to date.
    pub skipped: usize,
    /// Failures as (source-relative path, error message).
    pub failed: Vec<(String, String)>,
    /// Orphaned outputs removed.
    pub pruned: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Configuration for the `build` pipeline.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Project root (holds `.cache/` and the default output directory).
    pub root: PathBuf,
    /// Output reader directory; defaults to `<root>/reader`.
    pub out_dir: Option<PathBuf>,
    /// Parallel conversion workers.
    pub workers: usize,
    /// Fetcher settings (timeouts, retries, concurrency, token).
    pub fetch: FetchOptions,
    /// API origin override (GitHub Enterprise, tests).
    pub api_base: Option<String>,
}

impl BuildOptions {
    /// Options for a project root with defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            out_dir: None,
            workers: DEFAULT_WORKERS,
            fetch: FetchOptions::default(),
            api_base: None,
        }
    }
}

/// Result of a `build` run.
#[derive(Debug)]
pub struct BuildReport {
    /// Files in the remote listing.
    pub listed: usize,
    /// Blobs downloaded this run.
    pub downloaded: usize,
    /// Blobs skipped via the sha cache.
    pub cached: usize,
    /// Documents converted this run.
    pub converted: usize,
    /// Documents skipped because the output is up to date.
    pub skipped: usize,
    /// Download and conversion failures as (path, error message).
    pub failed: Vec<(String, String)>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Sync pipeline
// ---------------------------------------------------------------------------

/// Run the local sync flow: prune → scan → convert → index.
#[instrument(skip_all, fields(root = %opts.root.display()))]
pub async fn run_sync(
    config: &ReaderConfig,
    opts: &SyncOptions,
    extractor: Option<Arc<dyn DocxExtractor>>,
) -> Result<SyncReport> {
    let start = Instant::now();

    let (source_dir, source_name) = resolve_source_dir(&opts.root, config);
    let reader_dir = opts.root.join("reader");
    let docs_dir = reader_dir.join("docs");

    if !source_dir.exists() {
        return Err(DocshelfError::validation(format!(
            "source directory does not exist: {}",
            source_dir.display()
        )));
    }

    info!(source = %source_dir.display(), "starting sync");

    // --- Phase 1: prune orphaned outputs ---
    let pruned = prune_orphans(&source_dir, &docs_dir)?;

    // --- Phase 2: scan the source tree ---
    let scan = scan_tree(&source_dir, config)?;
    info!(documents = scan.documents.len(), "scan complete");

    // --- Phase 3: convert ---
    let outcome =
        convert_documents(&source_dir, &docs_dir, &scan.documents, opts.workers, extractor).await;

    // --- Phase 4: write the index ---
    let entries = vec![IndexEntry::folder(source_name, scan.entries)];
    write_index(&reader_dir.join("index.json"), &entries)?;

    let report = SyncReport {
        converted: outcome.converted,
        skipped: outcome.skipped,
        failed: outcome.failed,
        pruned,
        elapsed: start.elapsed(),
    };

    info!(
        converted = report.converted,
        skipped = report.skipped,
        failed = report.failed.len(),
        pruned = report.pruned,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "sync complete"
    );

    Ok(report)
}

/// The source directory and its display name for the index root.
///
/// An explicitly configured `source_dir` wins; otherwise a `txt/` directory
/// under the root is auto-detected; otherwise the root itself is scanned.
fn resolve_source_dir(root: &Path, config: &ReaderConfig) -> (PathBuf, String) {
    if !config.source_dir.is_empty() {
        return (root.join(&config.source_dir), config.source_dir.clone());
    }

    let txt = root.join("txt");
    if txt.is_dir() {
        debug!("auto-detected txt/ source directory");
        return (txt, "txt".into());
    }

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "docs".into());
    (root.to_path_buf(), name)
}

// ---------------------------------------------------------------------------
// Build pipeline
// ---------------------------------------------------------------------------

/// Run the remote build flow: list → download → convert → index.
#[instrument(skip_all, fields(repo = %config.github_repo, branch = %config.target_branch))]
pub async fn run_build(
    config: &ReaderConfig,
    opts: &BuildOptions,
    extractor: Option<Arc<dyn DocxExtractor>>,
) -> Result<BuildReport> {
    let start = Instant::now();

    if config.github_repo.is_empty() {
        return Err(DocshelfError::config(
            "github_repo is not set; `build` needs a repository to fetch from",
        ));
    }

    let reader_dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| opts.root.join("reader"));
    let docs_dir = reader_dir.join("docs");
    let cache_dir = opts.root.join(".cache");
    let downloads_dir = cache_dir.join("downloads");
    let cache_path = cache_dir.join("file-sha-cache.json");

    // --- Phase 1: list remote files ---
    let mut fetcher = GithubFetcher::new(
        config.github_repo.as_str(),
        config.target_branch.as_str(),
        opts.fetch.clone(),
    )?;
    if let Some(base) = &opts.api_base {
        fetcher = fetcher.with_api_base(base.as_str());
    }

    let files = fetcher.fetch_file_list(config).await?;
    if files.is_empty() {
        return Err(DocshelfError::validation(
            "no documents found in the remote repository",
        ));
    }
    info!(files = files.len(), "remote file list fetched");

    // --- Phase 2: download ---
    let mut cache = ShaCache::load(&cache_path);
    let download = fetcher.download_all(&files, &downloads_dir, &mut cache).await;
    cache.save(&cache_path)?;

    // --- Phase 3: convert everything that made it to disk ---
    let documents: Vec<PathBuf> = files
        .iter()
        .filter(|f| !download.failed.iter().any(|(path, _)| path == &f.path))
        .map(|f| sanitized_rel_path(&f.path))
        .collect();

    let outcome =
        convert_documents(&downloads_dir, &docs_dir, &documents, opts.workers, extractor).await;

    // --- Phase 4: write the index ---
    let paths: Vec<String> = documents
        .iter()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect();
    write_index(&reader_dir.join("index.json"), &index_from_paths(&paths))?;

    let mut failed = download.failed;
    failed.extend(outcome.failed);

    let report = BuildReport {
        listed: files.len(),
        downloaded: download.downloaded,
        cached: download.cached,
        converted: outcome.converted,
        skipped: outcome.skipped,
        failed,
        elapsed: start.elapsed(),
    };

    info!(
        listed = report.listed,
        downloaded = report.downloaded,
        cached = report.cached,
        converted = report.converted,
        skipped = report.skipped,
        failed = report.failed.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "build complete"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// Conversion stage
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ConvertOutcome {
    converted: usize,
    skipped: usize,
    failed: Vec<(String, String)>,
}

/// Convert every document on a bounded blocking-worker pool.
async fn convert_documents(
    source_dir: &Path,
    docs_dir: &Path,
    documents: &[PathBuf],
    workers: usize,
    extractor: Option<Arc<dyn DocxExtractor>>,
) -> ConvertOutcome {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut outcome = ConvertOutcome::default();
    let mut handles = Vec::new();

    for rel in documents {
        let src = source_dir.join(rel);
        let dest = docs_dir.join(rel).with_extension("html");

        if is_unchanged(&src, &dest) {
            debug!(path = %rel.display(), "unchanged, skipping");
            outcome.skipped += 1;
            continue;
        }

        let sem = semaphore.clone();
        let extractor = extractor.clone();
        let rel = rel.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let rel_str = rel.to_string_lossy().replace('\\', "/");

            let result =
                tokio::task::spawn_blocking(move || convert_one(&src, &dest, extractor.as_deref()))
                    .await
                    .unwrap_or_else(|e| {
                        Err(DocshelfError::Render(format!("conversion task failed: {e}")))
                    });

            (rel_str, result)
        }));
    }

    for handle in handles {
        match handle.await {
            Ok((rel, Ok(()))) => {
                debug!(path = %rel, "converted");
                outcome.converted += 1;
            }
            Ok((rel, Err(e))) => {
                warn!(path = %rel, error = %e, "conversion failed");
                outcome.failed.push((rel, e.to_string()));
            }
            Err(e) => outcome.failed.push(("task".into(), e.to_string())),
        }
    }

    outcome
}

/// Convert one document to its HTML output.
///
/// Collaborator failures (file read, extraction) write an escaped error
/// fragment in place of the content and still surface the error to the
/// report.
fn convert_one(src: &Path, dest: &Path, extractor: Option<&dyn DocxExtractor>) -> Result<()> {
    let kind = DocKind::from_path(src);

    let rendered: Result<String> = match kind {
        DocKind::Docx => extractor
            .ok_or_else(|| DocshelfError::Render("no word-document extractor configured".into()))
            .and_then(|ex| ex.extract_html(src))
            .map(|extracted| render_document(DocKind::Docx, &extracted)),
        _ => read_text(src).map(|text| render_document(kind, &text)),
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocshelfError::io(parent, e))?;
    }

    match rendered {
        Ok(html) => {
            std::fs::write(dest, html).map_err(|e| DocshelfError::io(dest, e))?;
            Ok(())
        }
        Err(e) => {
            let fragment = error_fragment(&format!("document conversion failed: {e}"));
            std::fs::write(dest, fragment).map_err(|we| DocshelfError::io(dest, we))?;
            Err(e)
        }
    }
}

/// Read a source document as text. Undecodable bytes degrade lossily —
/// encoding detection is an upstream concern, not a reason to drop a file.
fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| DocshelfError::io(path, e))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

/// Skip conversion when the output is at least as new as the source.
fn is_unchanged(src: &Path, dest: &Path) -> bool {
    let (Ok(src_meta), Ok(dest_meta)) = (std::fs::metadata(src), std::fs::metadata(dest)) else {
        return false;
    };
    match (src_meta.modified(), dest_meta.modified()) {
        (Ok(src_time), Ok(dest_time)) => dest_time >= src_time,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubExtractor;

    impl DocxExtractor for StubExtractor {
        fn extract_html(&self, _path: &Path) -> Result<String> {
            Ok("<h1>Stub Title</h1><p>stub body</p>".into())
        }
    }

    fn temp_root(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("docshelf-pipeline-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn source_config() -> ReaderConfig {
        ReaderConfig {
            source_dir: "src-docs".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sync_converts_all_document_kinds() {
        let root = temp_root("kinds");
        write(&root.join("src-docs/note.md"), "# Title\n\nBody text here.");
        write(&root.join("src-docs/plain.txt"), "hello\n\nworld");
        write(&root.join("src-docs/report.docx"), "binary-placeholder");

        let report = run_sync(
            &source_config(),
            &SyncOptions::new(&root),
            Some(Arc::new(StubExtractor)),
        )
        .await
        .unwrap();

        assert_eq!(report.converted, 3);
        assert!(report.failed.is_empty());

        let note = std::fs::read_to_string(root.join("reader/docs/note.html")).unwrap();
        assert!(note.contains("<h1>Title</h1>"));
        assert!(note.contains("doc-metadata"));

        let plain = std::fs::read_to_string(root.join("reader/docs/plain.html")).unwrap();
        assert!(plain.contains("txt-wrapper content-prose"));

        let docx = std::fs::read_to_string(root.join("reader/docs/report.html")).unwrap();
        assert!(docx.contains("docx-wrapper"));
        assert!(docx.contains("Stub Title"));

        let index = std::fs::read_to_string(root.join("reader/index.json")).unwrap();
        assert!(index.contains(r#""name": "src-docs""#));
        assert!(index.contains(r#""path": "note.html""#));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn sync_skips_up_to_date_outputs() {
        let root = temp_root("skip");
        write(&root.join("src-docs/a.md"), "# A");

        let opts = SyncOptions::new(&root);
        let first = run_sync(&source_config(), &opts, None).await.unwrap();
        assert_eq!(first.converted, 1);

        let second = run_sync(&source_config(), &opts, None).await.unwrap();
        assert_eq!(second.converted, 0);
        assert_eq!(second.skipped, 1);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn sync_without_extractor_substitutes_error_fragment() {
        let root = temp_root("noextractor");
        write(&root.join("src-docs/report.docx"), "binary-placeholder");

        let report = run_sync(&source_config(), &SyncOptions::new(&root), None)
            .await
            .unwrap();

        assert_eq!(report.converted, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "report.docx");

        let html = std::fs::read_to_string(root.join("reader/docs/report.html")).unwrap();
        assert!(html.starts_with("<p class=\"error\">"));
        assert!(html.contains("no word-document extractor configured"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn sync_prunes_orphaned_outputs() {
        let root = temp_root("prune");
        write(&root.join("src-docs/live.md"), "# Live");
        write(&root.join("reader/docs/gone.html"), "<p>stale</p>");

        let report = run_sync(&source_config(), &SyncOptions::new(&root), None)
            .await
            .unwrap();

        assert_eq!(report.pruned, 1);
        assert!(!root.join("reader/docs/gone.html").exists());
        assert!(root.join("reader/docs/live.html").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn sync_missing_source_dir_is_an_error() {
        let root = temp_root("nosource");
        let result = run_sync(&source_config(), &SyncOptions::new(&root), None).await;
        assert!(matches!(result, Err(DocshelfError::Validation { .. })));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn build_fetches_converts_and_indexes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(url_path("/repos/owner/docs/git/ref/heads/master"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": { "sha": "head1" }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(url_path("/repos/owner/docs/git/trees/head1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tree": [
                    { "path": "guide/intro.md", "sha": "b1", "type": "blob", "size": 20 },
                    { "path": "readme.txt", "sha": "b2", "type": "blob", "size": 10 }
                ],
                "truncated": false
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(url_path("/repos/owner/docs/git/blobs/b1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Intro\n\nWelcome."))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/repos/owner/docs/git/blobs/b2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain body"))
            .mount(&server)
            .await;

        let root = temp_root("build");
        let config = ReaderConfig {
            github_repo: "owner/docs".into(),
            ..Default::default()
        };

        let mut opts = BuildOptions::new(&root);
        opts.api_base = Some(server.uri());
        opts.fetch.backoff_base_ms = 1;

        let report = run_build(&config, &opts, None).await.unwrap();
        assert_eq!(report.listed, 2);
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.converted, 2);
        assert!(report.failed.is_empty());

        let intro = std::fs::read_to_string(root.join("reader/docs/guide/intro.html")).unwrap();
        assert!(intro.contains("<h1>Intro</h1>"));

        let index = std::fs::read_to_string(root.join("reader/index.json")).unwrap();
        assert!(index.contains(r#""path": "guide/intro.html""#));
        assert!(index.contains(r#""path": "readme.html""#));

        // Second run: downloads are cache hits, conversions are skipped
        let report = run_build(&config, &opts, None).await.unwrap();
        assert_eq!(report.downloaded, 0);
        assert_eq!(report.cached, 2);
        assert_eq!(report.converted, 0);
        assert_eq!(report.skipped, 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn build_without_repo_is_a_config_error() {
        let root = temp_root("norepo");
        let config = ReaderConfig::default();
        let result = run_build(&config, &BuildOptions::new(&root), None).await;
        assert!(matches!(result, Err(DocshelfError::Config { .. })));
        let _ = std::fs::remove_dir_all(&root);
    }
}
