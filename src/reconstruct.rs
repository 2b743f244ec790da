//! Eager (full-document) reconstruction entry points.
//!
//! [`reconstruct`] walks the requested pages one at a time, waits for every
//! model call, and assembles the final HTML before returning. Use
//! [`crate::stream::reconstruct_stream`] to receive page fragments as they
//! finish instead.
//!
//! Pages are never sent concurrently: the model service throttles bursts,
//! and the pacing delay between requests keeps a run under its rate limit.

use crate::asset::SourceAsset;
use crate::config::ReconstructionConfig;
use crate::document::assemble_document;
use crate::error::{Manual2HtmlError, ModelError};
use crate::output::{PageFragment, ReconstructionOutput, ReconstructionStats};
use crate::pages::parse_pages;
use crate::pipeline::extract::extract_fragment;
use crate::pipeline::gemini::GeminiClient;
use crate::pipeline::model::PageModel;
use crate::pipeline::{input, llm};
use crate::progress::{page_message, ASSEMBLY_MESSAGE};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Rebuild the requested pages of `asset` as one English HTML document.
///
/// # Arguments
/// * `asset`: the manual page(s): a PDF or a single page image
/// * `page_spec`: physical pages to rebuild, e.g. `"5"`, `"1-3, 8"`
/// * `config`: credential, endpoint, pacing and progress settings
///
/// # Returns
/// `Ok(ReconstructionOutput)` once every page was attempted. Pages that
/// failed are error placeholders in the document (check
/// `output.stats.failed_pages`), unless the configured
/// [`FailurePolicy`](crate::FailurePolicy) rejects the run.
///
/// # Errors
/// - [`Manual2HtmlError::MissingCredential`] before any request is made
/// - [`Manual2HtmlError::InvalidPageRange`] if `page_spec` names no page
/// - [`Manual2HtmlError::Cancelled`] if the cancel token fires mid-run
/// - [`Manual2HtmlError::TooManyPageFailures`] if the failure policy says so
pub async fn reconstruct(
    asset: &SourceAsset,
    page_spec: &str,
    config: &ReconstructionConfig,
) -> Result<ReconstructionOutput, Manual2HtmlError> {
    let total_start = Instant::now();
    let (pages, model) = prepare(page_spec, config)?;
    let total = pages.len();
    info!(
        "Reconstructing {} page(s) [{}] from {} with {}",
        total,
        page_spec,
        asset.media_type(),
        model.name()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_reconstruction_start(total);
    }

    // ── Page loop ────────────────────────────────────────────────────────
    let mut fragments = Vec::with_capacity(total);
    for (index, &page_num) in pages.iter().enumerate() {
        if is_cancelled(config) {
            return Err(Manual2HtmlError::Cancelled {
                completed: index,
                total,
            });
        }
        announce_page(config, page_num, index, total);
        if !pace(config, index, total).await {
            return Err(Manual2HtmlError::Cancelled {
                completed: index,
                total,
            });
        }
        fragments.push(rebuild_page(&model, asset, page_num, index, total, config).await);
    }

    // ── Assembly ─────────────────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_message(ASSEMBLY_MESSAGE);
    }
    let html = assemble_document(&fragments);

    let mut stats = ReconstructionStats::from_fragments(&fragments);
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    if config.failure_policy.rejects(stats.failed_pages, total) {
        let first_error = fragments
            .iter()
            .find_map(|f| f.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Manual2HtmlError::TooManyPageFailures {
            failed: stats.failed_pages,
            total,
            first_error,
        });
    }

    info!(
        "Reconstruction complete: {}/{} pages, {}ms total",
        stats.succeeded_pages, total, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_reconstruction_complete(total, stats.succeeded_pages);
    }

    Ok(ReconstructionOutput {
        html,
        pages: fragments,
        stats,
    })
}

/// Resolve a local path or HTTP(S) URL, then [`reconstruct`] it.
pub async fn reconstruct_from_input(
    input_str: impl AsRef<str>,
    page_spec: &str,
    config: &ReconstructionConfig,
) -> Result<ReconstructionOutput, Manual2HtmlError> {
    // Fail on a missing credential or a bad page list before downloading anything.
    if config.credential().is_none() {
        return Err(Manual2HtmlError::MissingCredential);
    }
    parse_pages(page_spec)?;
    let asset = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    reconstruct(&asset, page_spec, config).await
}

/// Reconstruct and write the document directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn reconstruct_to_file(
    input_str: impl AsRef<str>,
    page_spec: &str,
    output_path: impl AsRef<Path>,
    config: &ReconstructionConfig,
) -> Result<ReconstructionStats, Manual2HtmlError> {
    let output = reconstruct_from_input(input_str, page_spec, config).await?;
    write_document(output_path.as_ref(), &output.html).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`reconstruct`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn reconstruct_sync(
    asset: &SourceAsset,
    page_spec: &str,
    config: &ReconstructionConfig,
) -> Result<ReconstructionOutput, Manual2HtmlError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Manual2HtmlError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(reconstruct(asset, page_spec, config))
}

/// Write `html` to `path` through a sibling temp file.
pub async fn write_document(path: &Path, html: &str) -> Result<(), Manual2HtmlError> {
    let write_err = |e| Manual2HtmlError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("html.tmp");
    tokio::fs::write(&tmp_path, html).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", html.len(), path.display());
    Ok(())
}

// ── Shared with the streaming entry point ────────────────────────────────

/// Check the credential, parse the page list and pick the model.
///
/// The credential is checked first so that a misconfigured run never
/// reaches the model, not even to construct a client.
pub(crate) fn prepare(
    page_spec: &str,
    config: &ReconstructionConfig,
) -> Result<(Vec<u32>, Arc<dyn PageModel>), Manual2HtmlError> {
    if config.credential().is_none() {
        return Err(Manual2HtmlError::MissingCredential);
    }
    let pages = parse_pages(page_spec)?;
    let model = resolve_model(config)?;
    Ok((pages, model))
}

/// An injected client wins; otherwise build the Gemini client.
fn resolve_model(config: &ReconstructionConfig) -> Result<Arc<dyn PageModel>, Manual2HtmlError> {
    if let Some(ref model) = config.model_client {
        return Ok(Arc::clone(model));
    }
    match GeminiClient::from_config(config) {
        Ok(client) => Ok(Arc::new(client)),
        Err(ModelError::MissingCredential) => Err(Manual2HtmlError::MissingCredential),
        Err(e) => Err(Manual2HtmlError::Internal(format!(
            "cannot build model client: {e}"
        ))),
    }
}

pub(crate) fn is_cancelled(config: &ReconstructionConfig) -> bool {
    config.cancel.as_ref().is_some_and(|t| t.is_cancelled())
}

pub(crate) fn announce_page(config: &ReconstructionConfig, page_num: u32, index: usize, total: usize) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_message(&page_message(page_num, index + 1, total));
        cb.on_page_start(page_num, index + 1, total);
    }
}

/// Sleep the pacing delay before request `index`. Returns `false` if the
/// run was cancelled while waiting.
pub(crate) async fn pace(config: &ReconstructionConfig, index: usize, total: usize) -> bool {
    let delay = config.pacing_delay(index, total);
    if delay.is_zero() {
        return !is_cancelled(config);
    }
    debug!("Pacing {:?} before request {}/{}", delay, index + 1, total);
    match config.cancel {
        Some(ref token) => {
            tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

/// One page: model call, container extraction, progress report.
///
/// Never fails: a model error becomes a placeholder fragment.
pub(crate) async fn rebuild_page(
    model: &Arc<dyn PageModel>,
    asset: &SourceAsset,
    page_num: u32,
    index: usize,
    total: usize,
    config: &ReconstructionConfig,
) -> PageFragment {
    let start = Instant::now();
    match llm::reconstruct_page(model, asset, page_num, config).await {
        Ok(page) => {
            let html = extract_fragment(&page.html);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_complete(page_num, index + 1, total, html.len());
            }
            PageFragment::success(
                page_num,
                html,
                page.input_tokens,
                page.output_tokens,
                page.duration_ms,
                page.retries,
            )
        }
        Err(err) => {
            warn!("Page {} failed: {}", page_num, err);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_error(page_num, index + 1, total, &err.to_string());
            }
            PageFragment::failed(page_num, err, start.elapsed().as_millis() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_checks_credential_before_pages() {
        let config = ReconstructionConfig::default();
        assert!(matches!(
            prepare("not pages", &config),
            Err(Manual2HtmlError::MissingCredential)
        ));
    }

    #[test]
    fn prepare_rejects_empty_page_list() {
        let config = ReconstructionConfig::builder().api_key("k").build().unwrap();
        assert!(matches!(
            prepare("abc", &config),
            Err(Manual2HtmlError::InvalidPageRange { .. })
        ));
    }

    #[test]
    fn prepare_builds_gemini_client_by_default() {
        let config = ReconstructionConfig::builder()
            .api_key("k")
            .model("gemini-test")
            .build()
            .unwrap();
        let (pages, model) = prepare("2, 1", &config).unwrap();
        assert_eq!(pages, vec![1, 2]);
        assert_eq!(model.name(), "gemini:gemini-test");
    }

    #[tokio::test]
    async fn from_input_checks_credential_before_reading() {
        let err = reconstruct_from_input("/no/such/file.png", "1", &ReconstructionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Manual2HtmlError::MissingCredential));
    }

    #[tokio::test]
    async fn from_input_checks_pages_before_reading() {
        let config = ReconstructionConfig::builder().api_key("k").build().unwrap();
        let err = reconstruct_from_input("/no/such/file.png", "3-1", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Manual2HtmlError::InvalidPageRange { .. }));
    }

    #[tokio::test]
    async fn write_document_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("manual.html");
        write_document(&path, "<html></html>").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
        assert!(!path.with_extension("html.tmp").exists());
    }

    #[test]
    fn sync_wrapper_reports_missing_credential() {
        let asset = SourceAsset::new(b"%PDF-1.4".to_vec(), "application/pdf");
        let err = reconstruct_sync(&asset, "1", &ReconstructionConfig::default()).unwrap_err();
        assert!(matches!(err, Manual2HtmlError::MissingCredential));
    }
}
