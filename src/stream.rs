//! Streaming reconstruction API: emit page fragments as they complete.
//!
//! Unlike the eager [`crate::reconstruct::reconstruct`] which returns only
//! after all pages finish, [`reconstruct_stream`] yields each
//! [`PageFragment`] as soon as its model call returns. Pages are still
//! processed one at a time with the same pacing, so fragments always arrive
//! in ascending page order.
//!
//! A failed page is yielded as a placeholder fragment, never as an error.
//! When the cancel token fires, the stream simply ends.

use crate::asset::SourceAsset;
use crate::config::ReconstructionConfig;
use crate::error::Manual2HtmlError;
use crate::output::PageFragment;
use crate::reconstruct::{announce_page, is_cancelled, pace, prepare, rebuild_page};
use futures::stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = PageFragment> + Send>>;

/// Reconstruct pages, streaming each fragment as it is ready.
///
/// The credential check, page parsing and model selection happen before
/// this returns; the model calls happen as the stream is polled.
///
/// # Returns
/// - `Ok(FragmentStream)`: one [`PageFragment`] per requested page
/// - `Err(Manual2HtmlError)`: missing credential or empty page list
///
/// # Example
/// ```rust,no_run
/// use edgequake_manual2html::{assemble_document, reconstruct_stream, ReconstructionConfig, SourceAsset};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let asset = SourceAsset::new(std::fs::read("manual.pdf")?, "application/pdf");
/// let config = ReconstructionConfig::builder().api_key("key").build()?;
/// let fragments: Vec<_> = reconstruct_stream(&asset, "1-4", &config)?.collect().await;
/// for f in &fragments {
///     println!("page {}: {} bytes", f.page_num, f.html.len());
/// }
/// let html = assemble_document(&fragments);
/// # let _ = html;
/// # Ok(())
/// # }
/// ```
pub fn reconstruct_stream(
    asset: &SourceAsset,
    page_spec: &str,
    config: &ReconstructionConfig,
) -> Result<FragmentStream, Manual2HtmlError> {
    let (pages, model) = prepare(page_spec, config)?;
    let total = pages.len();
    info!("Starting streaming reconstruction of {} page(s)", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_reconstruction_start(total);
    }

    let state = (
        pages.into_iter().enumerate(),
        Arc::new(asset.clone()),
        model,
        config.clone(),
    );

    let s = stream::unfold(state, move |(mut remaining, asset, model, cfg)| async move {
        let (index, page_num) = remaining.next()?;
        if is_cancelled(&cfg) {
            info!("Stream cancelled before page {}", page_num);
            return None;
        }
        announce_page(&cfg, page_num, index, total);
        if !pace(&cfg, index, total).await {
            info!("Stream cancelled before page {}", page_num);
            return None;
        }
        let fragment = rebuild_page(&model, &asset, page_num, index, total, &cfg).await;
        Some((fragment, (remaining, asset, model, cfg)))
    });

    Ok(Box::pin(s))
}
