//! Progress-callback trait for reconstruction events.
//!
//! Inject an [`Arc<dyn ReconstructionProgressCallback>`] via
//! [`crate::config::ReconstructionConfigBuilder::progress_callback`] to
//! receive events while pages are rebuilt. Callers can forward events to a
//! terminal progress bar, a channel feeding a UI thread, or a log.
//!
//! Events are fire-and-forget: they are invoked synchronously from the
//! reconstruction flow and must return quickly.
//!
//! # Example
//!
//! ```rust
//! use edgequake_manual2html::{MessageCallback, ReconstructionConfig};
//! use std::sync::Arc;
//!
//! let config = ReconstructionConfig::builder()
//!     .api_key("key")
//!     .progress_callback(Arc::new(MessageCallback(|msg: &str| eprintln!("{msg}"))))
//!     .build()
//!     .unwrap();
//! ```

use crate::status::ReconstructionStatus;
use std::sync::Arc;

/// Called by the orchestrator and the session as a run progresses.
///
/// Implementations must be `Send + Sync` so the callback can be shared with
/// a UI running on another thread. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait ReconstructionProgressCallback: Send + Sync {
    /// Human-readable progress line, e.g. `"Processing page 5 (2/4)..."`.
    fn on_message(&self, message: &str) {
        let _ = message;
    }

    /// Called once the page specification has been parsed.
    ///
    /// # Arguments
    /// * `total_pages`: number of pages that will be requested
    fn on_reconstruction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the model request for a page.
    ///
    /// # Arguments
    /// * `page_num`: physical page number being rebuilt
    /// * `position`: 1-based position of this page in the run
    /// * `total`: number of pages in the run
    fn on_page_start(&self, page_num: u32, position: usize, total: usize) {
        let _ = (page_num, position, total);
    }

    /// Called when a page produced a fragment.
    ///
    /// `html_len` is the byte length of the extracted fragment.
    fn on_page_complete(&self, page_num: u32, position: usize, total: usize, html_len: usize) {
        let _ = (page_num, position, total, html_len);
    }

    /// Called when a page failed and was replaced by an error placeholder.
    fn on_page_error(&self, page_num: u32, position: usize, total: usize, error: &str) {
        let _ = (page_num, position, total, error);
    }

    /// Called once after every page has been attempted.
    ///
    /// # Arguments
    /// * `total_pages`: pages in the run
    /// * `success_count`: pages that produced a real fragment
    fn on_reconstruction_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }

    /// Called by [`crate::status::ReconstructionSession`] on every status change.
    fn on_status_change(&self, status: ReconstructionStatus) {
        let _ = status;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReconstructionProgressCallback for NoopProgressCallback {}

/// Adapter that forwards only the human-readable messages to a closure.
pub struct MessageCallback<F>(pub F);

impl<F> ReconstructionProgressCallback for MessageCallback<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn on_message(&self, message: &str) {
        (self.0)(message)
    }
}

/// Convenience alias matching the type stored in [`crate::config::ReconstructionConfig`].
pub type ProgressCallback = Arc<dyn ReconstructionProgressCallback>;

/// Progress line emitted before each page request.
pub fn page_message(page_num: u32, position: usize, total: usize) -> String {
    format!("Processing page {page_num} ({position}/{total})...")
}

/// Progress line emitted once all pages are done.
pub const ASSEMBLY_MESSAGE: &str = "Assembling final document...";
