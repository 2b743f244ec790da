//! Output types returned by the reconstruction entry points.

use crate::document::error_placeholder;
use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// The reconstructed markup for one requested page.
///
/// A failed page still carries markup: the error placeholder that takes its
/// place in the document. Check [`is_success`](Self::is_success) or `error`
/// to tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFragment {
    /// 1-indexed physical page number.
    pub page_num: u32,
    /// One or more complete `page-container` elements.
    pub html: String,
    /// Set when the page failed and `html` is a placeholder.
    pub error: Option<PageError>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Wall-clock time spent on this page, excluding pacing.
    pub duration_ms: u64,
    /// Retries spent on this page.
    pub retries: u8,
}

impl PageFragment {
    pub fn success(
        page_num: u32,
        html: String,
        input_tokens: u32,
        output_tokens: u32,
        duration_ms: u64,
        retries: u8,
    ) -> Self {
        Self {
            page_num,
            html,
            error: None,
            input_tokens,
            output_tokens,
            duration_ms,
            retries,
        }
    }

    /// A placeholder fragment for a page that could not be rebuilt.
    pub fn failed(page_num: u32, error: PageError, duration_ms: u64) -> Self {
        let retries = match error {
            PageError::ModelRequest { retries, .. } => retries,
            PageError::Timeout { .. } => 0,
        };
        Self {
            page_num,
            html: error_placeholder(page_num),
            error: Some(error),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
            retries,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructionStats {
    pub requested_pages: usize,
    pub succeeded_pages: usize,
    pub failed_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Whole run, including pacing delays and assembly.
    pub total_duration_ms: u64,
    /// Time spent waiting on the model only.
    pub model_duration_ms: u64,
}

impl ReconstructionStats {
    /// Tally the per-page numbers. Durations covering the whole run are
    /// left for the caller to fill in.
    pub fn from_fragments(fragments: &[PageFragment]) -> Self {
        let succeeded = fragments.iter().filter(|f| f.is_success()).count();
        Self {
            requested_pages: fragments.len(),
            succeeded_pages: succeeded,
            failed_pages: fragments.len() - succeeded,
            total_input_tokens: fragments.iter().map(|f| f.input_tokens as u64).sum(),
            total_output_tokens: fragments.iter().map(|f| f.output_tokens as u64).sum(),
            total_duration_ms: 0,
            model_duration_ms: fragments.iter().map(|f| f.duration_ms).sum(),
        }
    }
}

/// Result of a finished reconstruction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionOutput {
    /// The complete, self-contained HTML document.
    pub html: String,
    /// One entry per requested page, in ascending page order.
    pub pages: Vec<PageFragment>,
    pub stats: ReconstructionStats,
}
