//! Error types for the edgequake-manual2html library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Manual2HtmlError`]: **Fatal**: the reconstruction cannot proceed at
//!   all (no credential, page specification yields no pages, unreadable
//!   input). Returned as `Err(Manual2HtmlError)` from the top-level
//!   `reconstruct*` functions.
//!
//! * [`PageError`]: **Non-fatal**: one page failed but every other page is
//!   fine. Stored inside [`crate::output::PageFragment`]; the page is
//!   rendered as an error placeholder in the final document.
//!
//! * [`ModelError`]: what a [`crate::pipeline::model::PageModel`] returns.
//!   The orchestrator converts it into a [`PageError`] for that page.

use std::path::PathBuf;
use thiserror::Error;

use crate::status::ReconstructionStatus;

/// All fatal errors returned by the edgequake-manual2html library.
#[derive(Debug, Error)]
pub enum Manual2HtmlError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No access credential was configured for the model service.
    #[error("No API key configured for the model service.\nSet GEMINI_API_KEY or pass --api-key <KEY>.")]
    MissingCredential,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Page selection errors ─────────────────────────────────────────────
    /// The page specification produced no usable page numbers.
    #[error("Invalid page range '{input}': no valid page numbers.\nUse a form like \"5\", \"1-3\" or \"1-3, 5\".")]
    InvalidPageRange { input: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The source is neither a PDF nor a recognised image format.
    #[error("Unsupported source '{source_name}': expected a PDF or an image (PNG, JPEG, WebP, GIF)\nFirst bytes: {magic:?}")]
    UnsupportedMediaType { source_name: String, magic: Vec<u8> },

    // ── Run errors ────────────────────────────────────────────────────────
    /// The configured failure policy rejected the run.
    #[error("{failed}/{total} pages failed to reconstruct.\nFirst error: {first_error}")]
    TooManyPageFailures {
        failed: usize,
        total: usize,
        first_error: String,
    },

    /// The run was cancelled between two pages.
    #[error("Reconstruction cancelled after {completed}/{total} pages")]
    Cancelled { completed: usize, total: usize },

    /// A status transition that the session state machine does not allow.
    #[error("Invalid status transition {from:?} → {to:?}")]
    InvalidTransition {
        from: ReconstructionStatus,
        to: ReconstructionStatus,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output HTML file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageFragment`] when a page fails.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The model call failed (transport, provider, or response problem).
    #[error("Page {page}: model request failed after {retries} retries: {detail}")]
    ModelRequest {
        page: u32,
        retries: u8,
        detail: String,
    },

    /// The model call exceeded the per-call timeout.
    #[error("Page {page}: model request timed out after {secs}s")]
    Timeout { page: u32, secs: u64 },
}

impl PageError {
    /// The page this error belongs to.
    pub fn page(&self) -> u32 {
        match self {
            PageError::ModelRequest { page, .. } | PageError::Timeout { page, .. } => *page,
        }
    }
}

/// Errors raised by a [`crate::pipeline::model::PageModel`] implementation.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The client was constructed without a credential.
    #[error("missing API key")]
    MissingCredential,

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS, or body-decoding failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not finish within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider refused to answer (safety filter, policy block).
    #[error("request blocked by provider: {reason}")]
    Blocked { reason: String },

    /// The provider answered but produced no text.
    #[error("model returned no text")]
    EmptyResponse,
}

impl ModelError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Authentication and client errors are permanent; throttling, server
    /// errors, timeouts and transport failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Http { status, .. } => *status == 429 || *status >= 500,
            ModelError::Transport(_) | ModelError::Timeout { .. } => true,
            ModelError::MissingCredential
            | ModelError::Blocked { .. }
            | ModelError::EmptyResponse => false,
        }
    }
}
