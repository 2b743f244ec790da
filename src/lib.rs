//! # edgequake-manual2html
//!
//! Rebuild pages of Chinese equipment manuals as print-ready English HTML
//! using a multimodal model.
//!
//! ## Why this crate?
//!
//! Translating a scanned manual page as plain text loses what makes it a
//! manual: the title hierarchy, the numbered sections, the boxed warnings and
//! the diagrams sitting exactly where the text refers to them. This crate
//! sends the original page (image or PDF) to a vision model and asks for
//! English HTML that keeps the layout, with a sized blank box wherever a
//! diagram was. The reader later clicks each box and drops the original
//! diagram in.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page spec "1-3, 5" ──▶ [1, 2, 3, 5]
//!                              │
//! source asset (PDF / image)   │   one request per page, paced
//!  │                           ▼
//!  ├─ 1. Input    resolve local file or download from URL, sniff media type
//!  ├─ 2. Encode   bytes → base64 inline data
//!  ├─ 3. Model    Gemini generateContent (or any `PageModel`)
//!  ├─ 4. Clean    strip code fences and invisible characters
//!  ├─ 5. Extract  keep only the `page-container` markup
//!  └─ 6. Output   one A4 HTML document + per-page stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_manual2html::{reconstruct_from_input, ReconstructionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReconstructionConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let output = reconstruct_from_input("manual.pdf", "12-14", &config).await?;
//!     std::fs::write("manual.html", &output.html)?;
//!     eprintln!("{}/{} pages rebuilt",
//!         output.stats.succeeded_pages,
//!         output.stats.requested_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `manual2html` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-manual2html = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod asset;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pages;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod reconstruct;
pub mod status;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use asset::SourceAsset;
pub use config::{FailurePolicy, ReconstructionConfig, ReconstructionConfigBuilder};
pub use document::{assemble_document, error_placeholder};
pub use error::{Manual2HtmlError, ModelError, PageError};
pub use output::{PageFragment, ReconstructionOutput, ReconstructionStats};
pub use pages::parse_pages;
pub use pipeline::extract::extract_fragment;
pub use pipeline::gemini::GeminiClient;
pub use pipeline::llm::{reconstruct_page, ReconstructedPage};
pub use pipeline::model::{ModelResponse, PageModel, PageRequest};
pub use progress::{
    MessageCallback, NoopProgressCallback, ProgressCallback, ReconstructionProgressCallback,
};
pub use reconstruct::{
    reconstruct, reconstruct_from_input, reconstruct_sync, reconstruct_to_file,
};
pub use status::{ReconstructionSession, ReconstructionStatus};
pub use stream::{reconstruct_stream, FragmentStream};
