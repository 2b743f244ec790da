//! Pipeline stages for page reconstruction.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested without the others and the model backend can be swapped
//! without touching text processing.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ postprocess ──▶ extract
//! (path/URL) (base64)  (model)  (fences, trim)  (page-container)
//! ```
//!
//! 1. [`input`]: load a local file or URL into a `SourceAsset`
//! 2. [`encode`]: base64-wrap the asset for the inline-data request part
//! 3. [`llm`]: one model call per page, with optional retry; the only
//!    stage with network I/O (through [`model::PageModel`], e.g. [`gemini`])
//! 4. [`postprocess`]: strip fences and invisible characters
//! 5. [`extract`]: normalise the answer into page-container markup

pub mod encode;
pub mod extract;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod model;
pub mod postprocess;
