//! The seam between the orchestrator and a multimodal model service.
//!
//! A [`PageModel`] takes one [`PageRequest`] (the page asset plus two
//! instruction texts) and answers with text that should contain HTML. The
//! built-in implementation is [`crate::pipeline::gemini::GeminiClient`];
//! tests and embedders can inject their own through
//! [`crate::config::ReconstructionConfigBuilder::model_client`].

use crate::asset::SourceAsset;
use crate::error::ModelError;
use async_trait::async_trait;

/// One request for one physical page.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    /// The uploaded page image or PDF.
    pub asset: &'a SourceAsset,
    /// Physical page number to rebuild.
    pub page_num: u32,
    /// Fixed, non-parameterised instruction sent on every call.
    pub system_instruction: &'a str,
    /// Per-page instruction naming `page_num`.
    pub instruction: String,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

/// Raw model answer plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A multimodal model able to rebuild a page from an image.
#[async_trait]
pub trait PageModel: Send + Sync {
    /// Short identifier used in logs (e.g. `"gemini:gemini-3-flash-preview"`).
    fn name(&self) -> &str;

    /// Submit the asset and instructions, return the model's text.
    async fn generate(&self, request: &PageRequest<'_>) -> Result<ModelResponse, ModelError>;
}
