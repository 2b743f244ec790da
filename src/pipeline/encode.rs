//! Asset encoding: raw bytes → base64 inline data for the model request.
//!
//! Multimodal APIs accept the page as a base64 string embedded in the JSON
//! body next to the instruction text. The bytes are sent as uploaded: a
//! photo stays a JPEG, a PDF stays a PDF, and the model is told which
//! physical page to rebuild.

use crate::asset::SourceAsset;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// A base64-encoded asset ready for an inline-data request part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAsset {
    pub mime_type: String,
    pub data: String,
}

/// Encode the asset with the standard base64 alphabet (with padding).
pub fn encode_asset(asset: &SourceAsset) -> InlineAsset {
    let data = STANDARD.encode(asset.bytes());
    debug!(
        "Encoded {} asset: {} bytes → {} bytes base64",
        asset.media_type(),
        asset.len(),
        data.len()
    );
    InlineAsset {
        mime_type: asset.media_type().to_string(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_small_asset() {
        let asset = SourceAsset::new(b"%PDF-1.4 tiny".to_vec(), "application/pdf");
        let inline = encode_asset(&asset);
        assert_eq!(inline.mime_type, "application/pdf");
        let decoded = STANDARD.decode(&inline.data).expect("valid base64");
        assert_eq!(decoded, asset.bytes());
    }

    #[test]
    fn encode_empty_asset() {
        let inline = encode_asset(&SourceAsset::new(Vec::new(), "image/png"));
        assert!(inline.data.is_empty());
    }
}
