//! The source asset: one uploaded page image or PDF held in memory.

use std::fmt;

/// Media type used for PDF sources.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Raw bytes of a page image or PDF plus its media type.
///
/// The asset is borrowed by every page request of a run and never mutated;
/// the same bytes are sent once per requested page number.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceAsset {
    bytes: Vec<u8>,
    media_type: String,
}

impl SourceAsset {
    /// Wrap bytes with an explicit media type (e.g. `"image/png"`).
    pub fn new(bytes: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    /// Wrap bytes, sniffing the media type from their leading magic bytes.
    ///
    /// Returns `None` when the bytes are neither a PDF nor an image format
    /// the `image` crate recognises.
    pub fn sniff(bytes: impl Into<Vec<u8>>) -> Option<Self> {
        let bytes = bytes.into();
        let media_type = sniff_media_type(&bytes)?;
        Some(Self {
            bytes,
            media_type: media_type.to_string(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }
}

// Bytes are elided: a 5 MB scan in a log line helps nobody.
impl fmt::Debug for SourceAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAsset")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Detect the media type of a PDF or image from its first bytes.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        return Some(PDF_MEDIA_TYPE);
    }
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}
