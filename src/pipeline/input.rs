//! Input resolution: turn a user-supplied path or URL into a [`SourceAsset`].
//!
//! The whole page image or PDF is held in memory; nothing is written to
//! disk. The media type is sniffed from the bytes rather than trusted from
//! a file extension or `Content-Type` header, so a mislabelled download
//! fails here with a clear message instead of confusing the model.

use crate::asset::{sniff_media_type, SourceAsset};
use crate::error::Manual2HtmlError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory asset.
///
/// If the input is a URL, download it. If the input is a local file,
/// validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceAsset, Manual2HtmlError> {
    let (name, bytes) = if is_url(input) {
        (input.to_string(), download_url(input, timeout_secs).await?)
    } else {
        (input.to_string(), read_local(input).await?)
    };
    into_asset(&name, bytes)
}

/// Wrap bytes into an asset, rejecting anything that is not a PDF or image.
pub fn into_asset(name: &str, bytes: Vec<u8>) -> Result<SourceAsset, Manual2HtmlError> {
    match sniff_media_type(&bytes) {
        Some(media_type) => {
            debug!("Resolved {} as {} ({} bytes)", name, media_type, bytes.len());
            Ok(SourceAsset::new(bytes, media_type))
        }
        None => Err(Manual2HtmlError::UnsupportedMediaType {
            source_name: name.to_string(),
            magic: bytes.iter().take(8).copied().collect(),
        }),
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, Manual2HtmlError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Manual2HtmlError::PermissionDenied { path })
        }
        Err(_) => Err(Manual2HtmlError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Manual2HtmlError> {
    info!("Downloading source from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Manual2HtmlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Manual2HtmlError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Manual2HtmlError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Manual2HtmlError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Manual2HtmlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
