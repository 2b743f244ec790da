//! Model interaction: rebuild one page through a [`PageModel`].
//!
//! This module turns (asset, page number) into a model request and returns
//! cleaned text. All prompt wording lives in [`crate::prompts`]; the
//! container extraction happens afterwards in the orchestrator.
//!
//! ## Retry Strategy
//!
//! Retries are off by default (`max_retries = 0`): a failed page becomes a
//! placeholder and the operator reruns just that page. When enabled,
//! transient errors (429, 5xx, timeouts, transport) are retried with
//! exponential backoff `retry_backoff_ms * 2^(attempt-1)`, capped at
//! [`MAX_BACKOFF_MS`]; permanent errors (401, blocked content) fail at once.

use crate::asset::SourceAsset;
use crate::config::ReconstructionConfig;
use crate::error::{ModelError, PageError};
use crate::pipeline::model::{PageModel, PageRequest};
use crate::pipeline::postprocess::clean_html;
use crate::prompts::{page_instruction, SYSTEM_INSTRUCTION};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Longest single wait between two attempts.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry number `attempt` (1-based). Saturates instead of
/// overflowing for large attempt counts.
pub fn retry_backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

fn retry_count(attempt: u32) -> u8 {
    u8::try_from(attempt).unwrap_or(u8::MAX)
}

/// Cleaned model output for one page, before container extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedPage {
    pub page_num: u32,
    pub html: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration_ms: u64,
    pub retries: u8,
}

/// Ask the model to rebuild `page_num` of `asset`.
///
/// ## Message Layout
///
/// 1. **System instruction**: [`SYSTEM_INSTRUCTION`] or the config override
/// 2. **User turn**: the asset as inline data, then
///    [`page_instruction`] naming the page
///
/// The answer is passed through [`clean_html`]; it is not validated here.
///
/// # Errors
/// [`PageError::Timeout`] if the last attempt timed out, otherwise
/// [`PageError::ModelRequest`] carrying the last model error.
pub async fn reconstruct_page(
    model: &Arc<dyn PageModel>,
    asset: &SourceAsset,
    page_num: u32,
    config: &ReconstructionConfig,
) -> Result<ReconstructedPage, PageError> {
    let start = Instant::now();
    let system_instruction = config
        .system_prompt
        .as_deref()
        .unwrap_or(SYSTEM_INSTRUCTION);

    let request = PageRequest {
        asset,
        page_num,
        system_instruction,
        instruction: page_instruction(page_num),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    };

    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err = ModelError::EmptyResponse;
    let mut attempts_made = 0u32;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = retry_backoff(config.retry_backoff_ms, attempt);
            warn!(
                "Page {}: retry {}/{} after {:?}",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(backoff).await;
        }
        attempts_made = attempt;

        let outcome = match timeout(call_timeout, model.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(response) => {
                let duration = start.elapsed();
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num, response.input_tokens, response.output_tokens, duration
                );
                return Ok(ReconstructedPage {
                    page_num,
                    html: clean_html(&response.text),
                    input_tokens: response.input_tokens,
                    output_tokens: response.output_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: retry_count(attempt),
                });
            }
            Err(e) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                let transient = e.is_transient();
                last_err = e;
                if !transient {
                    break;
                }
            }
        }
    }

    Err(match last_err {
        ModelError::Timeout { secs } => PageError::Timeout {
            page: page_num,
            secs,
        },
        other => PageError::ModelRequest {
            page: page_num,
            retries: retry_count(attempts_made),
            detail: other.to_string(),
        },
    })
}
