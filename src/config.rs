//! Configuration types for manual-page reconstruction.
//!
//! All reconstruction behaviour is controlled through
//! [`ReconstructionConfig`], built via its [`ReconstructionConfigBuilder`].
//! The credential and endpoint are plain fields here: the library never
//! reads the process environment, the CLI does that and passes them in.

use crate::error::Manual2HtmlError;
use crate::pipeline::model::PageModel;
use crate::progress::ProgressCallback;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default model identifier for the Gemini backend.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Upper bound for [`ReconstructionConfigBuilder::max_retries`].
pub const MAX_RETRIES_CAP: u32 = 10;

/// Configuration for one reconstruction run.
///
/// Built via [`ReconstructionConfig::builder()`] or using
/// [`ReconstructionConfig::default()`] (which has no credential and will
/// therefore be rejected by [`crate::reconstruct`]).
///
/// # Example
/// ```rust
/// use edgequake_manual2html::ReconstructionConfig;
///
/// let config = ReconstructionConfig::builder()
///     .api_key("AIza...")
///     .base_url("https://gateway.example.internal")
///     .large_batch_delay_ms(2000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReconstructionConfig {
    /// Access credential for the model service. Required.
    pub api_key: Option<String>,

    /// Alternate service endpoint (gateway / proxy). `None` uses the
    /// provider's public endpoint.
    pub base_url: Option<String>,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Pre-constructed model client. Takes precedence over the built-in
    /// Gemini client; the credential is still required.
    pub model_client: Option<Arc<dyn PageModel>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Reconstruction should be faithful to the page, not creative.
    pub temperature: f32,

    /// Upper bound on generated tokens per page. `None` leaves it to the
    /// provider.
    pub max_output_tokens: Option<u32>,

    /// Retries per page after a transient model failure. Default: 0.
    ///
    /// A failed page becomes an error placeholder; raise this to spend more
    /// requests on flaky networks. The builder caps it at [`MAX_RETRIES_CAP`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    ///
    /// A full manual page of HTML takes a while to generate.
    pub api_timeout_secs: u64,

    /// Timeout for fetching a URL input, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Pause between consecutive requests when the run has at most
    /// `large_batch_threshold` pages. Default: 500 ms.
    pub small_batch_delay_ms: u64,

    /// Pause between consecutive requests for larger runs. Default: 1500 ms.
    pub large_batch_delay_ms: u64,

    /// Page count above which the large-batch delay applies. Default: 5.
    pub large_batch_threshold: usize,

    /// What to do when pages fail. Default: [`FailurePolicy::Tolerate`].
    pub failure_policy: FailurePolicy,

    /// Custom system instruction. If None, uses [`crate::prompts::SYSTEM_INSTRUCTION`].
    pub system_prompt: Option<String>,

    /// Receives progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Checked between pages; a cancelled token stops the run.
    pub cancel: Option<CancellationToken>,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            model_client: None,
            temperature: 0.1,
            max_output_tokens: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            small_batch_delay_ms: 500,
            large_batch_delay_ms: 1500,
            large_batch_threshold: 5,
            failure_policy: FailurePolicy::default(),
            system_prompt: None,
            progress_callback: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for ReconstructionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconstructionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "model_client",
                &self.model_client.as_ref().map(|m| m.name().to_string()),
            )
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("small_batch_delay_ms", &self.small_batch_delay_ms)
            .field("large_batch_delay_ms", &self.large_batch_delay_ms)
            .field("large_batch_threshold", &self.large_batch_threshold)
            .field("failure_policy", &self.failure_policy)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl ReconstructionConfig {
    /// Create a new builder for `ReconstructionConfig`.
    pub fn builder() -> ReconstructionConfigBuilder {
        ReconstructionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The credential, if one is set and not blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Pause before the request at `index` (0-based) in a run of `total`
    /// pages. The first request is never delayed.
    pub fn pacing_delay(&self, index: usize, total: usize) -> Duration {
        if index == 0 {
            return Duration::ZERO;
        }
        let ms = if total > self.large_batch_threshold {
            self.large_batch_delay_ms
        } else {
            self.small_batch_delay_ms
        };
        Duration::from_millis(ms)
    }
}

/// Builder for [`ReconstructionConfig`].
pub struct ReconstructionConfigBuilder {
    config: ReconstructionConfig,
}

impl fmt::Debug for ReconstructionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconstructionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ReconstructionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn model_client(mut self, client: Arc<dyn PageModel>) -> Self {
        self.config.model_client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES_CAP);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn small_batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.small_batch_delay_ms = ms;
        self
    }

    pub fn large_batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.large_batch_delay_ms = ms;
        self
    }

    pub fn large_batch_threshold(mut self, pages: usize) -> Self {
        self.config.large_batch_threshold = pages;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.config.cancel = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing credential is *not* a build error: it is reported by
    /// [`crate::reconstruct`] as [`Manual2HtmlError::MissingCredential`] so
    /// that callers get the same error whichever way the config was made.
    pub fn build(self) -> Result<ReconstructionConfig, Manual2HtmlError> {
        let c = &self.config;
        if let Some(ref url) = c.base_url {
            let parsed = Url::parse(url).map_err(|e| {
                Manual2HtmlError::InvalidConfig(format!("base URL '{url}' is not a valid URL: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Manual2HtmlError::InvalidConfig(format!(
                    "base URL must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        if c.model.trim().is_empty() {
            return Err(Manual2HtmlError::InvalidConfig("model must not be empty".into()));
        }
        if let FailurePolicy::MaxFailureRatio(r) = c.failure_policy {
            if !(0.0..=1.0).contains(&r) {
                return Err(Manual2HtmlError::InvalidConfig(format!(
                    "failure ratio must be within 0.0–1.0, got {r}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How page-level failures affect the outcome of the whole run.
///
/// Failed pages always appear as error placeholders in the document; the
/// policy only decides whether the run as a whole still counts as a
/// success.
///
/// | Policy | Run fails when |
/// |--------|----------------|
/// | `Tolerate` | never (default) |
/// | `RejectAllFailed` | every page failed |
/// | `MaxFailureRatio(r)` | `failed / total > r` |
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Always return the document, even if every page is a placeholder.
    #[default]
    Tolerate,
    /// Fail the run only when no page succeeded.
    RejectAllFailed,
    /// Fail the run when the share of failed pages exceeds the ratio.
    MaxFailureRatio(f64),
}

impl FailurePolicy {
    /// Whether a run with `failed` of `total` pages failing is rejected.
    pub fn rejects(&self, failed: usize, total: usize) -> bool {
        if total == 0 || failed == 0 {
            return false;
        }
        match *self {
            FailurePolicy::Tolerate => false,
            FailurePolicy::RejectAllFailed => failed == total,
            FailurePolicy::MaxFailureRatio(r) => failed as f64 / total as f64 > r,
        }
    }
}
