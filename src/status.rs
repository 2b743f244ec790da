//! Run status as seen by a front end.
//!
//! ```text
//! Idle ──▶ LocatingPage ──▶ Generating ──▶ Complete
//!  ▲            │               │
//!  │            └──────┬────────┴────────▶ Error
//!  └──── reset ────────┴── (from Complete or Error)
//! ```
//!
//! `LocatingPage` is a short preparatory pause before any request is made.
//! `Generating` spans the whole page loop. A run whose pages failed
//! individually still ends in `Complete`: those pages are placeholders in
//! the document. `Error` is reached only when the run itself fails.

use crate::asset::SourceAsset;
use crate::config::ReconstructionConfig;
use crate::error::Manual2HtmlError;
use crate::output::ReconstructionOutput;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default preparatory pause before a session starts generating.
pub const DEFAULT_PREPARATION_DELAY_MS: u64 = 1500;

/// The five states of a reconstruction session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconstructionStatus {
    #[default]
    Idle,
    LocatingPage,
    Generating,
    Complete,
    Error,
}

impl ReconstructionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether work is in flight (a front end disables its start button).
    pub fn is_busy(self) -> bool {
        matches!(self, Self::LocatingPage | Self::Generating)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use ReconstructionStatus::*;
        matches!(
            (self, next),
            (Idle, LocatingPage)
                | (LocatingPage, Generating)
                | (LocatingPage, Error)
                | (Generating, Complete)
                | (Generating, Error)
                | (Complete, Idle)
                | (Error, Idle)
        )
    }
}

/// Drives one reconstruction through the status machine and reports every
/// change to the configured progress callback.
///
/// # Example
/// ```rust,no_run
/// use edgequake_manual2html::{ReconstructionConfig, ReconstructionSession, SourceAsset};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ReconstructionConfig::builder().api_key("key").build()?;
/// let asset = SourceAsset::new(std::fs::read("page.png")?, "image/png");
/// let mut session = ReconstructionSession::new(config);
/// let output = session.run(&asset, "5-6, 8").await?;
/// assert!(session.status().is_terminal());
/// # let _ = output;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReconstructionSession {
    config: ReconstructionConfig,
    status: ReconstructionStatus,
    preparation_delay: Duration,
    last_error: Option<String>,
}

impl ReconstructionSession {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self {
            config,
            status: ReconstructionStatus::Idle,
            preparation_delay: Duration::from_millis(DEFAULT_PREPARATION_DELAY_MS),
            last_error: None,
        }
    }

    /// Override the `LocatingPage` pause.
    pub fn with_preparation_delay(mut self, delay: Duration) -> Self {
        self.preparation_delay = delay;
        self
    }

    pub fn status(&self) -> ReconstructionStatus {
        self.status
    }

    /// Message of the error that ended the last run, if it failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run one reconstruction from `Idle` to `Complete` or `Error`.
    ///
    /// The session must be `Idle`; call [`reset`](Self::reset) after a
    /// finished run.
    pub async fn run(
        &mut self,
        asset: &SourceAsset,
        page_spec: &str,
    ) -> Result<ReconstructionOutput, Manual2HtmlError> {
        self.transition(ReconstructionStatus::LocatingPage)?;
        self.last_error = None;
        self.notify(&format!("Locating physical page [{page_spec}]..."));
        tokio::time::sleep(self.preparation_delay).await;

        if let Some(ref token) = self.config.cancel {
            if token.is_cancelled() {
                let err = Manual2HtmlError::Cancelled {
                    completed: 0,
                    total: 0,
                };
                self.fail(&err)?;
                return Err(err);
            }
        }

        self.transition(ReconstructionStatus::Generating)?;
        match crate::reconstruct::reconstruct(asset, page_spec, &self.config).await {
            Ok(output) => {
                self.transition(ReconstructionStatus::Complete)?;
                Ok(output)
            }
            Err(err) => {
                self.fail(&err)?;
                Err(err)
            }
        }
    }

    /// Return to `Idle` from a terminal state.
    pub fn reset(&mut self) -> Result<(), Manual2HtmlError> {
        self.transition(ReconstructionStatus::Idle)?;
        self.last_error = None;
        Ok(())
    }

    fn fail(&mut self, err: &Manual2HtmlError) -> Result<(), Manual2HtmlError> {
        warn!("Reconstruction failed: {}", err);
        self.last_error = Some(err.to_string());
        self.transition(ReconstructionStatus::Error)
    }

    fn transition(&mut self, next: ReconstructionStatus) -> Result<(), Manual2HtmlError> {
        if !self.status.can_transition_to(next) {
            return Err(Manual2HtmlError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        debug!("Status {:?} → {:?}", self.status, next);
        self.status = next;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_status_change(next);
        }
        Ok(())
    }

    fn notify(&self, message: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_message(message);
        }
    }
}
