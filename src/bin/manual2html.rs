//! CLI binary for edgequake-manual2html.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReconstructionConfig`, drives a `ReconstructionSession` and writes
//! the HTML document.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_manual2html::pipeline::input::resolve_input;
use edgequake_manual2html::reconstruct::write_document;
use edgequake_manual2html::{
    parse_pages, FailurePolicy, Manual2HtmlError, ProgressCallback, ReconstructionConfig,
    ReconstructionOutput, ReconstructionProgressCallback, ReconstructionSession,
    ReconstructionStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the session prepares, then a
/// page bar with one log line per finished page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<u32, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading source…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rebuilding");
        self.bar.reset_eta();
    }

    /// Stop the spinner so an error prints on a clean line.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }

    fn elapsed_secs(&self, page_num: u32) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ReconstructionProgressCallback for CliProgressCallback {
    fn on_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_status_change(&self, status: ReconstructionStatus) {
        let label = match status {
            ReconstructionStatus::Idle => return,
            ReconstructionStatus::LocatingPage => "Locating page",
            ReconstructionStatus::Generating => "Generating",
            ReconstructionStatus::Complete => "Complete",
            ReconstructionStatus::Error => "Error",
        };
        self.bar.set_prefix(label);
    }

    fn on_reconstruction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rebuilding {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: u32, _position: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
    }

    fn on_page_complete(&self, page_num: u32, position: usize, total: usize, html_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>4}  ({}/{})  {:<12}  {}",
            green("✓"),
            page_num,
            position,
            total,
            dim(&format!("{html_len:>6} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: u32, position: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>4}  ({}/{})  {}  {}",
            red("✗"),
            page_num,
            position,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_reconstruction_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} page(s) rebuilt",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} page(s) rebuilt  ({} placeholder(s))",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rebuild page 12 of a scanned manual
  manual2html manual.pdf --pages 12 -o page12.html

  # Several pages and ranges
  manual2html manual.pdf --pages "3-5, 9" -o chapter2.html

  # A single photographed page
  manual2html page.jpg -o page.html

  # Through a gateway instead of the public endpoint
  manual2html manual.pdf --pages 1-4 --base-url https://gateway.example.com

  # Fail the run when every page failed
  manual2html manual.pdf --pages 1-8 --failure-policy reject-all-failed

  # Per-page stats as JSON
  manual2html manual.pdf --pages 1-3 --json > run.json

PAGE SPECIFICATION:
  Comma-separated numbers and ranges. Unreadable parts are skipped,
  duplicates removed, pages processed in ascending order.
    "5"         → 5
    "1-3, 5"    → 1 2 3 5
    "5, 3, 1"   → 1 3 5
    "3-1"       → error (no pages)

OUTPUT:
  One HTML file with A4 print styles. Each diagram is a dashed box sized like
  the original; open the file in a browser and click a box to insert the
  original image. Failed pages appear as red placeholders.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Credential for the model service (required)
  GEMINI_GATEWAY_URL      Alternate service endpoint
  MANUAL2HTML_MODEL       Model ID (default: gemini-3-flash-preview)
  MANUAL2HTML_PAGES       Page specification (default: 1)
  RUST_LOG                Override log filter (e.g. debug)
"#;

/// Rebuild Chinese equipment-manual pages as English HTML.
#[derive(Parser, Debug)]
#[command(
    name = "manual2html",
    version,
    about = "Rebuild Chinese equipment-manual pages as print-ready English HTML",
    long_about = "Send pages of a scanned Chinese equipment manual (PDF or image, local file or \
URL) to a multimodal model and get one English HTML document that keeps the original layout: \
titles, numbered sections, warning boxes and sized placeholders for every diagram.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Physical pages to rebuild, e.g. "5" or "1-3, 8".
    #[arg(short, long, env = "MANUAL2HTML_PAGES", default_value = "1")]
    pages: String,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long, env = "MANUAL2HTML_OUTPUT")]
    output: Option<PathBuf>,

    /// Credential for the model service.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Alternate service endpoint (gateway or proxy).
    #[arg(long, env = "GEMINI_GATEWAY_URL")]
    base_url: Option<String>,

    /// Model ID.
    #[arg(long, env = "MANUAL2HTML_MODEL")]
    model: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "MANUAL2HTML_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens per page (provider default if unset).
    #[arg(long, env = "MANUAL2HTML_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Retries per page on transient model failures (at most 10).
    #[arg(long, env = "MANUAL2HTML_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// First retry delay in ms, doubled on each further retry.
    #[arg(long, env = "MANUAL2HTML_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Runs with more pages than this use --large-delay-ms.
    #[arg(long, env = "MANUAL2HTML_LARGE_BATCH_THRESHOLD", default_value_t = 5)]
    large_batch_threshold: usize,

    /// Pause between requests for runs of up to --large-batch-threshold pages, in ms.
    #[arg(long, env = "MANUAL2HTML_SMALL_DELAY_MS", default_value_t = 500)]
    small_delay_ms: u64,

    /// Pause between requests for larger runs, in ms.
    #[arg(long, env = "MANUAL2HTML_LARGE_DELAY_MS", default_value_t = 1500)]
    large_delay_ms: u64,

    /// Pause before the first request, in ms.
    #[arg(long, env = "MANUAL2HTML_PREPARATION_DELAY_MS", default_value_t = 1500)]
    preparation_delay_ms: u64,

    /// How failed pages affect the exit status.
    #[arg(long, env = "MANUAL2HTML_FAILURE_POLICY", value_enum, default_value = "tolerate")]
    failure_policy: FailurePolicyArg,

    /// Fail the run when more than this share of pages failed (0.0–1.0).
    /// Overrides --failure-policy.
    #[arg(long, env = "MANUAL2HTML_MAX_FAILURE_RATIO")]
    max_failure_ratio: Option<f64>,

    /// Path to a text file containing a custom system instruction.
    #[arg(long, env = "MANUAL2HTML_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Output structured JSON (pages + stats) instead of HTML.
    #[arg(long, env = "MANUAL2HTML_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MANUAL2HTML_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MANUAL2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MANUAL2HTML_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MANUAL2HTML_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-page model call timeout in seconds.
    #[arg(long, env = "MANUAL2HTML_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FailurePolicyArg {
    Tolerate,
    RejectAllFailed,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(v: FailurePolicyArg) -> Self {
        match v {
            FailurePolicyArg::Tolerate => FailurePolicy::Tolerate,
            FailurePolicyArg::RejectAllFailed => FailurePolicy::RejectAllFailed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cli_cb = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_cb
        .clone()
        .map(|cb| cb as Arc<dyn ReconstructionProgressCallback>);

    // First Ctrl-C cancels after the current page; the second exits at once.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let cli_cb = cli_cb.clone();
        tokio::spawn(async move {
            let mut interrupts = 0;
            while tokio::signal::ctrl_c().await.is_ok() {
                interrupts += 1;
                if handle_interrupt(interrupts, &cancel) {
                    if let Some(ref cb) = cli_cb {
                        cb.abandon();
                    }
                    eprintln!("\n{} aborted", red("✘"));
                    std::process::exit(130);
                }
                eprintln!(
                    "\n{} cancelling after the current page… (Ctrl-C again to abort)",
                    cyan("◆")
                );
            }
        });
    }

    let output = match rebuild(&cli, progress_cb, cancel).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(ref cb) = cli_cb {
                cb.abandon();
            }
            return Err(e);
        }
    };

    // ── Emit output ──────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(ref output_path) = cli.output {
        write_document(output_path, &output.html)
            .await
            .context("Failed to write output")?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.html.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    // ── Summary ──────────────────────────────────────────────────────────
    let stats = &output.stats;
    if !cli.quiet && !cli.json {
        if !show_progress {
            eprintln!(
                "Rebuilt {}/{} pages in {}ms",
                stats.succeeded_pages, stats.requested_pages, stats.total_duration_ms
            );
        }
        if let Some(ref output_path) = cli.output {
            eprintln!(
                "{}  →  {}",
                if stats.failed_pages == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                bold(&output_path.display().to_string()),
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Returns `true` when the process should exit: the first interrupt only
/// cancels the run.
fn handle_interrupt(interrupts: usize, cancel: &CancellationToken) -> bool {
    if interrupts > 1 {
        return true;
    }
    cancel.cancel();
    false
}

/// Everything between flag parsing and output: config, checks, input, session.
async fn rebuild(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<ReconstructionOutput> {
    let config = build_config(cli, progress, cancel).await?;

    // No credential or no pages: stop before downloading or reading anything.
    if config.credential().is_none() {
        return Err(Manual2HtmlError::MissingCredential.into());
    }
    parse_pages(&cli.pages).context("Invalid --pages")?;

    let asset = resolve_input(&cli.input, cli.download_timeout)
        .await
        .context("Failed to read source")?;

    let mut session = ReconstructionSession::new(config)
        .with_preparation_delay(Duration::from_millis(cli.preparation_delay_ms));
    session
        .run(&asset, &cli.pages)
        .await
        .context("Reconstruction failed")
}

/// Map CLI args to `ReconstructionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<ReconstructionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let failure_policy = match cli.max_failure_ratio {
        Some(ratio) => FailurePolicy::MaxFailureRatio(ratio),
        None => cli.failure_policy.clone().into(),
    };

    let mut builder = ReconstructionConfig::builder()
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .small_batch_delay_ms(cli.small_delay_ms)
        .large_batch_delay_ms(cli.large_delay_ms)
        .large_batch_threshold(cli.large_batch_threshold)
        .failure_policy(failure_policy)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .cancel_token(cancel);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.as_str());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.as_str());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_interrupt_exits() {
        let cancel = CancellationToken::new();
        assert!(!handle_interrupt(1, &cancel));
        assert!(cancel.is_cancelled());
        assert!(handle_interrupt(2, &cancel));
        assert!(handle_interrupt(3, &cancel));
    }

    #[test]
    fn abandon_stops_the_spinner() {
        let cb = CliProgressCallback::new_dynamic();
        cb.abandon();
        assert!(cb.bar.is_finished());
        // Idempotent once finished.
        cb.abandon();
    }

    #[tokio::test]
    async fn pacing_and_backoff_flags_reach_the_config() {
        let cli = Cli::try_parse_from([
            "manual2html",
            "manual.pdf",
            "--api-key",
            "k",
            "--retry-backoff-ms",
            "250",
            "--large-batch-threshold",
            "8",
            "--max-retries",
            "99",
        ])
        .unwrap();
        let config = build_config(&cli, None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(config.retry_backoff_ms, 250);
        assert_eq!(config.large_batch_threshold, 8);
        assert_eq!(config.max_retries, edgequake_manual2html::config::MAX_RETRIES_CAP);
    }

    #[tokio::test]
    async fn bad_pages_fail_before_reading_input() {
        let cli = Cli::try_parse_from([
            "manual2html",
            "/no/such/manual.pdf",
            "--api-key",
            "k",
            "--pages",
            "a,b",
        ])
        .unwrap();
        let err = rebuild(&cli, None, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Manual2HtmlError>(),
            Some(Manual2HtmlError::InvalidPageRange { .. })
        ));
    }
}
