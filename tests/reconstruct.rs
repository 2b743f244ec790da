//! Orchestrator integration tests against a scripted in-memory model.
//!
//! No network: every test injects a `PageModel` through
//! `ReconstructionConfig::model_client`, so these run in CI.

use async_trait::async_trait;
use edgequake_manual2html::{
    reconstruct, reconstruct_stream, reconstruct_sync, reconstruct_to_file, FailurePolicy,
    Manual2HtmlError, ModelError, ModelResponse, PageModel, PageRequest,
    ReconstructionConfig, ReconstructionProgressCallback, ReconstructionSession,
    ReconstructionStatus, SourceAsset,
};
use futures::StreamExt;
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Answers every page with a container naming the page, except the pages
/// listed in `fail_pages`, which get an HTTP 503.
struct ScriptedModel {
    fail_pages: HashSet<u32>,
    wrap: fn(u32) -> String,
    calls: Mutex<Vec<(u32, Instant)>>,
}

impl ScriptedModel {
    fn new() -> Arc<Self> {
        Self::failing(&[])
    }

    fn failing(pages: &[u32]) -> Arc<Self> {
        Self::with(pages, |p| {
            format!("<div class=\"page-container\"><h1 class=\"main-title\">Page {p}</h1></div>")
        })
    }

    fn with(pages: &[u32], wrap: fn(u32) -> String) -> Arc<Self> {
        Arc::new(Self {
            fail_pages: pages.iter().copied().collect(),
            wrap,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn called_pages(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1].1 - w[0].1).collect()
    }
}

#[async_trait]
impl PageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &PageRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.page_num, Instant::now()));
        if self.fail_pages.contains(&request.page_num) {
            return Err(ModelError::Http {
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(ModelResponse {
            text: (self.wrap)(request.page_num),
            input_tokens: 1000,
            output_tokens: 500,
        })
    }
}

/// Records every progress event as a line of text.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    cancel_after_page: Option<(u32, CancellationToken)>,
}

impl Recorder {
    fn lines(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix("msg:").map(str::to_string))
            .collect()
    }
}

impl ReconstructionProgressCallback for Recorder {
    fn on_message(&self, message: &str) {
        self.events.lock().unwrap().push(format!("msg:{message}"));
    }

    fn on_page_complete(&self, page_num: u32, position: usize, total: usize, _html_len: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ok:{page_num}:{position}/{total}"));
        if let Some((page, ref token)) = self.cancel_after_page {
            if page == page_num {
                token.cancel();
            }
        }
    }

    fn on_page_error(&self, page_num: u32, _position: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("err:{page_num}"));
    }

    fn on_status_change(&self, status: ReconstructionStatus) {
        self.events.lock().unwrap().push(format!("status:{status:?}"));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn png_asset() -> SourceAsset {
    SourceAsset::new(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "image/png")
}

/// Fast pacing so the suite stays quick.
fn config_with(model: Arc<ScriptedModel>) -> ReconstructionConfig {
    ReconstructionConfig::builder()
        .api_key("test-key")
        .model_client(model)
        .small_batch_delay_ms(1)
        .large_batch_delay_ms(1)
        .build()
        .unwrap()
}

// ── Ordering and assembly ────────────────────────────────────────────────────

#[tokio::test]
async fn one_fragment_per_page_in_ascending_order() {
    init_tracing();
    let model = ScriptedModel::new();
    let config = config_with(model.clone());

    let output = reconstruct(&png_asset(), "3, 1-2, 2", &config).await.unwrap();

    assert_eq!(model.called_pages(), vec![1, 2, 3]);
    let pages: Vec<u32> = output.pages.iter().map(|f| f.page_num).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    assert_eq!(output.stats.requested_pages, 3);
    assert_eq!(output.stats.succeeded_pages, 3);
    assert_eq!(output.stats.total_input_tokens, 3000);

    let html = &output.html;
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.ends_with("</html>"));
    let p1 = html.find("Page 1</h1>").unwrap();
    let p2 = html.find("Page 2</h1>").unwrap();
    let p3 = html.find("Page 3</h1>").unwrap();
    assert!(p1 < p2 && p2 < p3);
    assert_eq!(html.matches("class=\"page-container\"").count(), 3);
}

#[tokio::test]
async fn fences_and_surrounding_prose_are_removed() {
    let model = ScriptedModel::with(&[], |p| {
        format!(
            "```html\n<!DOCTYPE html><html><body><p>Here you go:</p>\
             <div class=\"page-container\"><p>Page {p} body</p></div></body></html>\n```"
        )
    });
    let config = config_with(model);

    let output = reconstruct(&png_asset(), "4", &config).await.unwrap();

    assert_eq!(
        output.pages[0].html,
        "<div class=\"page-container\"><p>Page 4 body</p></div>"
    );
    assert!(!output.html.contains("```"));
    assert!(!output.html.contains("Here you go"));
}

#[tokio::test]
async fn bare_markup_is_wrapped_in_a_container() {
    let model = ScriptedModel::with(&[], |p| format!("<h1>Page {p}</h1>"));
    let config = config_with(model);

    let output = reconstruct(&png_asset(), "1", &config).await.unwrap();
    assert_eq!(
        output.pages[0].html,
        "<div class=\"page-container\"><h1>Page 1</h1></div>"
    );
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn one_failed_page_becomes_a_placeholder() {
    init_tracing();
    let model = ScriptedModel::failing(&[2]);
    let config = config_with(model.clone());

    let output = reconstruct(&png_asset(), "1-3", &config).await.unwrap();

    assert_eq!(model.called_pages(), vec![1, 2, 3]);
    assert_eq!(output.pages.len(), 3);
    assert!(output.pages[0].is_success());
    assert!(!output.pages[1].is_success());
    assert!(output.pages[2].is_success());
    assert_eq!(output.stats.failed_pages, 1);
    assert_eq!(output.html.matches("Reconstruction Failed").count(), 1);
    assert!(output.html.contains("Page 2 Reconstruction Failed"));
}

#[tokio::test]
async fn all_pages_failing_is_tolerated_by_default() {
    let model = ScriptedModel::failing(&[1, 2]);
    let config = config_with(model);

    let output = reconstruct(&png_asset(), "1-2", &config).await.unwrap();
    assert_eq!(output.stats.succeeded_pages, 0);
    assert_eq!(output.html.matches("Reconstruction Failed").count(), 2);
}

#[tokio::test]
async fn reject_all_failed_policy_fails_the_run() {
    let model = ScriptedModel::failing(&[1, 2]);
    let mut config = config_with(model);
    config.failure_policy = FailurePolicy::RejectAllFailed;

    let err = reconstruct(&png_asset(), "1-2", &config).await.unwrap_err();
    match err {
        Manual2HtmlError::TooManyPageFailures {
            failed,
            total,
            first_error,
        } => {
            assert_eq!((failed, total), (2, 2));
            assert!(first_error.contains("503"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn failure_ratio_policy() {
    let model = ScriptedModel::failing(&[1, 2]);
    let mut config = config_with(model);
    config.failure_policy = FailurePolicy::MaxFailureRatio(0.5);

    assert!(reconstruct(&png_asset(), "1-4", &config).await.is_ok());
    assert!(reconstruct(&png_asset(), "1-3", &config).await.is_err());
}

// ── Configuration and input errors ───────────────────────────────────────────

#[tokio::test]
async fn missing_credential_makes_no_model_call() {
    let model = ScriptedModel::new();
    let mut config = config_with(model.clone());
    config.api_key = None;

    let err = reconstruct(&png_asset(), "1-3", &config).await.unwrap_err();
    assert!(matches!(err, Manual2HtmlError::MissingCredential));
    assert!(model.called_pages().is_empty());

    config.api_key = Some("   ".into());
    let err = reconstruct(&png_asset(), "1", &config).await.unwrap_err();
    assert!(matches!(err, Manual2HtmlError::MissingCredential));
    assert!(model.called_pages().is_empty());
}

#[tokio::test]
async fn empty_page_range_makes_no_model_call() {
    let model = ScriptedModel::new();
    let config = config_with(model.clone());

    for spec in ["3-1", "abc", ""] {
        let err = reconstruct(&png_asset(), spec, &config).await.unwrap_err();
        assert!(
            matches!(err, Manual2HtmlError::InvalidPageRange { .. }),
            "spec {spec:?} gave {err:?}"
        );
    }
    assert!(model.called_pages().is_empty());
}

// ── Pacing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn small_runs_use_the_short_delay() {
    let model = ScriptedModel::new();
    let config = ReconstructionConfig {
        small_batch_delay_ms: 20,
        large_batch_delay_ms: 400,
        ..config_with(model.clone())
    };

    let start = Instant::now();
    reconstruct(&png_asset(), "1-5", &config).await.unwrap();

    for gap in model.gaps() {
        assert!(gap >= Duration::from_millis(20), "gap too short: {gap:?}");
    }
    assert!(start.elapsed() < Duration::from_millis(1600));
}

#[tokio::test]
async fn large_runs_use_the_long_delay() {
    let model = ScriptedModel::new();
    let config = ReconstructionConfig {
        small_batch_delay_ms: 1,
        large_batch_delay_ms: 40,
        ..config_with(model.clone())
    };

    reconstruct(&png_asset(), "1-6", &config).await.unwrap();

    let gaps = model.gaps();
    assert_eq!(gaps.len(), 5);
    for gap in gaps {
        assert!(gap >= Duration::from_millis(40), "gap too short: {gap:?}");
    }
}

// ── Progress reporting ───────────────────────────────────────────────────────

#[tokio::test]
async fn progress_messages_in_order() {
    let model = ScriptedModel::failing(&[3]);
    let recorder = Arc::new(Recorder::default());
    let mut config = config_with(model);
    config.progress_callback = Some(recorder.clone());

    reconstruct(&png_asset(), "1, 3", &config).await.unwrap();

    assert_eq!(
        recorder.messages(),
        vec![
            "Processing page 1 (1/2)...",
            "Processing page 3 (2/2)...",
            "Assembling final document...",
        ]
    );
    let lines = recorder.lines();
    assert!(lines.contains(&"ok:1:1/2".to_string()));
    assert!(lines.contains(&"err:3".to_string()));
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_stops_between_pages() {
    let model = ScriptedModel::new();
    let token = CancellationToken::new();
    let recorder = Arc::new(Recorder {
        cancel_after_page: Some((1, token.clone())),
        ..Default::default()
    });
    let mut config = config_with(model.clone());
    config.progress_callback = Some(recorder);
    config.cancel = Some(token);

    let err = reconstruct(&png_asset(), "1-3", &config).await.unwrap_err();
    assert!(matches!(
        err,
        Manual2HtmlError::Cancelled {
            completed: 1,
            total: 3
        }
    ));
    assert_eq!(model.called_pages(), vec![1]);
}

// ── Streaming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_fragments_in_page_order() {
    let model = ScriptedModel::failing(&[2]);
    let config = config_with(model.clone());

    let stream = reconstruct_stream(&png_asset(), "2, 1, 3", &config).unwrap();
    // Nothing is requested until the stream is polled.
    assert!(model.called_pages().is_empty());

    let fragments: Vec<_> = stream.collect().await;
    let pages: Vec<u32> = fragments.iter().map(|f| f.page_num).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    assert!(fragments[1].error.is_some());

    let html = edgequake_manual2html::assemble_document(&fragments);
    assert!(html.contains("Page 2 Reconstruction Failed"));
}

#[test]
fn stream_rejects_missing_credential_eagerly() {
    let model = ScriptedModel::new();
    let mut config = config_with(model);
    config.api_key = None;
    assert!(matches!(
        reconstruct_stream(&png_asset(), "1", &config),
        Err(Manual2HtmlError::MissingCredential)
    ));
}

#[test]
fn stream_ends_when_cancelled() {
    let model = ScriptedModel::new();
    let token = CancellationToken::new();
    let mut config = config_with(model.clone());
    config.cancel = Some(token.clone());

    let fragments: Vec<_> = tokio_test::block_on(async {
        let mut stream = reconstruct_stream(&png_asset(), "1-4", &config).unwrap();
        let mut out = Vec::new();
        while let Some(f) = stream.next().await {
            out.push(f);
            if out.len() == 2 {
                token.cancel();
            }
        }
        out
    });
    assert_eq!(fragments.len(), 2);
    assert_eq!(model.called_pages(), vec![1, 2]);
}

// ── Convenience entry points ─────────────────────────────────────────────────

#[tokio::test]
async fn to_file_writes_the_document() {
    let model = ScriptedModel::new();
    let config = config_with(model);

    let mut src = tempfile::NamedTempFile::new().unwrap();
    src.write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0])
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("manual.html");

    let stats = reconstruct_to_file(src.path().to_str().unwrap(), "1-2", &out, &config)
        .await
        .unwrap();

    assert_eq!(stats.succeeded_pages, 2);
    let html = std::fs::read_to_string(&out).unwrap();
    assert!(html.contains("Page 2</h1>"));
}

#[test]
fn sync_wrapper_runs_its_own_runtime() {
    let model = ScriptedModel::new();
    let config = config_with(model);
    let output = reconstruct_sync(&png_asset(), "7", &config).unwrap();
    assert_eq!(output.pages[0].page_num, 7);
}

// ── Session ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_walks_the_status_machine() {
    let model = ScriptedModel::failing(&[2]);
    let recorder = Arc::new(Recorder::default());
    let mut config = config_with(model);
    config.progress_callback = Some(recorder.clone());

    let mut session =
        ReconstructionSession::new(config).with_preparation_delay(Duration::from_millis(5));
    let output = session.run(&png_asset(), "1-2").await.unwrap();

    assert_eq!(session.status(), ReconstructionStatus::Complete);
    assert_eq!(output.stats.failed_pages, 1);

    let lines = recorder.lines();
    let statuses: Vec<&String> = lines.iter().filter(|l| l.starts_with("status:")).collect();
    assert_eq!(
        statuses,
        vec!["status:LocatingPage", "status:Generating", "status:Complete"]
    );
    assert_eq!(recorder.messages()[0], "Locating physical page [1-2]...");

    // A finished session must be reset before it can run again.
    assert!(matches!(
        session.run(&png_asset(), "1").await,
        Err(Manual2HtmlError::InvalidTransition { .. })
    ));
    session.reset().unwrap();
    assert_eq!(session.status(), ReconstructionStatus::Idle);
}

#[tokio::test]
async fn session_ends_in_error_for_bad_range() {
    let model = ScriptedModel::new();
    let mut session = ReconstructionSession::new(config_with(model))
        .with_preparation_delay(Duration::ZERO);

    let err = session.run(&png_asset(), "9-2").await.unwrap_err();
    assert!(matches!(err, Manual2HtmlError::InvalidPageRange { .. }));
    assert_eq!(session.status(), ReconstructionStatus::Error);
    assert!(session.last_error().unwrap().contains("9-2"));
}
