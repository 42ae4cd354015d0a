//! Orchestration tests against a scripted generator.
//!
//! No network: every test injects a [`Generator`] through the config, so
//! provider resolution never touches the environment.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use gemini_lens::prompts::{DEFAULT_IMAGE_PROMPT, DEFAULT_PDF_PROMPT};
use gemini_lens::{
    analyze_file, analyze_many, analyze_sync, analyze_text, analyze_to_file, analyze_uploaded,
    generate, inspect, AnalysisConfig, AnalysisProgressCallback, FileKind, Generation, Generator,
    History, LensError, PromptRequest, ResponseBlock, TransportError, UploadedFile,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// What the generator saw for one call.
#[derive(Debug, Clone)]
struct Seen {
    instruction: String,
    mime_type: Option<String>,
    data: Option<String>,
}

enum Script {
    /// Reply with a fixed text.
    Reply(String),
    /// Reply with the attached part's base64 data. Earlier calls answer later.
    EchoData,
    Fail(TransportError),
}

struct ScriptedGenerator {
    script: Script,
    seen: Mutex<Vec<Seen>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn reply(text: &str) -> Arc<Self> {
        Self::new(Script::Reply(text.to_string()))
    }

    fn calls(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &PromptRequest) -> Result<Generation, TransportError> {
        let part = request.part();
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        self.seen.lock().unwrap().push(Seen {
            instruction: request.instruction_text().to_string(),
            mime_type: part.map(|p| p.mime_type().to_string()),
            data: part.map(|p| p.data().to_string()),
        });
        match &self.script {
            Script::Reply(text) => Ok(Generation {
                text: text.clone(),
                input_tokens: 12,
                output_tokens: 34,
            }),
            Script::EchoData => {
                let data = part.map(|p| p.data().to_string()).unwrap_or_default();
                let delay = 60u64.saturating_sub(call * 30);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Generation::from_text(data))
            }
            Script::Fail(e) => Err(e.clone()),
        }
    }
}

fn config_with(generator: Arc<ScriptedGenerator>) -> AnalysisConfig {
    AnalysisConfig::builder()
        .generator(generator)
        .build()
        .unwrap()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> String {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

// ── Text-only ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_prompt_is_cleaned_and_structured() {
    let gen = ScriptedGenerator::reply("```markdown\n# Title\n\nBody text\n```");
    let out = analyze_text("Say hello", &config_with(gen.clone()))
        .await
        .unwrap();

    assert_eq!(
        out.blocks,
        vec![
            ResponseBlock::heading(1, "Title"),
            ResponseBlock::paragraph("Body text"),
        ]
    );
    // Raw text is kept as received.
    assert!(out.response_text.starts_with("```markdown"));
    assert_eq!(out.prompt, "Say hello");
    assert!(out.file.is_none());
    assert_eq!(out.stats.input_tokens, 12);
    assert_eq!(out.stats.output_tokens, 34);
    assert_eq!(out.stats.encode_duration_ms, 0);

    let calls = gen.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].mime_type.is_none());
}

#[tokio::test]
async fn empty_prompt_never_reaches_the_generator() {
    let gen = ScriptedGenerator::reply("unused");
    let err = analyze_text("   \n", &config_with(gen.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::EmptyPrompt));

    let err = generate("", None, &config_with(gen.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::EmptyPrompt));
    assert!(gen.calls().is_empty());
}

#[tokio::test]
async fn generate_returns_raw_text() {
    let gen = ScriptedGenerator::reply("```markdown\nraw\n```");
    let text = generate("hi", None, &config_with(gen)).await.unwrap();
    assert_eq!(text, "```markdown\nraw\n```");
}

#[tokio::test]
async fn transport_errors_surface_verbatim() {
    let message = "models/gemini-0.1 is not found for API version v1beta";
    let gen = ScriptedGenerator::new(Script::Fail(TransportError::Api {
        message: message.to_string(),
    }));
    let err = analyze_text("hello", &config_with(gen)).await.unwrap_err();

    assert_eq!(err.to_string(), message);
    match err {
        LensError::Transport(t) => assert!(t.hint().is_some()),
        other => panic!("expected transport error, got {other:?}"),
    }
}

// ── Files ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn image_is_sent_inline_with_default_prompt() {
    let bytes = png_bytes(4, 4);
    let file = UploadedFile::from_bytes("dot.png", bytes.clone(), "image/png");
    let gen = ScriptedGenerator::reply("A tiny grey square.");
    let out = analyze_uploaded(&file, None, &config_with(gen.clone()))
        .await
        .unwrap();

    let calls = gen.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].instruction, DEFAULT_IMAGE_PROMPT);
    assert_eq!(calls[0].mime_type.as_deref(), Some("image/png"));
    assert_eq!(calls[0].data.as_deref(), Some(STANDARD.encode(&bytes).as_str()));

    let info = out.file.unwrap();
    assert_eq!(info.name, "dot.png");
    assert_eq!(info.kind, FileKind::Image);
    assert_eq!(out.prompt, DEFAULT_IMAGE_PROMPT);
}

#[tokio::test]
async fn declared_mime_type_is_never_rewritten() {
    // PNG bytes declared as something else still go out under the declared type.
    let file = UploadedFile::from_bytes("odd.bin", png_bytes(1, 1), "image/x-custom");
    let gen = ScriptedGenerator::reply("ok");
    analyze_uploaded(&file, Some("What is this?"), &config_with(gen.clone()))
        .await
        .unwrap();
    assert_eq!(gen.calls()[0].mime_type.as_deref(), Some("image/x-custom"));
}

#[tokio::test]
async fn pdf_from_disk_uses_pdf_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "doc.pdf", b"%PDF-1.7\n%fake\n");
    let gen = ScriptedGenerator::reply("- point one\n- point two");
    let out = analyze_file(&path, Some("  "), &config_with(gen.clone()))
        .await
        .unwrap();

    let calls = gen.calls();
    assert_eq!(calls[0].instruction, DEFAULT_PDF_PROMPT);
    assert_eq!(calls[0].mime_type.as_deref(), Some("application/pdf"));
    assert_eq!(
        out.blocks,
        vec![ResponseBlock::List {
            ordered: false,
            items: vec!["point one".into(), "point two".into()],
        }]
    );
}

#[tokio::test]
async fn unsupported_file_rejected_before_any_call() {
    let file = UploadedFile::from_bytes("notes.txt", b"hello".to_vec(), "text/plain");
    let gen = ScriptedGenerator::reply("unused");
    let err = analyze_uploaded(&file, Some("Summarize"), &config_with(gen.clone()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LensError::UnsupportedFileType { ref mime_type } if mime_type == "text/plain"
    ));
    assert!(gen.calls().is_empty());
}

#[tokio::test]
async fn missing_file_is_an_encoding_error() {
    let gen = ScriptedGenerator::reply("unused");
    let err = analyze_file("/definitely/not/here.png", None, &config_with(gen.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::Encoding(_)));
    assert!(gen.calls().is_empty());
}

// ── Batches ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counter {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    batch: Mutex<Option<(usize, usize)>>,
}

impl AnalysisProgressCallback for Counter {
    fn on_request_start(&self, _label: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_request_complete(&self, _label: &str, _len: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_request_error(&self, _label: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_submission_complete(&self, total: usize, succeeded: usize) {
        *self.batch.lock().unwrap() = Some((total, succeeded));
    }
}

#[tokio::test]
async fn batch_keeps_input_order_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let small = png_bytes(1, 1);
    let large = png_bytes(16, 16);
    let inputs = vec![
        write_file(dir.path(), "small.png", &small),
        dir.path().join("missing.png").to_string_lossy().into_owned(),
        write_file(dir.path(), "large.png", &large),
        write_file(dir.path(), "notes.txt", b"plain text"),
    ];

    let gen = ScriptedGenerator::new(Script::EchoData);
    let counter = Arc::new(Counter::default());
    let config = AnalysisConfig::builder()
        .generator(gen.clone())
        .concurrency(3)
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    let results = analyze_many(&inputs, Some("Describe"), &config)
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().response_text, STANDARD.encode(&small));
    assert!(matches!(results[1], Err(LensError::Encoding(_))));
    assert_eq!(results[2].as_ref().unwrap().response_text, STANDARD.encode(&large));
    assert!(matches!(results[3], Err(LensError::UnsupportedFileType { .. })));

    assert_eq!(gen.calls().len(), 2);
    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 2);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 2);
    assert_eq!(*counter.batch.lock().unwrap(), Some((4, 2)));
}

// ── Output & helpers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn to_file_writes_model_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("answers/out.md");
    let gen = ScriptedGenerator::reply("# Answer\n\n42\n");

    let out = analyze_to_file(None, Some("Meaning of life?"), &out_path, &config_with(gen))
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "# Answer\n\n42\n");
    assert_eq!(out.blocks.len(), 2);
}

#[test]
fn sync_wrapper_runs_its_own_runtime() {
    let gen = ScriptedGenerator::reply("fine");
    let out = analyze_sync(None, Some("How are you?"), &config_with(gen)).unwrap();
    assert_eq!(out.blocks, vec![ResponseBlock::paragraph("fine")]);
}

#[tokio::test]
async fn inspect_needs_no_generator() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "photo.png", &png_bytes(5, 3));
    let info = inspect(&path).await.unwrap();

    assert_eq!(info.mime_type, "image/png");
    assert_eq!(info.kind, FileKind::Image);
    assert_eq!(info.dimensions, Some((5, 3)));

    let txt = write_file(dir.path(), "a.txt", b"hello");
    let info = inspect(&txt).await.unwrap();
    assert_eq!(info.kind, FileKind::Other);
    assert_eq!(info.dimensions, None);
    assert_eq!(info.size_display, "5 bytes");
}

#[tokio::test]
async fn session_history_is_newest_first() {
    let gen = ScriptedGenerator::reply("answer");
    let config = config_with(gen);
    let mut history = History::new();

    for prompt in ["first", "second"] {
        let out = analyze_text(prompt, &config).await.unwrap();
        history.record(&out);
    }

    let prompts: Vec<_> = history
        .entries()
        .iter()
        .map(|e| e.prompt_text.as_str())
        .collect();
    assert_eq!(prompts, ["second", "first"]);
    assert_eq!(history.latest().unwrap().response_blocks, vec![ResponseBlock::paragraph("answer")]);
}
