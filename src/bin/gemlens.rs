//! CLI binary for gemini-lens.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use gemini_lens::pipeline::input::resolve_input;
use gemini_lens::{
    analyze_many, analyze_text, analyze_uploaded, inspect, render_blocks, AnalysisConfig,
    AnalysisOutput, AnalysisProgressCallback, FileInfo, FileKind, History, HistoryEntry,
    LensError, ProgressCallback, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
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

/// Terminal progress callback: a spinner while requests are in flight and
/// one log line per finished request. Requests may finish out of order.
struct CliProgressCallback {
    /// Recreated for every submission so chat mode can reuse the callback.
    bar: Mutex<Option<ProgressBar>>,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn println(&self, line: String) {
        match self.bar.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn elapsed_secs(&self, label: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(label)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_submission_start(&self, total: usize) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_prefix(if total > 1 {
            format!("Analyzing {total} files")
        } else {
            "Thinking".to_string()
        });
        bar.enable_steady_tick(Duration::from_millis(80));
        *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(bar);
    }

    fn on_request_start(&self, label: &str) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.to_string(), Instant::now());
        if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            bar.set_message(label.to_string());
        }
    }

    fn on_request_complete(&self, label: &str, response_len: usize) {
        let secs = self.elapsed_secs(label);
        self.println(format!(
            "  {} {:<32}  {:<8}  {}",
            green("✓"),
            label,
            dim(&format!("{response_len:>6} chars")),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_request_error(&self, label: &str, error: &str) {
        let secs = self.elapsed_secs(label);
        // Keep one line per request.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            label,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_submission_complete(&self, total: usize, succeeded: usize) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).take() {
            bar.finish_and_clear();
        }
        if total > 1 {
            let failed = total.saturating_sub(succeeded);
            eprintln!(
                "{} {}/{} files analyzed{}",
                if failed == 0 { green("✔") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                if failed == 0 {
                    String::new()
                } else {
                    format!("  ({} failed)", red(&failed.to_string()))
                },
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask a question without a file
  gemlens -p "Explain the borrow checker in two sentences"

  # Describe an image (default prompt)
  gemlens photo.jpg

  # Ask about a PDF, save the raw Markdown
  gemlens report.pdf -p "List every table in this report" --format markdown -o tables.md

  # Several files at once, 2 requests in flight
  gemlens -c 2 a.png b.png c.pdf -p "What is in this file?"

  # From a URL
  gemlens https://example.com/chart.png -p "Summarize this chart"

  # File details only (no API key needed)
  gemlens --inspect-only photo.jpg

  # Interactive session about one file
  gemlens --chat diagram.png

CHAT COMMANDS:
  :history      list this session's prompts, newest first
  :show <id>    print an earlier response again
  :clear        forget the session history
  :quit         exit

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY     Google Gemini API key
  GEMLENS_PROVIDER   Provider override (gemini, openai, anthropic, ollama)
  GEMLENS_MODEL      Model override
  RUST_LOG           Log filter, e.g. gemini_lens=debug
"#;

/// Ask a generative model about images, PDFs, or plain prompts.
#[derive(Parser, Debug)]
#[command(
    name = "gemlens",
    version,
    about = "Ask a generative model about images, PDFs, or plain prompts",
    long_about = "Submit a prompt, optionally with image or PDF files (local paths or URLs), \
to a hosted multimodal model and print its answer as plain text, Markdown, or JSON. \
Defaults to Google Gemini; any provider supported by edgequake-llm can be used.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image/PDF paths or HTTP/HTTPS URLs. None for a text-only prompt.
    inputs: Vec<String>,

    /// Instruction sent with each input. Defaults per file kind.
    #[arg(short, long, env = "GEMLENS_PROMPT")]
    prompt: Option<String>,

    /// Model ID (e.g. gemini-1.5-pro, gemini-1.5-flash).
    #[arg(long, env = "GEMLENS_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "GEMLENS_PROVIDER")]
    provider: Option<String>,

    /// Declared MIME type for every input, overriding detection.
    #[arg(long)]
    mime: Option<String>,

    /// Output format.
    #[arg(long, value_enum, env = "GEMLENS_FORMAT", default_value = "text")]
    format: OutputFormat,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "GEMLENS_OUTPUT")]
    output: Option<PathBuf>,

    /// Path to a text file containing a system prompt.
    #[arg(long, env = "GEMLENS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "GEMLENS_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max output tokens per response.
    #[arg(long, env = "GEMLENS_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Number of concurrent model calls for multiple inputs.
    #[arg(short, long, env = "GEMLENS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "GEMLENS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "GEMLENS_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Print file details only, no model call.
    #[arg(long)]
    inspect_only: bool,

    /// Interactive session reading prompts from stdin.
    #[arg(long)]
    chat: bool,

    /// Disable the spinner.
    #[arg(long, env = "GEMLENS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GEMLENS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GEMLENS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Structured blocks rendered as plain text.
    Text,
    /// The model's Markdown exactly as received.
    Markdown,
    /// `AnalysisOutput` as JSON.
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library logs quiet while the spinner is drawing.
    let show_progress = !cli.quiet && !cli.no_progress && cli.format != OutputFormat::Json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        if cli.inputs.is_empty() {
            anyhow::bail!("--inspect-only needs at least one INPUT");
        }
        let mut infos = Vec::with_capacity(cli.inputs.len());
        for input in &cli.inputs {
            let mut info = inspect(input)
                .await
                .with_context(|| format!("Failed to inspect {input}"))?;
            if let Some(ref mime) = cli.mime {
                info.mime_type = mime.clone();
                info.kind = FileKind::from_mime(mime);
            }
            infos.push(info);
        }
        let text = if cli.format == OutputFormat::Json {
            serde_json::to_string_pretty(&infos).context("Failed to serialize file info")? + "\n"
        } else {
            infos.iter().map(format_info).collect::<Vec<_>>().join("\n")
        };
        return emit(&cli, &text).await;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    if cli.chat {
        return chat(&cli, &config).await;
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let results: Vec<Result<AnalysisOutput, LensError>> = if cli.inputs.is_empty() {
        let prompt = cli
            .prompt
            .as_deref()
            .context("Nothing to do: pass --prompt, an INPUT file, or --chat")?;
        vec![analyze_text(prompt, &config).await]
    } else if let Some(ref mime) = cli.mime {
        // Declared MIME needs the resolved file, so run these one by one.
        let mut results = Vec::with_capacity(cli.inputs.len());
        for input in &cli.inputs {
            results.push(analyze_with_mime(input, mime, cli.prompt.as_deref(), &config).await);
        }
        results
    } else {
        analyze_many(&cli.inputs, cli.prompt.as_deref(), &config)
            .await
            .context("Analysis failed")?
    };

    let total = results.len();
    let mut outputs = Vec::with_capacity(total);
    let mut last_error = None;
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => {
                let label = cli.inputs.get(i).map(String::as_str).unwrap_or("prompt");
                eprintln!("{} {}: {}", red("error"), label, e);
                print_hint(&e);
                last_error = Some(e);
            }
        }
    }

    if !outputs.is_empty() {
        let text = format_outputs(&outputs, cli.format, cli.inputs.len() > 1)?;
        emit(&cli, &text).await?;
    }

    if !cli.quiet && cli.format != OutputFormat::Json {
        let input_tokens: u64 = outputs.iter().map(|o| o.stats.input_tokens).sum();
        let output_tokens: u64 = outputs.iter().map(|o| o.stats.output_tokens).sum();
        let ms: u64 = outputs.iter().map(|o| o.stats.total_duration_ms).sum();
        if !outputs.is_empty() {
            eprintln!(
                "   {} tokens in  /  {} tokens out  -  {}ms",
                dim(&input_tokens.to_string()),
                dim(&output_tokens.to_string()),
                ms,
            );
        }
    }

    match last_error {
        None => Ok(()),
        Some(e) if total == 1 => Err(e).context("Analysis failed"),
        Some(_) => anyhow::bail!("{} of {} inputs failed", total - outputs.len(), total),
    }
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let system_prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(system_prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn resolve_with_mime(
    input: &str,
    mime: Option<&str>,
    config: &AnalysisConfig,
) -> Result<UploadedFile, LensError> {
    let file = resolve_input(input, config.download_timeout_secs).await?;
    Ok(match mime {
        Some(mime) => file.with_mime_type(mime),
        None => file,
    })
}

async fn analyze_with_mime(
    input: &str,
    mime: &str,
    prompt: Option<&str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    let file = resolve_with_mime(input, Some(mime), config).await?;
    analyze_uploaded(&file, prompt, config).await
}

// ── Chat mode ────────────────────────────────────────────────────────────

/// Read prompts from stdin until EOF or `:quit`. The first INPUT, if any,
/// is attached to every prompt.
async fn chat(cli: &Cli, config: &AnalysisConfig) -> Result<()> {
    let attached = match cli.inputs.first() {
        Some(input) => Some(
            resolve_with_mime(input, cli.mime.as_deref(), config)
                .await
                .with_context(|| format!("Failed to open {input}"))?,
        ),
        None => None,
    };
    if cli.inputs.len() > 1 {
        eprintln!("{} chat uses only the first INPUT", cyan("note"));
    }

    let mut history = History::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !cli.quiet {
        match attached {
            Some(ref file) => eprintln!(
                "{} chatting about {}  {}",
                cyan("◆"),
                bold(file.name()),
                dim("(:quit to exit)")
            ),
            None => eprintln!("{} {}", cyan("◆"), dim("type a prompt, :quit to exit")),
        }
    }

    loop {
        eprint!("{} ", bold(">"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("", _) => continue,
            (":quit" | ":q" | ":exit", _) => break,
            (":clear", _) => {
                history.clear();
                eprintln!("{}", dim("history cleared"));
                continue;
            }
            (":history", _) => {
                if history.is_empty() {
                    eprintln!("{}", dim("no history yet"));
                }
                for entry in history.entries() {
                    eprintln!(
                        "  {:>3}  {}  {}",
                        entry.id,
                        dim(&entry.timestamp.format("%H:%M:%S").to_string()),
                        entry.prompt_text,
                    );
                }
                continue;
            }
            (":show", id) => {
                match id.parse().ok().and_then(|id| history.get(id)) {
                    Some(entry) => print_entry(cli.format, entry),
                    None => eprintln!("{} no entry {:?}", red("error"), id),
                }
                continue;
            }
            _ => {}
        }

        let result = match attached {
            Some(ref file) => analyze_uploaded(file, Some(line), config).await,
            None => analyze_text(line, config).await,
        };
        match result {
            Ok(output) => {
                print_entry(cli.format, history.record(&output));
            }
            Err(e) => {
                eprintln!("{} {}", red("error"), e);
                print_hint(&e);
            }
        }
    }
    Ok(())
}

fn print_entry(format: OutputFormat, entry: &HistoryEntry) {
    match format {
        OutputFormat::Text => print!("{}", render_blocks(&entry.response_blocks)),
        OutputFormat::Markdown => println!("{}", entry.response_text.trim_end()),
        OutputFormat::Json => match serde_json::to_string(entry) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{} {}", red("error"), e),
        },
    }
    io::stdout().flush().ok();
}

// ── Output ───────────────────────────────────────────────────────────────

fn format_outputs(outputs: &[AnalysisOutput], format: OutputFormat, many: bool) -> Result<String> {
    if format == OutputFormat::Json {
        let json = if many {
            serde_json::to_string_pretty(outputs)
        } else {
            serde_json::to_string_pretty(&outputs[0])
        };
        return Ok(json.context("Failed to serialise output")? + "\n");
    }

    let sections: Vec<String> = outputs
        .iter()
        .map(|output| {
            let body = match format {
                OutputFormat::Markdown => {
                    let mut md = output.response_text.trim_end().to_string();
                    md.push('\n');
                    md
                }
                _ => render_blocks(&output.blocks),
            };
            match (&output.file, many) {
                (Some(file), true) => format!("{}\n\n{}", bold(&format!("── {} ──", file.name)), body),
                _ => body,
            }
        })
        .collect();
    Ok(sections.join("\n"))
}

fn format_info(info: &FileInfo) -> String {
    let mut out = format!(
        "File:        {}\nType:        {} ({})\nSize:        {} ({} bytes)\n",
        info.name, info.mime_type, info.kind, info.size_display, info.size_bytes
    );
    if let Some((w, h)) = info.dimensions {
        out.push_str(&format!("Dimensions:  {w} x {h}\n"));
    }
    if !info.kind.is_supported() {
        out.push_str("Note:        not an image or PDF; cannot be analyzed\n");
    }
    out
}

/// Write to `-o` or stdout.
async fn emit(cli: &Cli, text: &str) -> Result<()> {
    match cli.output {
        Some(ref path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} wrote {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn print_hint(error: &LensError) {
    let hint = match error {
        LensError::Transport(t) => t.hint(),
        _ => None,
    };
    if let Some(hint) = hint {
        eprintln!("  {} {}", cyan("hint:"), hint);
    }
}
