//! Top-level entry points: submit a prompt, a file, or a batch of files.
//!
//! Every submission follows the same path:
//!
//! ```text
//! resolve input ─▶ check kind ─▶ encode ─▶ generate ─▶ clean ─▶ structure
//! ```
//!
//! Each call builds its own [`PromptRequest`] and returns its own
//! [`AnalysisOutput`]; nothing is shared between concurrent submissions
//! except the (stateless) generator.

use crate::config::{AnalysisConfig, DEFAULT_PROVIDER};
use crate::error::LensError;
use crate::output::{AnalysisOutput, AnalysisStats, FileInfo};
use crate::pipeline::encode::{encode_file, GenerativePart};
use crate::pipeline::input::{resolve_input, FileKind, FileSource, UploadedFile};
use crate::pipeline::llm::{Generator, LlmGenerator, PromptRequest};
use crate::pipeline::postprocess::clean_response;
use crate::pipeline::structure::structure_response;
use crate::prompts::prompt_or_default;
use edgequake_llm::ProviderFactory;
use futures::stream::{self, StreamExt};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const TEXT_LABEL: &str = "prompt";

/// Send one request to the model and return its text.
///
/// The thinnest wrapper over the external API: no cleanup, no structuring,
/// no retry.
pub async fn generate(
    prompt_text: &str,
    part: Option<GenerativePart>,
    config: &AnalysisConfig,
) -> Result<String, LensError> {
    let request = PromptRequest::new(prompt_text, part);
    request.validate()?;
    let generator = resolve_generator(config)?;
    let generation = generator.generate(&request).await?;
    Ok(generation.text)
}

/// Submit a text-only prompt.
pub async fn analyze_text(
    prompt: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    let request = PromptRequest::text(prompt.trim());
    request.validate()?;
    let generator = resolve_generator(config)?;

    with_submission_events(config, async {
        submit(generator.as_ref(), request, TEXT_LABEL, None, 0, config).await
    })
    .await
}

/// Submit a local file path or HTTP/HTTPS URL with an optional prompt.
///
/// Without a prompt, the default for the file's kind is used
/// (see [`crate::prompts`]).
pub async fn analyze_file(
    input: impl AsRef<str>,
    prompt: Option<&str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    let input = input.as_ref();
    info!("Analyzing: {}", input);
    let file = resolve_input(input, config.download_timeout_secs).await?;
    analyze_uploaded(&file, prompt, config).await
}

/// Submit an already-resolved file.
pub async fn analyze_uploaded(
    file: &UploadedFile,
    prompt: Option<&str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    ensure_supported(file)?;
    let generator = resolve_generator(config)?;
    with_submission_events(config, analyze_with(generator.as_ref(), file, prompt, config)).await
}

/// Submit several files concurrently with the same prompt.
///
/// At most `config.concurrency` requests are in flight. Results come back
/// in input order; one failure does not affect the others.
pub async fn analyze_many<S: AsRef<str>>(
    inputs: &[S],
    prompt: Option<&str>,
    config: &AnalysisConfig,
) -> Result<Vec<Result<AnalysisOutput, LensError>>, LensError> {
    let generator = resolve_generator(config)?;
    let total = inputs.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_submission_start(total);
    }

    let results: Vec<Result<AnalysisOutput, LensError>> = stream::iter(inputs.iter().map(|input| {
        let generator = Arc::clone(&generator);
        async move {
            let input = input.as_ref();
            let file = match resolve_input(input, config.download_timeout_secs).await {
                Ok(file) => file,
                Err(e) => {
                    report_error(config, input, &e);
                    return Err(e);
                }
            };
            if let Err(e) = ensure_supported(&file) {
                report_error(config, file.name(), &e);
                return Err(e);
            }
            analyze_with(generator.as_ref(), &file, prompt, config).await
        }
    }))
    .buffered(config.concurrency.max(1))
    .collect()
    .await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    info!("Batch complete: {}/{} succeeded", succeeded, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_submission_complete(total, succeeded);
    }
    Ok(results)
}

/// Analyze and write the model's Markdown to `output_path`.
///
/// `input` of `None` means a text-only prompt. Uses an atomic write
/// (temp file + rename) so a failed run never leaves a partial file.
pub async fn analyze_to_file(
    input: Option<&str>,
    prompt: Option<&str>,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    let output = match input {
        Some(input) => analyze_file(input, prompt, config).await?,
        None => analyze_text(prompt.unwrap_or_default(), config).await?,
    };
    write_atomic(output_path.as_ref(), &output.response_text).await?;
    Ok(output)
}

/// Synchronous wrapper around [`analyze_file`] / [`analyze_text`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input: Option<&str>,
    prompt: Option<&str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| LensError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    runtime.block_on(async {
        match input {
            Some(input) => analyze_file(input, prompt, config).await,
            None => analyze_text(prompt.unwrap_or_default(), config).await,
        }
    })
}

/// Describe a file without calling the model. Needs no API key.
pub async fn inspect(input: impl AsRef<str>) -> Result<FileInfo, LensError> {
    let file = resolve_input(input.as_ref(), 60).await?;
    let mut info = FileInfo::from_file(&file);
    if file.kind() == FileKind::Image {
        let bytes = match file.source() {
            FileSource::Memory(bytes) => bytes.clone(),
            FileSource::Path(path) => tokio::fs::read(path).await.map_err(|source| {
                crate::error::EncodingError::ReadFailed {
                    name: file.name().to_string(),
                    source,
                }
            })?,
        };
        info.dimensions = image_dimensions(&bytes);
    }
    Ok(info)
}

/// Pick the generator, from most-specific to least-specific.
///
/// 1. **Pre-built generator** (`config.generator`): used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    the default model.
/// 3. **Environment pair** (`GEMLENS_PROVIDER` + `GEMLENS_MODEL`).
/// 4. **Gemini** when `GEMINI_API_KEY` is set.
/// 5. **Auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_generator(config: &AnalysisConfig) -> Result<Arc<dyn Generator>, LensError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }

    if let Some(ref name) = config.provider_name {
        return create_generator(name, config.model_or_default(), config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("GEMLENS_PROVIDER"),
        std::env::var("GEMLENS_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_generator(&prov, &model, config);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_generator(DEFAULT_PROVIDER, config.model_or_default(), config);
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| LensError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY / ANTHROPIC_API_KEY), or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(LlmGenerator::new(provider, "auto", config)))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_generator(
    provider_name: &str,
    model: &str,
    config: &AnalysisConfig,
) -> Result<Arc<dyn Generator>, LensError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        LensError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    debug!("Using provider {} with model {}", provider_name, model);
    Ok(Arc::new(LlmGenerator::new(
        provider,
        format!("{provider_name}/{model}"),
        config,
    )))
}

fn ensure_supported(file: &UploadedFile) -> Result<(), LensError> {
    if file.kind().is_supported() {
        Ok(())
    } else {
        Err(LensError::UnsupportedFileType {
            mime_type: file.mime_type().to_string(),
        })
    }
}

/// Wrap a single submission in start/complete events.
async fn with_submission_events<F>(config: &AnalysisConfig, fut: F) -> Result<AnalysisOutput, LensError>
where
    F: std::future::Future<Output = Result<AnalysisOutput, LensError>>,
{
    if let Some(ref cb) = config.progress_callback {
        cb.on_submission_start(1);
    }
    let result = fut.await;
    if let Some(ref cb) = config.progress_callback {
        cb.on_submission_complete(1, usize::from(result.is_ok()));
    }
    result
}

/// Encode `file` and submit it. Caller has already checked the kind.
async fn analyze_with(
    generator: &dyn Generator,
    file: &UploadedFile,
    prompt: Option<&str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    let instruction = prompt_or_default(prompt, file.kind());

    let encode_start = Instant::now();
    let part = match encode_file(file).await {
        Ok(part) => part,
        Err(e) => {
            let e = LensError::from(e);
            report_error(config, file.name(), &e);
            return Err(e);
        }
    };
    let encode_ms = encode_start.elapsed().as_millis() as u64;
    debug!(
        "Encoded {} ({}) in {}ms",
        file.name(),
        part.mime_type(),
        encode_ms
    );

    let request = PromptRequest::with_part(instruction, part);
    submit(
        generator,
        request,
        file.name(),
        Some(FileInfo::from_file(file)),
        encode_ms,
        config,
    )
    .await
}

/// Send `request`, then clean and structure the answer.
async fn submit(
    generator: &dyn Generator,
    request: PromptRequest,
    label: &str,
    file: Option<FileInfo>,
    encode_duration_ms: u64,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, LensError> {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_start(label);
    }
    info!("{}: sending request via {}", label, generator.label());

    let generation = match generator.generate(&request).await {
        Ok(g) => g,
        Err(e) => {
            let e = LensError::from(e);
            report_error(config, label, &e);
            return Err(e);
        }
    };
    let generate_ms = start.elapsed().as_millis() as u64;

    let cleaned = clean_response(&generation.text);
    let blocks: Vec<_> = structure_response(&cleaned).collect();
    debug!(
        "{}: {} chars → {} blocks",
        label,
        generation.text.len(),
        blocks.len()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_request_complete(label, generation.text.len());
    }

    Ok(AnalysisOutput {
        prompt: request.instruction_text().to_string(),
        response_text: generation.text,
        blocks,
        file,
        stats: AnalysisStats {
            input_tokens: generation.input_tokens,
            output_tokens: generation.output_tokens,
            encode_duration_ms,
            generate_duration_ms: generate_ms,
            total_duration_ms: encode_duration_ms + generate_ms,
        },
    })
}

fn report_error(config: &AnalysisConfig, label: &str, error: &LensError) {
    warn!("{}: {}", label, error);
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_error(label, &error.to_string());
    }
}

fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Write through a uniquely named temp file in the target directory, then
/// rename over `path`. Neighbouring files are never touched.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), LensError> {
    let target = path.to_path_buf();
    let contents = contents.to_owned();
    tokio::task::spawn_blocking(move || {
        let write_err = |source| LensError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        let dir = match target.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(write_err)?;
                parent.to_path_buf()
            }
            None => std::path::PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(contents.as_bytes()).map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| LensError::Internal(format!("output writer task failed: {e}")))?
}
