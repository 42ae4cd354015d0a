//! Default instructions used when a file is submitted without a prompt.
//!
//! Callers normally pass their own prompt; these only fill the gap so that
//! `gemlens photo.jpg` does something useful on its own.

use crate::pipeline::input::FileKind;

/// Default prompt for images.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe what you see in this image in detail";

/// Default prompt for PDF documents.
pub const DEFAULT_PDF_PROMPT: &str = "Analyze this PDF and summarize its key points";

/// Fallback for anything else.
pub const DEFAULT_FILE_PROMPT: &str = "Analyze this file and describe what you see";

/// The default instruction for a file of the given kind.
pub fn default_prompt(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Image => DEFAULT_IMAGE_PROMPT,
        FileKind::Pdf => DEFAULT_PDF_PROMPT,
        FileKind::Other => DEFAULT_FILE_PROMPT,
    }
}

/// Use `prompt` when it has content, otherwise the default for `kind`.
pub fn prompt_or_default(prompt: Option<&str>, kind: FileKind) -> String {
    match prompt.map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => default_prompt(kind).to_string(),
    }
}
