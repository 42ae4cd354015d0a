//! Error types for the gemini-lens library.
//!
//! Two core error kinds map to the two places a submission can break:
//!
//! * [`EncodingError`]: the file content could not be read (missing file,
//!   permission problem, I/O failure mid-read, failed download). Nothing was
//!   sent to the model.
//!
//! * [`TransportError`]: the model API call itself failed. The message is
//!   kept verbatim so the user sees exactly what the provider said.
//!
//! [`LensError`] is what the top-level `analyze*` functions return. It wraps
//! both core kinds and adds the validation failures that happen before any
//! I/O (empty prompt, unsupported file type, bad configuration).
//!
//! Response structuring has no error type: it is total over all strings.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the gemini-lens library.
#[derive(Debug, Error)]
pub enum LensError {
    // ── Core ──────────────────────────────────────────────────────────────
    /// Reading the file content failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The model API call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    // ── Validation ────────────────────────────────────────────────────────
    /// The instruction text was empty or whitespace-only.
    #[error("Prompt is empty.\nProvide an instruction with --prompt or type one in chat mode.")]
    EmptyPrompt,

    /// The file is neither an image nor a PDF.
    #[error("Unsupported file type '{mime_type}'. Please upload an image or PDF file.")]
    UnsupportedFileType { mime_type: String },

    /// The input string is neither a usable path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    // ── Provider ──────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config ────────────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The file content could not be read.
///
/// Fatal to the submission it belongs to; the message is shown to the user
/// as-is.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The read started but failed part-way.
    #[error("Failed to read '{name}': {source}")]
    ReadFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },
}

/// The external model API call failed. Never retried.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// The provider returned an error.
    #[error("{message}")]
    Api { message: String },

    /// No response arrived within the configured timeout.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl TransportError {
    /// Extra guidance for errors users commonly hit, if any applies.
    ///
    /// Providers report an unknown or retired model with a message that
    /// mentions "models" and "not found".
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TransportError::Api { message }
                if message.contains("models") && message.contains("not found") =>
            {
                Some("Model not found or not available. Check the model name with --model.")
            }
            TransportError::Timeout { .. } => Some("Increase --api-timeout for large files."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_is_verbatim() {
        let e = TransportError::Api {
            message: "quota exceeded for project 42".into(),
        };
        assert_eq!(e.to_string(), "quota exceeded for project 42");
        assert_eq!(e.hint(), None);
    }

    #[test]
    fn model_not_found_has_hint() {
        let e = TransportError::Api {
            message: "models/gemini-9 is not found for API version v1beta".into(),
        };
        assert!(e.hint().unwrap().contains("--model"));
    }

    #[test]
    fn encoding_error_wraps_into_lens_error() {
        let e: LensError = EncodingError::FileNotFound {
            path: PathBuf::from("/nope.png"),
        }
        .into();
        assert!(matches!(e, LensError::Encoding(_)));
        assert!(e.to_string().contains("/nope.png"));
    }

    #[test]
    fn unsupported_type_display() {
        let e = LensError::UnsupportedFileType {
            mime_type: "text/plain".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("text/plain"), "got: {msg}");
        assert!(msg.contains("image or PDF"));
    }

    #[test]
    fn timeout_display() {
        let e = TransportError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
