//! # gemini-lens
//!
//! Ask a multimodal model about an image or a PDF, then turn its Markdown
//! answer into typed blocks you can render, store, or post-process.
//!
//! ## Pipeline Overview
//!
//! ```text
//! path / URL
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, sniff MIME
//!  ├─ 2. Encode     raw bytes → base64 inline part (MIME kept verbatim)
//!  ├─ 3. Generate   one call to gemini-1.5-pro (or any edgequake-llm provider)
//!  ├─ 4. Clean      line endings, wrapper fences, invisible characters
//!  └─ 5. Structure  Markdown → headings, paragraphs, lists, code, tables
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gemini_lens::{analyze_file, render_blocks, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Uses GEMINI_API_KEY, or whatever provider the environment offers
//!     let config = AnalysisConfig::default();
//!     let output = analyze_file("receipt.jpg", Some("What is the total?"), &config).await?;
//!     print!("{}", render_blocks(&output.blocks));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `gemlens` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! gemini-lens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod history;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze_file, analyze_many, analyze_sync, analyze_text, analyze_to_file, analyze_uploaded,
    generate, inspect, resolve_generator,
};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{EncodingError, LensError, TransportError};
pub use history::{History, HistoryEntry};
pub use output::{AnalysisOutput, AnalysisStats, FileInfo};
pub use pipeline::encode::{encode_bytes, encode_file, GenerativePart};
pub use pipeline::input::{FileKind, UploadedFile};
pub use pipeline::llm::{Generation, Generator, PromptRequest};
pub use pipeline::structure::{structure_response, ResponseBlock};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::render_blocks;
