//! Pipeline stages for a single submission.
//!
//! Each submodule implements one step and can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ postprocess ──▶ structure
//! (URL/path) (base64)  (model)   (cleanup)      (blocks)
//! ```
//!
//! 1. [`input`] turns a path or URL into an [`input::UploadedFile`]
//! 2. [`encode`] base64-wraps the file's bytes as an inline part
//! 3. [`llm`] sends the prompt and part; the only stage with model I/O
//! 4. [`postprocess`] fixes model quirks in the text before parsing
//! 5. [`structure`] lazily parses Markdown into [`structure::ResponseBlock`]s

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod structure;
