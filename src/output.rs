//! Result types returned by the analysis entry points.

use crate::pipeline::input::{format_size, FileKind, UploadedFile};
use crate::pipeline::structure::ResponseBlock;
use serde::{Deserialize, Serialize};

/// Summary of an uploaded file. Produced by [`crate::analyze::inspect`]
/// without any model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size_bytes: u64,
    /// e.g. `"1.50 KB"`.
    pub size_display: String,
    pub mime_type: String,
    pub kind: FileKind,
    /// `(width, height)` in pixels for images the `image` crate can decode.
    pub dimensions: Option<(u32, u32)>,
}

impl FileInfo {
    pub fn from_file(file: &UploadedFile) -> Self {
        Self {
            name: file.name().to_string(),
            size_bytes: file.size_bytes(),
            size_display: format_size(file.size_bytes()),
            mime_type: file.mime_type().to_string(),
            kind: file.kind(),
            dimensions: None,
        }
    }
}

/// Timing and token accounting for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Zero for text-only submissions.
    pub encode_duration_ms: u64,
    pub generate_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one submission produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// The instruction that was sent.
    pub prompt: String,
    /// Model text exactly as received.
    pub response_text: String,
    /// Structured view of the cleaned response.
    pub blocks: Vec<ResponseBlock>,
    /// The attached file, if any.
    pub file: Option<FileInfo>,
    pub stats: AnalysisStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_info_from_uploaded() {
        let file = UploadedFile::from_bytes("scan.pdf", vec![0; 2048], "application/pdf");
        let info = FileInfo::from_file(&file);
        assert_eq!(info.name, "scan.pdf");
        assert_eq!(info.size_display, "2.00 KB");
        assert_eq!(info.kind, FileKind::Pdf);
        assert_eq!(info.dimensions, None);
    }

    #[test]
    fn output_serialises_blocks() {
        let out = AnalysisOutput {
            prompt: "hi".into(),
            response_text: "# Hi".into(),
            blocks: vec![ResponseBlock::heading(1, "Hi")],
            file: None,
            stats: AnalysisStats::default(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["blocks"][0]["type"], "heading");
        assert!(json["file"].is_null());
    }
}
