//! File encoding: raw bytes → base64 [`GenerativePart`].
//!
//! Gemini (and every other multimodal API reachable through `edgequake-llm`)
//! accepts attachments as base64 strings embedded in the JSON request body,
//! next to the MIME type the caller declared. The encoder is deliberately
//! dumb about content: it never inspects the bytes and never touches the
//! MIME type. Sniffing belongs to [`crate::pipeline::input`].

use crate::error::EncodingError;
use crate::pipeline::input::{FileKind, FileSource, UploadedFile};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// A file attachment ready to travel inside a generation request.
///
/// Recomputed for every submission; there is no cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerativePart {
    data: String,
    mime_type: String,
}

impl GenerativePart {
    /// Base64 (standard alphabet, padded) encoding of the file bytes.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// The MIME type exactly as declared by the source file.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mime(&self.mime_type)
    }
}

impl From<GenerativePart> for ImageData {
    fn from(part: GenerativePart) -> Self {
        let is_image = part.kind() == FileKind::Image;
        let data = ImageData::new(part.data, part.mime_type.as_str());
        // `high` lets OpenAI-style providers use full tiling; harmless elsewhere.
        if is_image {
            data.with_detail("high")
        } else {
            data
        }
    }
}

/// Encode in-memory bytes. Infallible and deterministic.
pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> GenerativePart {
    let data = STANDARD.encode(bytes);
    debug!("Encoded {} bytes ({}) → {} bytes base64", bytes.len(), mime_type, data.len());
    GenerativePart {
        data,
        mime_type: mime_type.to_string(),
    }
}

/// Read `reader` to the end and encode its content.
///
/// I/O errors from the reader are returned unchanged.
pub async fn encode_reader<R>(mut reader: R, mime_type: &str) -> std::io::Result<GenerativePart>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(encode_bytes(&buf, mime_type))
}

/// Encode an uploaded file, reading it from disk if it is path-backed.
pub async fn encode_file(file: &UploadedFile) -> Result<GenerativePart, EncodingError> {
    match file.source() {
        FileSource::Memory(bytes) => Ok(encode_bytes(bytes, file.mime_type())),
        FileSource::Path(path) => {
            let handle = tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EncodingError::FileNotFound { path: path.clone() },
                std::io::ErrorKind::PermissionDenied => {
                    EncodingError::PermissionDenied { path: path.clone() }
                }
                _ => EncodingError::ReadFailed {
                    name: file.name().to_string(),
                    source: e,
                },
            })?;
            encode_reader(handle, file.mime_type())
                .await
                .map_err(|source| EncodingError::ReadFailed {
                    name: file.name().to_string(),
                    source,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn encode_round_trips() {
        let bytes = [0u8, 159, 146, 150, b'%', b'P', b'D', b'F'];
        let part = encode_bytes(&bytes, "application/pdf");
        assert_eq!(part.mime_type(), "application/pdf");
        assert_eq!(STANDARD.decode(part.data()).expect("valid base64"), bytes);
    }

    #[test]
    fn empty_bytes_encode_to_empty_string() {
        let part = encode_bytes(&[], "image/png");
        assert_eq!(part.data(), "");
        assert_eq!(part.mime_type(), "image/png");
    }

    #[test]
    fn mime_type_is_never_rewritten() {
        // PNG magic under a declared JPEG type stays JPEG.
        let part = encode_bytes(b"\x89PNG\r\n\x1a\n", "image/jpeg");
        assert_eq!(part.mime_type(), "image/jpeg");
    }

    #[test]
    fn converts_to_image_data() {
        let data: ImageData = encode_bytes(b"abc", "image/webp").into();
        assert_eq!(data.mime_type, "image/webp");
        assert_eq!(data.data, "YWJj");
    }

    #[tokio::test]
    async fn reader_error_propagates() {
        let reader = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
            .build();
        let err = encode_reader(reader, "image/png").await.unwrap_err();
        assert_eq!(err.to_string(), "disk gone");
    }

    #[tokio::test]
    async fn path_backed_file_is_read_at_encode_time() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello").unwrap();
        let file = UploadedFile::from_path(tmp.path(), "text/plain").unwrap();

        let part = encode_file(&file).await.unwrap();
        assert_eq!(part.data(), "aGVsbG8=");
        assert_eq!(part.mime_type(), "text/plain");
    }

    #[tokio::test]
    async fn missing_file_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        std::fs::write(&path, b"x").unwrap();
        let file = UploadedFile::from_path(&path, "image/png").unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = encode_file(&file).await.unwrap_err();
        assert!(matches!(err, EncodingError::FileNotFound { .. }), "got {err:?}");
    }
}
