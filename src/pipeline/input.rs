//! Input resolution: turn a user-supplied path or URL into an [`UploadedFile`].
//!
//! Local files stay on disk until encode time; only their size and a short
//! header (for MIME sniffing) are read here. URLs are downloaded into memory
//! because the whole body has to be base64-encoded into the request anyway.
//!
//! MIME types are decided here and nowhere else. A caller-declared type
//! always wins; otherwise magic bytes are sniffed, then the extension is
//! consulted, and `application/octet-stream` is the last resort.

use crate::error::{EncodingError, LensError};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const OCTET_STREAM: &str = "application/octet-stream";
const PDF_MIME: &str = "application/pdf";

/// Broad category of an uploaded file, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Any `image/*` type.
    Image,
    /// `application/pdf`.
    Pdf,
    /// Anything else. Not accepted for analysis.
    Other,
}

impl FileKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let essence = mime_type.trim().to_ascii_lowercase();
        if essence.starts_with("image/") {
            FileKind::Image
        } else if essence == PDF_MIME {
            FileKind::Pdf
        } else {
            FileKind::Other
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, FileKind::Other)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Image => f.write_str("image"),
            FileKind::Pdf => f.write_str("pdf"),
            FileKind::Other => f.write_str("other"),
        }
    }
}

/// Where the bytes of an [`UploadedFile`] live.
#[derive(Clone)]
pub enum FileSource {
    /// Read lazily from disk by the encoder.
    Path(PathBuf),
    /// Already in memory (downloaded, or handed over by the caller).
    Memory(Vec<u8>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            FileSource::Memory(b) => write!(f, "Memory(<{} bytes>)", b.len()),
        }
    }
}

/// A file selected for submission.
///
/// Immutable once built; choosing another file means building a new value.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    name: String,
    size_bytes: u64,
    mime_type: String,
    source: FileSource,
}

impl UploadedFile {
    /// Wrap bytes already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            mime_type: mime_type.into(),
            source: FileSource::Memory(bytes),
        }
    }

    /// Reference a file on disk with an explicit MIME type.
    ///
    /// Only the metadata is read now; the content is read by the encoder.
    pub fn from_path(
        path: impl AsRef<Path>,
        mime_type: impl Into<String>,
    ) -> Result<Self, EncodingError> {
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path).map_err(|e| io_to_encoding(e, &path))?;
        Ok(Self {
            name: display_name(&path),
            size_bytes: meta.len(),
            mime_type: mime_type.into(),
            source: FileSource::Path(path),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mime(&self.mime_type)
    }

    /// Copy with a caller-declared MIME type replacing the detected one.
    pub fn with_mime_type(self, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            ..self
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an [`UploadedFile`].
///
/// URLs are downloaded (bounded by `timeout_secs`); anything else is treated
/// as a local path that must exist and be readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<UploadedFile, LensError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LensError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        Ok(download_url(input, timeout_secs).await?)
    } else {
        Ok(resolve_local(input)?)
    }
}

/// Validate a local path and sniff its MIME type from the first bytes.
fn resolve_local(path_str: &str) -> Result<UploadedFile, EncodingError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(EncodingError::FileNotFound { path });
    }

    let mut head = [0u8; 32];
    let n = match std::fs::File::open(&path) {
        Ok(mut f) => f.read(&mut head).map_err(|e| io_to_encoding(e, &path))?,
        Err(e) => return Err(io_to_encoding(e, &path)),
    };

    let mime_type = sniff_mime(&head[..n], Some(&path));
    let file = UploadedFile::from_path(&path, mime_type)?;
    debug!(
        "Resolved local file: {} ({}, {} bytes)",
        path.display(),
        file.mime_type(),
        file.size_bytes()
    );
    Ok(file)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, EncodingError> {
    info!("Downloading file from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EncodingError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            EncodingError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EncodingError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(EncodingError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(mime_essence)
        .filter(|m| !m.is_empty() && m != OCTET_STREAM);

    let name = filename_from_url(url);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            EncodingError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EncodingError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let mime_type =
        declared.unwrap_or_else(|| sniff_mime(&bytes, Some(Path::new(name.as_str()))));
    info!("Downloaded {} bytes ({})", bytes.len(), mime_type);

    Ok(UploadedFile::from_bytes(name, bytes.to_vec(), mime_type))
}

/// Guess a MIME type from leading bytes, then from the path's extension.
pub fn sniff_mime(head: &[u8], path: Option<&Path>) -> String {
    if head.starts_with(b"%PDF") {
        return PDF_MIME.to_string();
    }
    if let Ok(format) = image::guess_format(head) {
        return format.to_mime_type().to_string();
    }

    let ext = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF_MIME.to_string(),
        Some(ext) => ImageFormat::from_extension(ext)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string()),
        None => OCTET_STREAM.to_string(),
    }
}

/// Human-readable size: bytes below 1 KiB, otherwise KB/MB with two decimals.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} bytes")
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}

/// `"text/html; charset=utf-8"` → `"text/html"`.
fn mime_essence(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "download".to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn io_to_encoding(e: std::io::Error, path: &Path) -> EncodingError {
    match e.kind() {
        std::io::ErrorKind::NotFound => EncodingError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => EncodingError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => EncodingError::ReadFailed {
            name: display_name(path),
            source: e,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/cat.png"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn file_kind_from_mime() {
        assert_eq!(FileKind::from_mime("image/png"), FileKind::Image);
        assert_eq!(FileKind::from_mime("IMAGE/JPEG"), FileKind::Image);
        assert_eq!(FileKind::from_mime("application/pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_mime("text/plain"), FileKind::Other);
        assert!(!FileKind::Other.is_supported());
    }

    #[test]
    fn sniff_prefers_magic_bytes() {
        assert_eq!(sniff_mime(b"%PDF-1.7", Some(Path::new("x.png"))), "application/pdf");
        assert_eq!(sniff_mime(PNG_MAGIC, Some(Path::new("x.pdf"))), "image/png");
    }

    #[test]
    fn sniff_falls_back_to_extension() {
        assert_eq!(sniff_mime(b"????", Some(Path::new("scan.PDF"))), "application/pdf");
        assert_eq!(sniff_mime(b"????", Some(Path::new("a.jpg"))), "image/jpeg");
        assert_eq!(sniff_mime(b"????", Some(Path::new("notes.xyz"))), OCTET_STREAM);
        assert_eq!(sniff_mime(b"", None), OCTET_STREAM);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 bytes");
        assert_eq!(format_size(1023), "1023 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(2 * 1024 * 1024), "2.00 MB");
    }

    #[test]
    fn test_mime_essence() {
        assert_eq!(mime_essence("Image/PNG; charset=binary"), "image/png");
        assert_eq!(mime_essence("application/pdf"), "application/pdf");
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://host/a/b/report.pdf"), "report.pdf");
        assert_eq!(filename_from_url("https://host/"), "download");
    }

    #[test]
    fn declared_mime_replaces_detected() {
        let file = UploadedFile::from_bytes("a.bin", vec![1, 2, 3], OCTET_STREAM)
            .with_mime_type("image/png");
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(file.size_bytes(), 3);
        assert_eq!(file.kind(), FileKind::Image);
    }

    #[tokio::test]
    async fn resolve_local_sniffs_type_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let file = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(file.name(), "shot");
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(file.size_bytes(), PNG_MAGIC.len() as u64);
        assert!(matches!(file.source(), FileSource::Path(_)));
    }

    #[tokio::test]
    async fn resolve_missing_file() {
        let err = resolve_input("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(
            err,
            LensError::Encoding(EncodingError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn resolve_empty_input() {
        let err = resolve_input("   ", 5).await.unwrap_err();
        assert!(matches!(err, LensError::InvalidInput { .. }));
    }
}
