//! Progress-callback trait for submission events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to be told when
//! requests go out and come back. The CLI drives its spinner from these
//! events; a GUI could disable its submit button between
//! `on_request_start` and `on_request_complete` / `on_request_error`.
//!
//! # Example
//!
//! ```rust
//! use gemini_lens::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl AnalysisProgressCallback for Counter {
//!     fn on_request_complete(&self, label: &str, response_len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{label}: {response_len} chars");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analysis entry points as submissions progress.
///
/// `label` is the file name for file submissions and `"prompt"` for
/// text-only ones. With [`crate::analyze::analyze_many`] the per-request
/// methods may be called concurrently, so implementations guard shared state
/// with `Mutex` or atomics. All methods default to no-ops.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before any request of a batch is sent.
    fn on_submission_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the model request is sent.
    fn on_request_start(&self, label: &str) {
        let _ = label;
    }

    /// Called when a response arrived; `response_len` is its byte length.
    fn on_request_complete(&self, label: &str, response_len: usize) {
        let _ = (label, response_len);
    }

    /// Called when encoding or the model call failed.
    fn on_request_error(&self, label: &str, error: &str) {
        let _ = (label, error);
    }

    /// Called once after every request of a batch has finished.
    fn on_submission_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
