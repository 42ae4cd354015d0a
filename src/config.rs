//! Configuration for prompt and file analysis.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. One struct means one place to look when two
//! runs behave differently, and it is cheap to clone into concurrent tasks.

use crate::error::LensError;
use crate::pipeline::llm::Generator;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Provider used when `GEMINI_API_KEY` is present and nothing else is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Configuration for one or more submissions.
///
/// # Example
/// ```rust
/// use gemini_lens::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gemini-1.5-flash")
///     .temperature(0.2)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.model.as_deref(), Some("gemini-1.5-flash"));
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Model identifier, e.g. "gemini-1.5-pro". If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Provider name understood by `edgequake_llm::ProviderFactory`
    /// ("gemini", "openai", "anthropic", "ollama", …).
    pub provider_name: Option<String>,

    /// Pre-built generator. Takes precedence over `provider_name`.
    pub generator: Option<Arc<dyn Generator>>,

    /// Optional system prompt sent ahead of every request.
    pub system_prompt: Option<String>,

    /// Sampling temperature. Range 0.0–2.0. Default: 0.4.
    pub temperature: f32,

    /// Maximum output tokens per response. Default: 8192.
    pub max_tokens: usize,

    /// Maximum simultaneous submissions in [`crate::analyze::analyze_many`]. Default: 4.
    pub concurrency: usize,

    /// Per-call model timeout in seconds. Default: 120.
    ///
    /// PDFs of a few dozen pages routinely take over a minute on pro-tier models.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Receives per-submission events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            generator: None,
            system_prompt: None,
            temperature: 0.4,
            max_tokens: 8192,
            concurrency: 4,
            api_timeout_secs: 120,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("generator", &self.generator.as_ref().map(|g| g.label()))
            .field("system_prompt", &self.system_prompt.as_ref().map(|s| s.len()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("concurrency", &self.concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model that will be requested.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, LensError> {
        let c = &self.config;
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(LensError::InvalidConfig(format!(
                "Temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if c.concurrency == 0 {
            return Err(LensError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(LensError::InvalidConfig("Max tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(LensError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
        assert_eq!(c.concurrency, 4);
        assert!(c.generator.is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let c = AnalysisConfig::builder()
            .model("gemini-1.5-flash")
            .provider_name("gemini")
            .system_prompt("Be terse.")
            .max_tokens(256)
            .api_timeout_secs(5)
            .build()
            .unwrap();
        assert_eq!(c.model_or_default(), "gemini-1.5-flash");
        assert_eq!(c.provider_name.as_deref(), Some("gemini"));
        assert_eq!(c.system_prompt.as_deref(), Some("Be terse."));
        assert_eq!(c.max_tokens, 256);
        assert_eq!(c.api_timeout_secs, 5);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AnalysisConfig::builder().temperature(3.0).build().is_err());
        assert!(AnalysisConfig::builder().concurrency(0).build().is_err());
        assert!(AnalysisConfig::builder().max_tokens(0).build().is_err());
        assert!(AnalysisConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_hides_prompt_text() {
        let c = AnalysisConfig::builder()
            .system_prompt("secret instructions")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"), "got: {dbg}");
    }
}
