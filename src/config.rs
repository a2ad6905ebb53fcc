//! Configuration types for document-to-CSV extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The sampling parameters sent to the
//! completion model are fixed by [`SamplingSettings::default`] and are not
//! exposed as builder knobs: extraction must decode deterministically.

use crate::error::Doc2CsvError;
use crate::progress::ObserverHandle;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Azure OpenAI REST API version.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// Default model when a named provider is chosen without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for the extraction pipeline.
///
/// # Example
/// ```rust
/// use edgequake_doc2csv::{AlignmentMode, ExtractionConfig, FailurePolicy};
///
/// let config = ExtractionConfig::builder()
///     .azure_openai("https://acme.openai.azure.com", "key", "gpt-35-turbo")
///     .failure_policy(FailurePolicy::Propagate)
///     .alignment(AlignmentMode::Strict)
///     .build()
///     .unwrap();
/// assert_eq!(config.sampling.temperature, 0.0);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Direct Azure OpenAI deployment. Takes precedence over every other
    /// provider option when set.
    pub azure: Option<AzureOpenAiSettings>,

    /// Pre-constructed LLM provider. Used when `azure` is `None`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Model identifier for `provider_name`.
    pub model: Option<String>,

    /// Sampling parameters for the completion call.
    pub sampling: SamplingSettings,

    /// What to do when the completion service is unavailable. Default: degrade.
    pub failure_policy: FailurePolicy,

    /// How a parsed record is checked against the schema. Default: passthrough.
    pub alignment: AlignmentMode,

    /// Tesseract settings for the image path.
    pub ocr: OcrSettings,

    /// Directory holding libpdfium. `None` binds to the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Transport timeout for the completion request in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Stage observer for progress reporting.
    pub observer: Option<ObserverHandle>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            azure: None,
            provider: None,
            provider_name: None,
            model: None,
            sampling: SamplingSettings::default(),
            failure_policy: FailurePolicy::default(),
            alignment: AlignmentMode::default(),
            ocr: OcrSettings::default(),
            pdfium_lib_path: None,
            api_timeout_secs: 60,
            observer: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("azure", &self.azure)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("sampling", &self.sampling)
            .field("failure_policy", &self.failure_policy)
            .field("alignment", &self.alignment)
            .field("ocr", &self.ocr)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Use an Azure OpenAI deployment with the default API version.
    pub fn azure_openai(
        mut self,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        self.config.azure = Some(AzureOpenAiSettings {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        });
        self
    }

    pub fn azure(mut self, settings: AzureOpenAiSettings) -> Self {
        self.config.azure = Some(settings);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn alignment(mut self, mode: AlignmentMode) -> Self {
        self.config.alignment = mode;
        self
    }

    pub fn ocr(mut self, ocr: OcrSettings) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Doc2CsvError> {
        let c = &self.config;
        if let Some(ref azure) = c.azure {
            if !azure.endpoint.starts_with("http://") && !azure.endpoint.starts_with("https://") {
                return Err(Doc2CsvError::InvalidConfig(format!(
                    "Azure OpenAI endpoint must be an http(s) URL, got '{}'",
                    azure.endpoint
                )));
            }
            if azure.api_key.is_empty() {
                return Err(Doc2CsvError::InvalidConfig(
                    "Azure OpenAI API key is empty".into(),
                ));
            }
            if azure.deployment.is_empty() {
                return Err(Doc2CsvError::InvalidConfig(
                    "Azure OpenAI deployment is empty".into(),
                ));
            }
        }
        if c.api_timeout_secs == 0 {
            return Err(Doc2CsvError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.ocr.language.trim().is_empty() {
            return Err(Doc2CsvError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Connection settings for an Azure OpenAI deployment.
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureOpenAiSettings {
    /// Resource endpoint, e.g. `https://acme.openai.azure.com`.
    pub endpoint: String,
    /// `api-key` header value.
    pub api_key: String,
    /// Deployment name chosen when the model was deployed.
    pub deployment: String,
    /// REST API version query parameter.
    pub api_version: String,
}

impl fmt::Debug for AzureOpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAiSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Sampling parameters sent with every extraction request.
///
/// The defaults are the only values the pipeline uses: greedy decoding,
/// no nucleus truncation, no penalties, exactly one choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub n: u32,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            n: 1,
        }
    }
}

/// Orchestrator policy for an unavailable completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Treat the reply as empty and finish the upload with an empty CSV row.
    #[default]
    Degrade,
    /// Fail the upload with [`Doc2CsvError::ExtractionServiceFailure`].
    Propagate,
}

/// How a parsed record is reconciled with the schema before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlignmentMode {
    /// Render whatever the model returned, misaligned or not.
    #[default]
    Passthrough,
    /// Reject records whose length differs from the schema.
    Strict,
}

/// Tesseract invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Binary name or path. Default: `tesseract`.
    pub binary: PathBuf,
    /// Language code passed as `-l`. Default: `eng`.
    pub language: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_deterministic_sampling() {
        let config = ExtractionConfig::default();
        assert_eq!(config.sampling.temperature, 0.0);
        assert_eq!(config.sampling.top_p, 1.0);
        assert_eq!(config.sampling.frequency_penalty, 0.0);
        assert_eq!(config.sampling.presence_penalty, 0.0);
        assert_eq!(config.sampling.n, 1);
        assert_eq!(config.failure_policy, FailurePolicy::Degrade);
        assert_eq!(config.alignment, AlignmentMode::Passthrough);
    }

    #[test]
    fn azure_settings_use_default_api_version() {
        let config = ExtractionConfig::builder()
            .azure_openai("https://acme.openai.azure.com", "k", "dep")
            .build()
            .unwrap();
        let azure = config.azure.unwrap();
        assert_eq!(azure.api_version, DEFAULT_AZURE_API_VERSION);
        assert_eq!(azure.deployment, "dep");
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = ExtractionConfig::builder()
            .azure_openai("acme.openai.azure.com", "k", "dep")
            .build()
            .unwrap_err();
        assert!(matches!(err, Doc2CsvError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_empty_key_and_zero_timeout() {
        assert!(ExtractionConfig::builder()
            .azure_openai("https://x", "", "dep")
            .build()
            .is_err());
        assert!(ExtractionConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ExtractionConfig::builder()
            .azure_openai("https://x", "super-secret", "dep")
            .build()
            .unwrap();
        let dbg = format!("{:?}", config);
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
