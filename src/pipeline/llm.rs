//! Completion-model interaction: send the extraction prompt, get one reply.
//!
//! Two layers live here:
//!
//! * [`CompletionService`]: the transport. [`AzureChatCompletion`] talks to
//!   an Azure OpenAI deployment directly; [`ProviderCompletion`] adapts any
//!   `edgequake_llm` provider.
//! * [`ExtractionClient`]: the boundary the orchestrator calls. It makes
//!   exactly one request (no retries, no streaming) and never returns an
//!   error: a failed call comes back as [`ModelReply::Unavailable`] so the
//!   orchestrator, not the client, decides whether that fails the upload.

use crate::config::{AzureOpenAiSettings, ExtractionConfig, SamplingSettings, DEFAULT_MODEL};
use crate::error::Doc2CsvError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// A transport-level completion failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompletionError {
    pub message: String,
}

impl CompletionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Sends a single system prompt and returns the text of the first choice.
pub trait CompletionService: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        sampling: &'a SamplingSettings,
    ) -> BoxFuture<'a, Result<String, CompletionError>>;

    /// Short label for logs.
    fn name(&self) -> String;
}

/// Outcome of one extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// The model answered; the text is passed on untouched.
    Text(String),
    /// The call failed in transport, authentication or the service itself.
    Unavailable { reason: String },
}

impl ModelReply {
    pub fn is_available(&self) -> bool {
        matches!(self, ModelReply::Text(_))
    }

    /// Reply text, with an unavailable reply read as `""`.
    pub fn into_text_or_empty(self) -> String {
        match self {
            ModelReply::Text(text) => text,
            ModelReply::Unavailable { .. } => String::new(),
        }
    }
}

/// Single-shot extraction request against a [`CompletionService`].
#[derive(Clone)]
pub struct ExtractionClient {
    service: Arc<dyn CompletionService>,
    sampling: SamplingSettings,
}

impl ExtractionClient {
    pub fn new(service: Arc<dyn CompletionService>, sampling: SamplingSettings) -> Self {
        Self { service, sampling }
    }

    /// Resolve the completion backend named by `config`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, Doc2CsvError> {
        let service = resolve_service(config)?;
        Ok(Self::new(service, config.sampling))
    }

    pub fn sampling(&self) -> &SamplingSettings {
        &self.sampling
    }

    /// Send `prompt` once. Failures are logged and reported as
    /// [`ModelReply::Unavailable`], never propagated.
    pub async fn query(&self, prompt: &str) -> ModelReply {
        let start = Instant::now();
        match self.service.complete(prompt, &self.sampling).await {
            Ok(text) => {
                debug!(
                    "{}: {} chars back in {:?}",
                    self.service.name(),
                    text.len(),
                    start.elapsed()
                );
                ModelReply::Text(text)
            }
            Err(e) => {
                warn!("{}: completion failed: {}", self.service.name(), e);
                ModelReply::Unavailable { reason: e.message }
            }
        }
    }
}

// ── Azure OpenAI ─────────────────────────────────────────────────────────

/// Chat-completions request against an Azure OpenAI deployment.
pub struct AzureChatCompletion {
    http: reqwest::Client,
    settings: AzureOpenAiSettings,
}

impl AzureChatCompletion {
    pub fn new(settings: AzureOpenAiSettings, timeout_secs: u64) -> Result<Self, Doc2CsvError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Doc2CsvError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, settings })
    }

    /// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=…`
    pub fn request_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment,
            self.settings.api_version
        )
    }

    async fn send(&self, prompt: &str, sampling: &SamplingSettings) -> Result<String, CompletionError> {
        let body = ChatRequest::new(prompt, sampling);

        let response = self
            .http
            .post(self.request_url())
            .header("api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::new(format!("request timed out: {e}"))
                } else {
                    CompletionError::new(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::new(format!("HTTP {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::new(format!("invalid response body: {e}")))?;
        parsed.into_first_content()
    }
}

impl CompletionService for AzureChatCompletion {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        sampling: &'a SamplingSettings,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(self.send(prompt, sampling))
    }

    fn name(&self) -> String {
        format!("azure/{}", self.settings.deployment)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    n: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn new(prompt: &'a str, sampling: &SamplingSettings) -> Self {
        Self {
            messages: vec![ChatRequestMessage {
                role: "system",
                content: prompt,
            }],
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
            n: sampling.n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_first_content(self) -> Result<String, CompletionError> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| CompletionError::new("response contained no choices"))
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Any `edgequake_llm` provider. The provider returns a single response per
/// call, which is the `n = 1` contract.
pub struct ProviderCompletion {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderCompletion {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    async fn send(&self, prompt: &str, sampling: &SamplingSettings) -> Result<String, CompletionError> {
        let messages = vec![ChatMessage::system(prompt)];
        let options = build_options(sampling);
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CompletionError::new(format!("{}", e)))?;
        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

impl CompletionService for ProviderCompletion {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        sampling: &'a SamplingSettings,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(self.send(prompt, sampling))
    }

    fn name(&self) -> String {
        "edgequake-llm".to_string()
    }
}

/// Build `CompletionOptions` from the fixed sampling settings.
fn build_options(sampling: &SamplingSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(sampling.temperature),
        top_p: Some(sampling.top_p),
        frequency_penalty: Some(sampling.frequency_penalty),
        presence_penalty: Some(sampling.presence_penalty),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Doc2CsvError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Doc2CsvError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the completion backend, from most-specific to least-specific:
///
/// 1. Azure OpenAI settings (`config.azure`)
/// 2. Pre-built provider (`config.provider`)
/// 3. Named provider + model (`config.provider_name`)
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 5. `ProviderFactory::from_env` auto-detection
pub fn resolve_service(config: &ExtractionConfig) -> Result<Arc<dyn CompletionService>, Doc2CsvError> {
    if let Some(ref azure) = config.azure {
        info!("Using Azure OpenAI deployment '{}'", azure.deployment);
        return Ok(Arc::new(AzureChatCompletion::new(
            azure.clone(),
            config.api_timeout_secs,
        )?));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderCompletion::new(Arc::clone(provider))));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return Ok(Arc::new(ProviderCompletion::new(create_provider(name, model)?)));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return Ok(Arc::new(ProviderCompletion::new(create_provider(&prov, &model)?)));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Doc2CsvError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set AZURE_OPENAI_ENDPOINT/AZURE_OPENAI_KEY/AZURE_OPENAI_DEPLOYMENT, \
                OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(ProviderCompletion::new(llm_provider)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AZURE_API_VERSION;

    struct Failing;

    impl CompletionService for Failing {
        fn complete<'a>(
            &'a self,
            _prompt: &'a str,
            _sampling: &'a SamplingSettings,
        ) -> BoxFuture<'a, Result<String, CompletionError>> {
            Box::pin(async { Err(CompletionError::new("401 Unauthorized")) })
        }

        fn name(&self) -> String {
            "failing".into()
        }
    }

    struct Echo;

    impl CompletionService for Echo {
        fn complete<'a>(
            &'a self,
            prompt: &'a str,
            _sampling: &'a SamplingSettings,
        ) -> BoxFuture<'a, Result<String, CompletionError>> {
            Box::pin(async move { Ok(prompt.to_uppercase()) })
        }

        fn name(&self) -> String {
            "echo".into()
        }
    }

    fn azure_settings() -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint: "https://acme.openai.azure.com/".into(),
            api_key: "k".into(),
            deployment: "gpt-35".into(),
            api_version: DEFAULT_AZURE_API_VERSION.into(),
        }
    }

    #[tokio::test]
    async fn failure_becomes_unavailable() {
        let client = ExtractionClient::new(Arc::new(Failing), SamplingSettings::default());
        let reply = client.query("prompt").await;
        assert_eq!(
            reply,
            ModelReply::Unavailable {
                reason: "401 Unauthorized".into()
            }
        );
        assert!(!reply.is_available());
        assert_eq!(reply.into_text_or_empty(), "");
    }

    #[tokio::test]
    async fn success_passes_text_through() {
        let client = ExtractionClient::new(Arc::new(Echo), SamplingSettings::default());
        let reply = client.query("a|b").await;
        assert_eq!(reply, ModelReply::Text("A|B".into()));
    }

    #[test]
    fn build_options_uses_fixed_sampling() {
        let opts = build_options(&SamplingSettings::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.top_p, Some(1.0));
        assert_eq!(opts.frequency_penalty, Some(0.0));
        assert_eq!(opts.presence_penalty, Some(0.0));
    }

    #[test]
    fn azure_request_body_carries_every_sampling_field() {
        let sampling = SamplingSettings::default();
        let body = serde_json::to_value(ChatRequest::new("extract", &sampling)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "extract");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["top_p"], 1.0);
        assert_eq!(body["frequency_penalty"], 0.0);
        assert_eq!(body["presence_penalty"], 0.0);
        assert_eq!(body["n"], 1);
    }

    #[test]
    fn azure_url_trims_trailing_slash() {
        let svc = AzureChatCompletion::new(azure_settings(), 5).unwrap();
        assert_eq!(
            svc.request_url(),
            format!(
                "https://acme.openai.azure.com/openai/deployments/gpt-35/chat/completions?api-version={}",
                DEFAULT_AZURE_API_VERSION
            )
        );
        assert_eq!(svc.name(), "azure/gpt-35");
    }

    #[test]
    fn chat_response_takes_first_choice() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"PL1|INV1"}},{"message":{"content":"other"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_first_content().unwrap(), "PL1|INV1");
    }

    #[test]
    fn chat_response_without_choices_is_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parsed.into_first_content().is_err());
    }

    #[test]
    fn completion_error_displays_message() {
        let err = CompletionError::new("HTTP 429: slow down");
        assert_eq!(err.to_string(), "HTTP 429: slow down");
    }

    fn azure_at(endpoint: String) -> ExtractionClient {
        let settings = AzureOpenAiSettings {
            endpoint,
            ..azure_settings()
        };
        let svc = AzureChatCompletion::new(settings, 5).unwrap();
        ExtractionClient::new(Arc::new(svc), SamplingSettings::default())
    }

    #[tokio::test]
    async fn unreachable_azure_endpoint_is_unavailable() {
        // Port 1 is never listening.
        let reply = azure_at("http://127.0.0.1:1".into()).query("prompt").await;
        match reply {
            ModelReply::Unavailable { reason } => {
                assert!(reason.starts_with("request"), "reason: {reason}")
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    /// Consume one HTTP request (headers plus `content-length` body).
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;

        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            data.extend_from_slice(&chunk[..n]);
            let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + body_len {
                return;
            }
        }
    }

    #[tokio::test]
    async fn azure_error_status_is_unavailable() {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let body = r#"{"error":"bad key"}"#;
            let response = format!(
                "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        let reply = azure_at(format!("http://{addr}")).query("prompt").await;
        server.await.unwrap();

        match reply {
            ModelReply::Unavailable { reason } => {
                assert!(reason.starts_with("HTTP 401"), "reason: {reason}");
                assert!(reason.contains("bad key"), "reason: {reason}");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn resolve_prefers_azure() {
        let config = ExtractionConfig::builder()
            .azure(azure_settings())
            .build()
            .unwrap();
        let service = resolve_service(&config).unwrap();
        assert_eq!(service.name(), "azure/gpt-35");
    }
}
