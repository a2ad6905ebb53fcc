//! Upload orchestration: one document in, one response (and artifacts) out.
//!
//! Each upload runs the stages strictly in order and is finished before
//! [`Pipeline::process`] returns:
//!
//! ```text
//! Received → Classified → TextExtracted → ModelQueried → Parsed → Rendered → Persisted
//! ```
//!
//! The original upload is written to the store on receipt, before the
//! filename is classified, so an unsupported upload is still kept. Image
//! uploads stop after text extraction and answer with the OCR text; PDF
//! uploads go through the model and leave `<stem>.csv` next to the original.
//!
//! There is no pipeline-level timeout or cancellation. Timeouts belong to
//! the HTTP clients inside the completion and storage backends.

use crate::config::{AlignmentMode, ExtractionConfig, FailurePolicy};
use crate::error::Doc2CsvError;
use crate::output::{FileType, PipelineStats, UploadOutcome};
use crate::pipeline::classify::{csv_artifact_name, DocumentKind};
use crate::pipeline::extract::{DocumentTextExtractor, TextExtractor};
use crate::pipeline::input::{read_upload, RawDocument, Upload};
use crate::pipeline::llm::{ExtractionClient, ModelReply};
use crate::pipeline::parse::{align_record, parse_reply};
use crate::pipeline::render::render_csv;
use crate::progress::{NoopObserver, ObserverHandle, Stage};
use crate::prompts::build_extraction_prompt;
use crate::schema::{CsvArtifact, Schema};
use crate::storage::ObjectStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The extraction pipeline with its collaborators wired in.
pub struct Pipeline {
    schema: Schema,
    extractor: Arc<dyn TextExtractor>,
    client: ExtractionClient,
    store: Arc<dyn ObjectStore>,
    failure_policy: FailurePolicy,
    alignment: AlignmentMode,
    observer: ObserverHandle,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators. Policies and the
    /// observer are taken from `config`.
    pub fn new(
        config: &ExtractionConfig,
        extractor: Arc<dyn TextExtractor>,
        client: ExtractionClient,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            schema: Schema::shipment(),
            extractor,
            client,
            store,
            failure_policy: config.failure_policy,
            alignment: config.alignment,
            observer: config
                .observer
                .clone()
                .unwrap_or_else(|| Arc::new(NoopObserver)),
        }
    }

    /// pdfium + tesseract extraction and the completion backend named by
    /// `config`.
    ///
    /// # Errors
    /// [`Doc2CsvError::ProviderNotConfigured`] when no completion backend
    /// can be resolved.
    pub fn from_config(
        config: &ExtractionConfig,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, Doc2CsvError> {
        let client = ExtractionClient::from_config(config)?;
        let extractor = Arc::new(DocumentTextExtractor::from_config(config));
        info!("Pipeline storing to {}", store.describe());
        Ok(Self::new(config, extractor, client, store))
    }

    /// Replace the shipment schema.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Run one upload through every stage.
    ///
    /// # Errors
    /// - [`Doc2CsvError::EmptyFilename`] / [`Doc2CsvError::UnsupportedFormat`]
    /// - [`Doc2CsvError::DocumentParse`] / [`Doc2CsvError::ImageDecode`] / [`Doc2CsvError::OcrFailed`]
    /// - [`Doc2CsvError::ExtractionServiceFailure`] under [`FailurePolicy::Propagate`]
    /// - [`Doc2CsvError::FieldCountMismatch`] under [`AlignmentMode::Strict`]
    /// - [`Doc2CsvError::StorageWriteFailed`]
    ///
    /// A failed completion call is **not** an error under the default
    /// [`FailurePolicy::Degrade`]: the reply is read as empty and the upload
    /// completes with a header plus an empty row.
    pub async fn process(&self, upload: Upload) -> Result<UploadOutcome, Doc2CsvError> {
        let filename = upload.filename.clone();
        let result = self.run(upload).await;
        if let Err(ref e) = result {
            warn!("Upload {} failed: {}", filename, e);
            self.observer.on_failed(&filename, &e.to_string());
        }
        result
    }

    /// Read `path` from disk and process it.
    pub async fn process_file(&self, path: impl AsRef<Path>) -> Result<UploadOutcome, Doc2CsvError> {
        let upload = read_upload(path).await?;
        self.process(upload).await
    }

    /// Synchronous wrapper around [`Pipeline::process`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn process_sync(&self, upload: Upload) -> Result<UploadOutcome, Doc2CsvError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| Doc2CsvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(upload))
    }

    /// Upload-boundary adapter: `None` means the request had no file part.
    ///
    /// Returns the HTTP status and JSON body, `{file_type, content}` on
    /// success and `{error}` otherwise.
    pub async fn handle_upload(&self, upload: Option<Upload>) -> (u16, serde_json::Value) {
        let result = match upload {
            Some(upload) => self.process(upload).await,
            None => Err(Doc2CsvError::MissingFile),
        };
        let (status, body) = match result {
            Ok(outcome) => (200, serde_json::to_value(outcome.response())),
            Err(e) => (e.status_code(), serde_json::to_value(e.to_response())),
        };
        match body {
            Ok(body) => (status, body),
            Err(e) => {
                let fallback = Doc2CsvError::Internal(format!("response serialisation: {e}"));
                (500, serde_json::to_value(fallback.to_response()).unwrap_or_default())
            }
        }
    }

    async fn run(&self, upload: Upload) -> Result<UploadOutcome, Doc2CsvError> {
        let total_start = Instant::now();

        // ── Received ─────────────────────────────────────────────────────
        if upload.filename.is_empty() {
            return Err(Doc2CsvError::EmptyFilename);
        }
        info!("Received {} ({} bytes)", upload.filename, upload.bytes.len());
        self.stage(&upload.filename, Stage::Received);

        self.store.put(&upload.filename, &upload.bytes).await?;
        let mut stored = vec![upload.filename.clone()];

        let mut stats = PipelineStats {
            input_bytes: upload.bytes.len(),
            ..Default::default()
        };

        // ── Classified ───────────────────────────────────────────────────
        let document = RawDocument::from_upload(upload);
        let filename = document.filename();
        let file_type = match document.kind() {
            DocumentKind::Pdf => FileType::Pdf,
            DocumentKind::Image(_) => FileType::Image,
            DocumentKind::Unsupported => {
                return Err(Doc2CsvError::UnsupportedFormat {
                    filename: filename.to_string(),
                });
            }
        };
        debug!("{} classified as {}", filename, document.kind().as_tag());
        self.stage(filename, Stage::Classified);

        // ── TextExtracted ────────────────────────────────────────────────
        let extract_start = Instant::now();
        let text = self.extractor.extract(&document).await?;
        stats.extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        stats.extracted_chars = text.chars().count();
        info!(
            "Extracted {} chars from {} in {}ms",
            stats.extracted_chars, filename, stats.extract_duration_ms
        );
        self.stage(filename, Stage::TextExtracted);

        if file_type == FileType::Image {
            stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
            return Ok(UploadOutcome {
                file_type,
                content: text,
                csv: None,
                reply_available: true,
                stored,
                stats,
            });
        }

        // ── ModelQueried ─────────────────────────────────────────────────
        let prompt = build_extraction_prompt(&text, &self.schema);
        let model_start = Instant::now();
        let reply = self.client.query(&prompt).await;
        stats.model_duration_ms = model_start.elapsed().as_millis() as u64;

        let reply_available = reply.is_available();
        let content = match reply {
            ModelReply::Text(text) => text,
            ModelReply::Unavailable { reason } => {
                self.observer.on_reply_unavailable(filename, &reason);
                match self.failure_policy {
                    FailurePolicy::Degrade => {
                        warn!("{}: extraction unavailable, continuing with empty reply", filename);
                        String::new()
                    }
                    FailurePolicy::Propagate => {
                        return Err(Doc2CsvError::ExtractionServiceFailure {
                            filename: filename.to_string(),
                            reason,
                        });
                    }
                }
            }
        };
        self.stage(filename, Stage::ModelQueried);

        // ── Parsed ───────────────────────────────────────────────────────
        let record = align_record(&self.schema, parse_reply(&content), self.alignment)?;
        debug!("{}: parsed {} fields", filename, record.len());
        self.stage(filename, Stage::Parsed);

        // ── Rendered ─────────────────────────────────────────────────────
        let csv = CsvArtifact {
            name: csv_artifact_name(filename),
            text: render_csv(&self.schema, &record),
        };
        self.stage(filename, Stage::Rendered);

        // ── Persisted ────────────────────────────────────────────────────
        self.store.put(&csv.name, csv.text.as_bytes()).await?;
        stored.push(csv.name.clone());
        self.stage(filename, Stage::Persisted);

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "{} → {} ({} fields, {}ms total)",
            filename,
            csv.name,
            record.len(),
            stats.total_duration_ms
        );

        Ok(UploadOutcome {
            file_type,
            content,
            csv: Some(csv),
            reply_available,
            stored,
            stats,
        })
    }

    fn stage(&self, filename: &str, stage: Stage) {
        debug!("{}: {}", filename, stage);
        self.observer.on_stage(filename, stage);
    }
}
