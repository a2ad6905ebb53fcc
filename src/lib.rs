//! # edgequake-doc2csv
//!
//! Pull shipment/invoice line items out of uploaded PDFs and images with a
//! completion model and store them as CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Store     original bytes go to the object store on receipt
//!  ├─ 2. Classify  .pdf → PDF path, .png/.jpg/.jpeg → image path, else reject
//!  ├─ 3. Extract   pdfium page text (PDF) or tesseract OCR (image)
//!  │               image uploads stop here and return the OCR text
//!  ├─ 4. Query     one deterministic completion request (temperature 0)
//!  ├─ 5. Parse     split the reply on '|' into a record
//!  ├─ 6. Render    13-column header + one row of CSV
//!  └─ 7. Persist   <stem>.csv next to the original upload
//! ```
//!
//! A failed completion call does not fail the upload by default: the reply
//! is read as empty and the CSV gets a header and an empty row. Switch to
//! [`FailurePolicy::Propagate`] to surface the failure instead.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2csv::{ExtractionConfig, LocalDirStore, Pipeline};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .azure_openai("https://acme.openai.azure.com", "<key>", "gpt-35-turbo")
//!         .build()?;
//!     let pipeline = Pipeline::from_config(&config, Arc::new(LocalDirStore::new("out")))?;
//!     let outcome = pipeline.process_file("invoice.pdf").await?;
//!     println!("{}", serde_json::to_string(&outcome.response())?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2csv` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AlignmentMode, AzureOpenAiSettings, ExtractionConfig, ExtractionConfigBuilder, FailurePolicy,
    OcrSettings, SamplingSettings,
};
pub use convert::Pipeline;
pub use error::Doc2CsvError;
pub use output::{ErrorResponse, FileType, PipelineStats, UploadOutcome, UploadResponse};
pub use pipeline::classify::{classify, csv_artifact_name, DocumentKind, ImageKind};
pub use pipeline::extract::{DocumentTextExtractor, TextExtractor};
pub use pipeline::input::{read_upload, RawDocument, Upload};
pub use pipeline::llm::{
    AzureChatCompletion, CompletionError, CompletionService, ExtractionClient, ModelReply,
    ProviderCompletion,
};
pub use pipeline::ocr::{OcrEngine, TesseractOcr};
pub use pipeline::parse::{align_record, parse_reply};
pub use pipeline::render::render_csv;
pub use progress::{NoopObserver, ObserverHandle, PipelineObserver, Stage};
pub use prompts::build_extraction_prompt;
pub use schema::{CsvArtifact, Record, Schema, SHIPMENT_FIELDS};
pub use storage::{AzureBlobStore, LocalDirStore, MemoryStore, ObjectStore};
