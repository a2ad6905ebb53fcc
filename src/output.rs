//! Result types returned by the orchestrator and the upload boundary.

use crate::schema::CsvArtifact;
use serde::{Deserialize, Serialize};

/// Which extraction path an upload took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "Image")]
    Image,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "PDF",
            FileType::Image => "Image",
        }
    }
}

/// Success body of the upload boundary: `{file_type, content}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_type: FileType,
    pub content: String,
}

/// Failure body of the upload boundary: `{error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Timings for one upload, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub input_bytes: usize,
    pub extracted_chars: usize,
    pub extract_duration_ms: u64,
    /// Zero for image uploads, which never reach the model.
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything the orchestrator knows after a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub file_type: FileType,
    /// Raw model reply for PDFs, OCR text for images.
    pub content: String,
    /// The rendered CSV, PDFs only.
    pub csv: Option<CsvArtifact>,
    /// False when the completion service failed and the reply was degraded
    /// to empty. Always true for images.
    pub reply_available: bool,
    /// Object names written, in write order.
    pub stored: Vec<String>,
    pub stats: PipelineStats,
}

impl UploadOutcome {
    /// The user-visible `{file_type, content}` payload.
    pub fn response(&self) -> UploadResponse {
        UploadResponse {
            file_type: self.file_type,
            content: self.content.clone(),
        }
    }
}
