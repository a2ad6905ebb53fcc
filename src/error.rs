//! Error types for the edgequake-doc2csv library.
//!
//! Everything in [`Doc2CsvError`] is **fatal** for the upload being
//! processed: the caller gets no extracted content back.
//!
//! One failure mode is deliberately absent: a failed completion call. The
//! completion client reports it as [`crate::pipeline::llm::ModelReply::Unavailable`]
//! and the orchestrator decides, via [`crate::config::FailurePolicy`], whether
//! it degrades to an empty reply (the default) or becomes
//! [`Doc2CsvError::ExtractionServiceFailure`].
//!
//! Field-count mismatches between the model reply and the schema are not
//! errors either unless strict alignment is switched on.

use crate::output::ErrorResponse;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2csv library.
#[derive(Debug, Error)]
pub enum Doc2CsvError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The request carried no file part at all.
    #[error("No file part in the request")]
    MissingFile,

    /// A file part was present but its filename is empty.
    #[error("No selected file")]
    EmptyFilename,

    /// Filename extension is not one of .pdf, .png, .jpg, .jpeg.
    #[error("Unsupported file type: '{filename}'")]
    UnsupportedFormat { filename: String },

    /// Upload path given on the command line does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the upload path.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    // ── Document errors ───────────────────────────────────────────────────
    /// Bytes declared as PDF could not be opened as a PDF.
    #[error("Failed to parse PDF '{filename}': {detail}")]
    DocumentParse { filename: String, detail: String },

    /// PDF requires a password; uploads never carry one.
    #[error("PDF '{filename}' is encrypted and cannot be read")]
    PasswordRequired { filename: String },

    /// Bytes declared as an image could not be decoded.
    #[error("Failed to decode image '{filename}': {detail}")]
    ImageDecode { filename: String, detail: String },

    /// The OCR engine could not be run or exited with an error.
    #[error("OCR failed for '{filename}': {detail}")]
    OcrFailed { filename: String, detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Completion service failed and the failure policy is `Propagate`.
    #[error("Extraction service unavailable for '{filename}': {reason}")]
    ExtractionServiceFailure { filename: String, reason: String },

    /// Record length differs from the schema and alignment is `Strict`.
    #[error("Model reply has {found} fields, schema expects {expected}")]
    FieldCountMismatch { expected: usize, found: usize },

    /// The configured provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Object name is empty or would escape the store.
    #[error("Invalid object name '{name}'")]
    InvalidObjectName { name: String },

    /// The storage collaborator rejected a write.
    #[error("Failed to store '{name}': {detail}")]
    StorageWriteFailed { name: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2CsvError {
    /// HTTP status an upload endpoint should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Doc2CsvError::MissingFile
            | Doc2CsvError::EmptyFilename
            | Doc2CsvError::UnsupportedFormat { .. } => 400,
            Doc2CsvError::FileNotFound { .. } => 404,
            Doc2CsvError::PermissionDenied { .. } => 403,
            Doc2CsvError::DocumentParse { .. }
            | Doc2CsvError::PasswordRequired { .. }
            | Doc2CsvError::ImageDecode { .. }
            | Doc2CsvError::FieldCountMismatch { .. } => 422,
            Doc2CsvError::ExtractionServiceFailure { .. }
            | Doc2CsvError::StorageWriteFailed { .. } => 502,
            _ => 500,
        }
    }

    /// True for errors caused by the upload itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// `{error}` body for the upload boundary.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_is_bad_request() {
        let e = Doc2CsvError::UnsupportedFormat {
            filename: "notes.txt".into(),
        };
        assert_eq!(e.status_code(), 400);
        assert!(e.is_client_error());
        assert!(e.to_string().contains("notes.txt"));
    }

    #[test]
    fn missing_file_messages_match_upload_contract() {
        assert_eq!(Doc2CsvError::MissingFile.to_string(), "No file part in the request");
        assert_eq!(Doc2CsvError::EmptyFilename.to_string(), "No selected file");
        assert_eq!(Doc2CsvError::EmptyFilename.status_code(), 400);
    }

    #[test]
    fn malformed_documents_are_unprocessable() {
        let pdf = Doc2CsvError::DocumentParse {
            filename: "a.pdf".into(),
            detail: "bad xref".into(),
        };
        let img = Doc2CsvError::ImageDecode {
            filename: "a.png".into(),
            detail: "truncated".into(),
        };
        assert_eq!(pdf.status_code(), 422);
        assert_eq!(img.status_code(), 422);
    }

    #[test]
    fn service_failures_are_not_client_errors() {
        let e = Doc2CsvError::ExtractionServiceFailure {
            filename: "invoice.pdf".into(),
            reason: "401 Unauthorized".into(),
        };
        assert_eq!(e.status_code(), 502);
        assert!(!e.is_client_error());
    }

    #[test]
    fn field_count_mismatch_display() {
        let e = Doc2CsvError::FieldCountMismatch {
            expected: 13,
            found: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains("1 fields"), "got: {msg}");
        assert!(msg.contains("13"), "got: {msg}");
    }

    #[test]
    fn error_response_carries_message() {
        let body = Doc2CsvError::EmptyFilename.to_response();
        assert_eq!(body.error, "No selected file");
    }
}
