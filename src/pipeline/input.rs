//! Upload input: the named file part handed to the pipeline.
//!
//! An upload is just a filename plus bytes. The HTTP layer (or the CLI)
//! builds one; [`read_upload`] covers the local-file case and maps the
//! common I/O failures to typed errors instead of a bare `io::Error`.

use crate::error::Doc2CsvError;
use crate::pipeline::classify::{classify, DocumentKind};
use std::path::Path;
use tracing::debug;

/// One uploaded file, as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Upload bytes tagged with their classified format. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    filename: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            kind,
            bytes,
        }
    }

    /// Classify `upload` by filename and wrap it.
    pub fn from_upload(upload: Upload) -> Self {
        let kind = classify(&upload.filename);
        Self::new(upload.filename, kind, upload.bytes)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read a local file into an [`Upload`] named after the file's basename.
pub async fn read_upload(path: impl AsRef<Path>) -> Result<Upload, Doc2CsvError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Doc2CsvError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Doc2CsvError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!("Read upload {} ({} bytes)", filename, bytes.len());
    Ok(Upload { filename, bytes })
}
