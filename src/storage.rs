//! Object storage for uploads and CSV artifacts.
//!
//! The pipeline only ever calls `put(name, bytes)`; names come straight from
//! the upload filename and a second write to the same name overwrites the
//! first. Three backends ship with the crate:
//!
//! * [`MemoryStore`]: a map behind a mutex, for tests and embedding.
//! * [`LocalDirStore`]: files in one directory, written atomically.
//! * [`AzureBlobStore`]: block blobs in an Azure Storage container,
//!   authorised with a SAS token.

use crate::error::Doc2CsvError;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Write-only object store keyed by name.
pub trait ObjectStore: Send + Sync {
    fn put<'a>(&'a self, name: &'a str, body: &'a [u8]) -> BoxFuture<'a, Result<(), Doc2CsvError>>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Reject names that are empty or could leave a flat namespace.
fn validate_name(name: &str) -> Result<(), Doc2CsvError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(Doc2CsvError::InvalidObjectName {
            name: name.to_string(),
        });
    }
    Ok(())
}

// ── Memory ───────────────────────────────────────────────────────────────

/// In-process store. Cloning the contents out is cheap enough for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().get(name).cloned()
    }

    /// Stored object as UTF-8 text, if present and valid.
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|b| String::from_utf8(b).ok())
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A poisoned map is still a valid map.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ObjectStore for MemoryStore {
    fn put<'a>(&'a self, name: &'a str, body: &'a [u8]) -> BoxFuture<'a, Result<(), Doc2CsvError>> {
        Box::pin(async move {
            validate_name(name)?;
            self.lock().insert(name.to_string(), body.to_vec());
            Ok(())
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ── Local directory ──────────────────────────────────────────────────────

/// Flat directory of objects. Each write goes to its own temp file that is
/// then renamed over the target, so readers never see a partial object.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn write(&self, name: &str, body: &[u8]) -> Result<(), Doc2CsvError> {
        validate_name(name)?;
        let write_failed = |e: std::io::Error| Doc2CsvError::StorageWriteFailed {
            name: name.to_string(),
            detail: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(write_failed)?;

        let path = self.path_for(name);
        let root = self.root.clone();
        let target = path.clone();
        let bytes = body.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            // One temp file per writer; concurrent puts to a name race on
            // the final rename only, and the last one wins.
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| Doc2CsvError::Internal(format!("storage task panicked: {e}")))?
        .map_err(write_failed)?;

        debug!("Wrote {} ({} bytes)", path.display(), body.len());
        Ok(())
    }
}

impl ObjectStore for LocalDirStore {
    fn put<'a>(&'a self, name: &'a str, body: &'a [u8]) -> BoxFuture<'a, Result<(), Doc2CsvError>> {
        Box::pin(self.write(name, body))
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

// ── Azure Blob Storage ───────────────────────────────────────────────────

/// Block blobs in one container, authorised with a SAS token.
pub struct AzureBlobStore {
    http: reqwest::Client,
    container_url: reqwest::Url,
    sas_token: String,
}

impl AzureBlobStore {
    /// `container_url` is e.g. `https://acct.blob.core.windows.net/uploads`;
    /// `sas_token` may be given with or without the leading `?`.
    pub fn new(
        container_url: &str,
        sas_token: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, Doc2CsvError> {
        let container_url = reqwest::Url::parse(container_url.trim_end_matches('/')).map_err(|e| {
            Doc2CsvError::InvalidConfig(format!("invalid container URL '{container_url}': {e}"))
        })?;
        if container_url.cannot_be_a_base() {
            return Err(Doc2CsvError::InvalidConfig(format!(
                "container URL '{container_url}' cannot hold blob paths"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Doc2CsvError::Internal(format!("HTTP client: {e}")))?;
        let sas_token: String = sas_token.into();
        Ok(Self {
            http,
            container_url,
            sas_token: sas_token.trim_start_matches('?').to_string(),
        })
    }

    /// Blob URL for `name`, percent-encoded, with the SAS query attached.
    pub fn blob_url(&self, name: &str) -> Result<reqwest::Url, Doc2CsvError> {
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| Doc2CsvError::InvalidObjectName {
                name: name.to_string(),
            })?
            .push(name);
        if !self.sas_token.is_empty() {
            url.set_query(Some(&self.sas_token));
        }
        Ok(url)
    }

    async fn upload(&self, name: &str, body: &[u8]) -> Result<(), Doc2CsvError> {
        validate_name(name)?;
        let url = self.blob_url(name)?;

        let response = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type_for(name))
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| Doc2CsvError::StorageWriteFailed {
                name: name.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Doc2CsvError::StorageWriteFailed {
                name: name.to_string(),
                detail: format!("HTTP {status}: {detail}"),
            });
        }

        info!("Uploaded blob {} ({} bytes)", name, body.len());
        Ok(())
    }
}

impl ObjectStore for AzureBlobStore {
    fn put<'a>(&'a self, name: &'a str, body: &'a [u8]) -> BoxFuture<'a, Result<(), Doc2CsvError>> {
        Box::pin(self.upload(name, body))
    }

    fn describe(&self) -> String {
        format!("azure:{}", self.container_url)
    }
}

fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        "text/csv; charset=utf-8"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryStore::new();
        tokio_test::block_on(store.put("invoice.csv", b"first")).unwrap();
        tokio_test::block_on(store.put("invoice.csv", b"second")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_text("invoice.csv").as_deref(), Some("second"));
    }

    #[test]
    fn rejects_path_like_names() {
        let store = MemoryStore::new();
        for name in ["", "..", "../etc/passwd", "a/b.csv", "a\\b.csv"] {
            let err = tokio_test::block_on(store.put(name, b"x")).unwrap_err();
            assert!(matches!(err, Doc2CsvError::InvalidObjectName { .. }), "{name}");
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn local_dir_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path().join("out"));
        store.put("invoice.csv", b"a,b\n1,2").await.unwrap();

        let written = std::fs::read_to_string(store.path_for("invoice.csv")).unwrap();
        assert_eq!(written, "a,b\n1,2");
        let entries = std::fs::read_dir(store.root()).unwrap().count();
        assert_eq!(entries, 1, "no temp files left behind");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn local_dir_store_concurrent_same_name_writes_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(LocalDirStore::new(dir.path()));

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let body = format!("upload {i:02}");
                    store.put("invoice.pdf", body.as_bytes()).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().expect("every colliding put overwrites");
        }

        let written = std::fs::read_to_string(store.path_for("invoice.pdf")).unwrap();
        assert!(written.starts_with("upload "), "got {written:?}");
        assert_eq!(written.len(), "upload 00".len());
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 1);
    }

    #[test]
    fn blob_url_encodes_name_and_appends_sas() {
        let store =
            AzureBlobStore::new("https://acct.blob.core.windows.net/uploads/", "?sv=2022&sig=abc", 5)
                .unwrap();
        let url = store.blob_url("my invoice.pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/uploads/my%20invoice.pdf?sv=2022&sig=abc"
        );
    }

    #[test]
    fn azure_store_rejects_bad_url() {
        assert!(AzureBlobStore::new("not a url", "", 5).is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("invoice.csv"), "text/csv; charset=utf-8");
        assert_eq!(content_type_for("INVOICE.PDF"), "application/pdf");
        assert_eq!(content_type_for("x.bin"), "application/octet-stream");
    }
}
