//! Optical character recognition for the image path.
//!
//! [`TesseractOcr`] shells out to the `tesseract` binary. The decoded image
//! is re-encoded as PNG into a temp file first: tesseract reads files, and a
//! normalised PNG sidesteps JPEG variants its own loader rejects. Output is
//! taken from stdout verbatim, with no layout reconstruction.

use crate::config::OcrSettings;
use crate::error::Doc2CsvError;
use futures::future::BoxFuture;
use image::DynamicImage;
use std::io::{Cursor, Write};
use tokio::process::Command;
use tracing::{debug, warn};

/// Turns a decoded raster image into plain text.
pub trait OcrEngine: Send + Sync {
    fn recognize<'a>(
        &'a self,
        filename: &'a str,
        image: &'a DynamicImage,
    ) -> BoxFuture<'a, Result<String, Doc2CsvError>>;
}

/// OCR backed by the tesseract command-line tool.
#[derive(Debug, Clone, Default)]
pub struct TesseractOcr {
    settings: OcrSettings,
}

impl TesseractOcr {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    async fn run(&self, filename: &str, image: &DynamicImage) -> Result<String, Doc2CsvError> {
        let ocr_failed = |detail: String| Doc2CsvError::OcrFailed {
            filename: filename.to_string(),
            detail,
        };

        let png = encode_png(image).map_err(|e| ocr_failed(format!("PNG encoding failed: {e}")))?;

        let mut tmp = tempfile::Builder::new()
            .prefix("doc2csv-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ocr_failed(format!("tempfile: {e}")))?;
        tmp.write_all(&png)
            .map_err(|e| ocr_failed(format!("tempfile write: {e}")))?;

        let output = Command::new(&self.settings.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.settings.language)
            .output()
            .await
            .map_err(|e| {
                ocr_failed(format!(
                    "could not run '{}': {e}",
                    self.settings.binary.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {} for {}: {}", output.status, filename, stderr);
            return Err(ocr_failed(format!("tesseract exited with {}: {}", output.status, stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR {} → {} chars", filename, text.len());
        Ok(text)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize<'a>(
        &'a self,
        filename: &'a str,
        image: &'a DynamicImage,
    ) -> BoxFuture<'a, Result<String, Doc2CsvError>> {
        Box::pin(self.run(filename, image))
    }
}

/// Lossless PNG encoding of a decoded image.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
