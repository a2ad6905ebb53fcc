//! Format classification by filename extension.
//!
//! The extension alone decides the extraction path; the bytes are not
//! sniffed here. Matching is case-insensitive and looks at the suffix of
//! the full name, so `REPORT.PDF` is a PDF and `.png` is an image.

use serde::{Deserialize, Serialize};

/// Raster formats accepted on the image path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Png,
    Jpeg,
}

/// What an upload is, as far as the pipeline is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Image(ImageKind),
    Unsupported,
}

impl DocumentKind {
    /// Format tag: `pdf`, `image-png`, `image-jpeg` or `unsupported`.
    pub fn as_tag(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image(ImageKind::Png) => "image-png",
            DocumentKind::Image(ImageKind::Jpeg) => "image-jpeg",
            DocumentKind::Unsupported => "unsupported",
        }
    }
}

/// Classify an upload by its filename.
pub fn classify(filename: &str) -> DocumentKind {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        DocumentKind::Pdf
    } else if lower.ends_with(".png") {
        DocumentKind::Image(ImageKind::Png)
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        DocumentKind::Image(ImageKind::Jpeg)
    } else {
        DocumentKind::Unsupported
    }
}

/// Object name for the CSV derived from `filename`.
///
/// The stem is everything before the first `.`, so `invoice.2024.pdf`
/// becomes `invoice.csv`.
pub fn csv_artifact_name(filename: &str) -> String {
    let stem = filename.split('.').next().unwrap_or_default();
    format!("{stem}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert_eq!(classify("invoice.pdf"), DocumentKind::Pdf);
        assert_eq!(classify("INVOICE.PDF"), DocumentKind::Pdf);
        assert_eq!(classify("photo.png"), DocumentKind::Image(ImageKind::Png));
        assert_eq!(classify("scan.JPG"), DocumentKind::Image(ImageKind::Jpeg));
        assert_eq!(classify("scan.jpeg"), DocumentKind::Image(ImageKind::Jpeg));
    }

    #[test]
    fn everything_else_is_unsupported() {
        assert_eq!(classify("notes.txt"), DocumentKind::Unsupported);
        assert_eq!(classify("archive.pdf.zip"), DocumentKind::Unsupported);
        assert_eq!(classify("pdf"), DocumentKind::Unsupported);
        assert_eq!(classify(""), DocumentKind::Unsupported);
    }

    #[test]
    fn format_tags() {
        assert_eq!(DocumentKind::Pdf.as_tag(), "pdf");
        assert_eq!(DocumentKind::Image(ImageKind::Png).as_tag(), "image-png");
        assert_eq!(DocumentKind::Image(ImageKind::Jpeg).as_tag(), "image-jpeg");
        assert_eq!(DocumentKind::Unsupported.as_tag(), "unsupported");
    }

    #[test]
    fn csv_name_uses_text_before_first_dot() {
        assert_eq!(csv_artifact_name("invoice.pdf"), "invoice.csv");
        assert_eq!(csv_artifact_name("INVOICE.PDF"), "INVOICE.csv");
        assert_eq!(csv_artifact_name("invoice.2024.pdf"), "invoice.csv");
    }
}
