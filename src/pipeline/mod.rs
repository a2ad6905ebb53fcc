//! Pipeline stages for document-to-CSV extraction.
//!
//! Each submodule implements one transformation step so each can be tested
//! without the others, and the network-bound step can be faked.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ classify ──▶ extract ──▶ llm ──▶ parse ──▶ render
//! (upload)  (extension)  (pdfium/OCR) (model) (split |) (CSV)
//! ```
//!
//! 1. [`input`]   : upload bytes and their classified form
//! 2. [`classify`]: closed format enumeration, CSV artifact naming
//! 3. [`extract`] : raw text; pdfium on the blocking pool, OCR via [`ocr`]
//! 4. [`llm`]     : the only stage with network I/O; fails open
//! 5. [`parse`]   : pipe splitting and schema alignment
//! 6. [`render`]  : header + row CSV text

pub mod classify;
pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod parse;
pub mod render;
