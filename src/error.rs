//! Error types for the pdf2md-hybrid library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2MdError`]: **Fatal**. The conversion cannot proceed at all
//!   (bad input file, the selected mode's capability is missing, output not
//!   writable). Returned as `Err(Pdf2MdError)` from the top-level `convert*`
//!   functions.
//!
//! * [`PageError`]: **Non-fatal**. One page, one extraction attempt or one
//!   image write failed but the run continues. Stored inside
//!   [`crate::output::ExtractionResult`] so callers can inspect partial
//!   success rather than losing the whole document to one bad page.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2md-hybrid library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::ExtractionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\n{reason}")]
    NotAPdf { path: PathBuf, reason: String },

    /// The file is larger than the configured limit.
    #[error("PDF '{path}' is {size_mb:.1} MB, above the {limit_mb} MB limit.\nRaise it with --max-file-size.")]
    FileTooLarge {
        path: PathBuf,
        size_mb: f64,
        limit_mb: u64,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// No available reader could open the document.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Capability errors ─────────────────────────────────────────────────
    /// The selected mode needs a collaborator that is not installed.
    #[error("{mode} mode requires {capability}, which is not available on this host.\n{hint}")]
    CapabilityUnavailable {
        mode: String,
        capability: String,
        hint: String,
    },

    /// The external format converter is missing or failed.
    #[error("Export to {format} failed: {detail}")]
    ExportFailed { format: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file or image directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification of a non-fatal [`PageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    CapabilityUnavailable,
    PageReadFailure,
    ExtractionFailure,
    AssetWriteFailure,
}

/// A non-fatal error for a single page.
///
/// Page numbers are 1-indexed, as in every user-facing message.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// No collaborator for this step exists on the host.
    #[error("Page {page}: {capability} is not available")]
    CapabilityUnavailable { page: usize, capability: String },

    /// The page could not be opened at all.
    #[error("Page {page}: could not be read: {detail}")]
    PageReadFailure { page: usize, detail: String },

    /// One method of the extraction chain failed.
    #[error("Page {page}: {method} failed: {detail}")]
    ExtractionFailure {
        page: usize,
        method: String,
        detail: String,
    },

    /// An image could not be written to the sidecar directory.
    #[error("Page {page}: could not write image '{path}': {detail}")]
    AssetWriteFailure {
        page: usize,
        path: String,
        detail: String,
    },
}

impl PageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PageError::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
            PageError::PageReadFailure { .. } => ErrorKind::PageReadFailure,
            PageError::ExtractionFailure { .. } => ErrorKind::ExtractionFailure,
            PageError::AssetWriteFailure { .. } => ErrorKind::AssetWriteFailure,
        }
    }

    /// 1-indexed page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::CapabilityUnavailable { page, .. }
            | PageError::PageReadFailure { page, .. }
            | PageError::ExtractionFailure { page, .. }
            | PageError::AssetWriteFailure { page, .. } => *page,
        }
    }
}
