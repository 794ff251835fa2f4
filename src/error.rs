//! Error types for the edgequake-formscan library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`FormScanError`] — **Fatal**: the operation that raised it cannot
//!   continue (payload too large for a marker, more subsections than layout
//!   slots, analysis job failed, unreadable input). Returned as
//!   `Err(FormScanError)`.
//!
//! * [`ExtractionWarning`] — **Non-fatal**: a data-quality finding (a marker
//!   naming an unknown section, a key block without text, a page whose marker
//!   does not match). Collected in [`crate::output::ExtractionOutput`] so the
//!   export still happens and a reviewer can follow up.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-formscan library.
#[derive(Debug, Error)]
pub enum FormScanError {
    // ── Marker errors ─────────────────────────────────────────────────────
    /// The payload does not fit in a QR code at the requested version.
    #[error("Cannot encode marker payload {payload:?}: {reason}\nShorten the payload or allow a larger code version.")]
    Encoding { payload: String, reason: String },

    /// More subsection markers were requested than the page has slots for.
    #[error("Layout overflow: {supplied} subsections supplied but the page has {slots} marker slots")]
    LayoutOverflow { supplied: usize, slots: usize },

    // ── Schema / config errors ────────────────────────────────────────────
    /// A section schema repeats a section name or a field key.
    #[error("Invalid section schema: {0}")]
    InvalidSchema(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file is neither a PDF nor a PNG/JPEG page image.
    #[error("Unsupported input '{path}': expected a PDF, PNG or JPEG file\nFirst bytes: {magic:?}")]
    UnsupportedInput { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Building or saving the marker PDF failed.
    #[error("Failed to write PDF '{path}': {detail}")]
    PdfWriteFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Rendering and writing PDFs needs the native pdfium library.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Or place libpdfium next to the binary / install it system-wide.\n\
Page images (PNG/JPEG) can be scanned without pdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Image errors ──────────────────────────────────────────────────────
    /// A page image could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    /// A marker or page image could not be written.
    #[error("Failed to write image '{path}': {detail}")]
    ImageWriteFailed { path: PathBuf, detail: String },

    // ── Analysis service errors ───────────────────────────────────────────
    /// The service refused to start a job.
    #[error("Failed to submit document for analysis: {0}")]
    AnalysisSubmitFailed(String),

    /// A status request to the service failed.
    #[error("Failed to poll analysis job '{job_id}': {reason}")]
    AnalysisPollFailed { job_id: String, reason: String },

    /// The job reached its FAILED state: no block data is available.
    #[error("Analysis job '{job_id}' failed: {reason}\nNo data available; nothing was exported.")]
    AnalysisFailed { job_id: String, reason: String },

    /// The job did not finish within the configured maximum wait.
    #[error("Analysis job '{job_id}' still running after {waited_secs}s\nRaise --max-wait or poll again later.")]
    AnalysisTimedOut { job_id: String, waited_secs: u64 },

    /// The caller cancelled the wait.
    #[error("Waiting for analysis job '{job_id}' was cancelled")]
    AnalysisCancelled { job_id: String },

    /// A stored or returned analysis response could not be parsed.
    #[error("Malformed analysis response: {0}")]
    MalformedAnalysis(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output record file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal data-quality finding.
///
/// Collected alongside the exported records; never aborts an extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExtractionWarning {
    /// A decoded marker does not name any section of the schema.
    #[error("Page {page}: marker {payload:?} does not name a known section")]
    UnknownSection { page: usize, payload: String },

    /// A code was detected but its content could not be decoded.
    #[error("Page {page}: detected a marker that could not be decoded: {detail}")]
    UndecodableMarker { page: usize, detail: String },

    /// No marker was found on a scanned page.
    #[error("Page {page}: no markers found")]
    NoMarkersOnPage { page: usize },

    /// A key block carried no text; its pair was discarded.
    #[error("Key block '{block_id}' has no text; pair discarded")]
    EmptyKey { block_id: String },

    /// A verified page did not contain its expected marker.
    #[error("Page {index}: expected marker {expected:?}, got {got:?}")]
    MarkerMismatch {
        index: usize,
        expected: String,
        got: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_overflow_display() {
        let e = FormScanError::LayoutOverflow {
            supplied: 4,
            slots: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("4 subsections"), "got: {msg}");
        assert!(msg.contains("3 marker slots"), "got: {msg}");
    }

    #[test]
    fn analysis_failed_reports_no_data() {
        let e = FormScanError::AnalysisFailed {
            job_id: "job-1".into(),
            reason: "FAILED".into(),
        };
        assert!(e.to_string().contains("job-1"));
        assert!(e.to_string().contains("No data available"));
    }

    #[test]
    fn timed_out_display() {
        let e = FormScanError::AnalysisTimedOut {
            job_id: "abc".into(),
            waited_secs: 90,
        };
        assert!(e.to_string().contains("90s"));
    }

    #[test]
    fn mismatch_warning_lists_decoded_payloads() {
        let w = ExtractionWarning::MarkerMismatch {
            index: 2,
            expected: "Section 2".into(),
            got: vec!["noise".into()],
        };
        let msg = w.to_string();
        assert!(msg.contains("Section 2"));
        assert!(msg.contains("noise"));
    }
}
