//! # edgequake-formscan
//!
//! Digitise multi-section paper forms using QR section markers and a
//! document-analysis service.
//!
//! Each section of a printed form carries a small QR marker naming it. After
//! the form is filled in and scanned, the markers tell us which sections are
//! present; the analysis service (AWS Textract, or a stored response) tells
//! us which key/value pairs it read. The pairs are matched against a fixed
//! per-section field template and exported as a key-sorted CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! scanned form (PDF / PNG / JPEG, path or URL)
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    rasterise PDF pages via pdfium (spawn_blocking)
//!  ├─ 3. Scan      decode QR markers → recognised sections
//!  ├─ 4. Analyse   submit job, poll until done (state machine)
//!  ├─ 5. Resolve   block graph → key/value pairs (O(1) id index)
//!  ├─ 6. Populate  pairs → each recognised section's field slots
//!  └─ 7. Export    key-sorted records → CSV
//! ```
//!
//! Generating the printable form (markers, page layout, PDF) and verifying
//! that rendered pages still carry their markers are in [`pipeline::layout`]
//! and [`pipeline::verify`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_formscan::{extract, DocumentRef, ExtractionConfig, StoredAnalyzer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = StoredAnalyzer::new();
//!     let document = DocumentRef::LocalFile("scan.analysis.json".into());
//!     let output = extract("scan.png", &document, &analyzer, &ExtractionConfig::default()).await?;
//!     std::io::Write::write_all(&mut std::io::stdout(), &output.to_csv()?)?;
//!     for warning in &output.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `formscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `aws`   | on      | Enables [`TextractAnalyzer`] (aws-config + aws-sdk-textract) |
//!
//! Disable both when using only the library against stored responses:
//! ```toml
//! edgequake-formscan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod blocks;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

#[cfg(feature = "aws")]
pub use analysis::TextractAnalyzer;
pub use analysis::{
    DocumentAnalyzer, DocumentRef, JobId, JobPoll, JobRunner, JobState, JobStatus, PollPolicy,
    StoredAnalyzer,
};
pub use blocks::{Block, BlockType, EntityType, Relationship, RelationshipType};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageSelection};
pub use error::{ExtractionWarning, FormScanError};
pub use extract::{classify_sections, extract, extract_sync, extract_to_file, scan_markers};
pub use output::{ExtractionOutput, ExtractionStats, PageMarkers, ScanReport, SectionReport};
pub use pipeline::codec::{decode_all, encode, Marker, MarkerStyle};
pub use pipeline::export::{export, ExportRecord};
pub use pipeline::layout::{build_page, write_pdf, PageLayout};
pub use pipeline::populate::populate;
pub use pipeline::resolve::{resolve_pairs, ResolvedPair};
pub use pipeline::verify::{verify, verify_files, VerificationResult};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{SectionId, SectionTemplate, FORM_TITLE};
